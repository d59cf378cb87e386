//! Process-wide cells for state touched by exactly one physical executor.
//!
//! Logical threads share one OS thread, so there is never parallel access.
//! The only hazard is an asynchronous signal handler interrupting a borrow;
//! callers must hold a preemption mask around every access. A re-entrant
//! borrow (handler running while a borrow is live) is a bug and panics.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, Ordering};

pub struct GlobalCell<T> {
    value: UnsafeCell<T>,
    borrowed: AtomicBool,
}

// SAFETY: access is confined to one OS thread with preemption masked, and the
// borrow flag rejects re-entrant access.
unsafe impl<T: Send> Sync for GlobalCell<T> {}

impl<T> GlobalCell<T> {
    pub const fn new(value: T) -> Self {
        Self {
            value: UnsafeCell::new(value),
            borrowed: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.with_mut(|v| f(v))
    }

    #[inline]
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let _borrow = Borrow::acquire(&self.borrowed);
        // SAFETY: the borrow flag guarantees this is the only live reference.
        f(unsafe { &mut *self.value.get() })
    }

    pub fn replace(&self, value: T) -> T {
        self.with_mut(|v| core::mem::replace(v, value))
    }
}

pub struct GlobalOption<T> {
    inner: GlobalCell<Option<T>>,
}

impl<T> GlobalOption<T> {
    pub const fn none() -> Self {
        Self {
            inner: GlobalCell::new(None),
        }
    }

    pub fn set(&self, value: T) {
        self.inner.with_mut(|slot| *slot = Some(value));
    }

    pub fn take(&self) -> Option<T> {
        self.inner.with_mut(Option::take)
    }

    pub fn is_some(&self) -> bool {
        self.inner.with(Option::is_some)
    }

    #[inline]
    pub fn with_some<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.inner.with(|slot| slot.as_ref().map(f))
    }

    #[inline]
    pub fn with_some_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.inner.with_mut(|slot| slot.as_mut().map(f))
    }
}

struct Borrow<'a>(&'a AtomicBool);

impl<'a> Borrow<'a> {
    fn acquire(flag: &'a AtomicBool) -> Self {
        if flag.swap(true, Ordering::Acquire) {
            panic!("re-entrant access to global state");
        }
        Borrow(flag)
    }
}

impl Drop for Borrow<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
