use core::fmt;
use core::mem::{self, MaybeUninit};
use core::ptr;

use crate::fatal::{fatal, SystemError};

/// The signal that carries quantum expiry.
pub const PREEMPT_SIGNAL: libc::c_int = libc::SIGVTALRM;

pub type QuantumHandler = extern "C" fn(libc::c_int);

/// A snapshot of the process signal mask.
#[derive(Clone, Copy)]
pub struct SignalMask(libc::sigset_t);

impl SignalMask {
    pub fn empty() -> Self {
        let mut set = MaybeUninit::<libc::sigset_t>::uninit();
        // SAFETY: sigemptyset fully initializes the set.
        unsafe {
            libc::sigemptyset(set.as_mut_ptr());
            Self(set.assume_init())
        }
    }

    /// A mask holding only the preemption signal.
    pub fn preemption() -> Self {
        let mut mask = Self::empty();
        // SAFETY: the set is initialized and the signal number is valid.
        unsafe { libc::sigaddset(&mut mask.0, PREEMPT_SIGNAL) };
        mask
    }

    /// Reads the calling thread's current mask.
    pub fn current() -> Self {
        let mut set = MaybeUninit::<libc::sigset_t>::uninit();
        // SAFETY: a null `set` only queries; `oldset` is valid for writes.
        let rc = unsafe { libc::sigprocmask(libc::SIG_BLOCK, ptr::null(), set.as_mut_ptr()) };
        if rc != 0 {
            fatal(SystemError::last_os(SystemError::SigProcMask));
        }
        // SAFETY: sigprocmask succeeded and wrote the old set.
        Self(unsafe { set.assume_init() })
    }

    /// Installs this mask as the calling thread's mask.
    pub fn apply(&self) {
        // SAFETY: `self.0` is an initialized set.
        let rc = unsafe { libc::sigprocmask(libc::SIG_SETMASK, &self.0, ptr::null_mut()) };
        if rc != 0 {
            fatal(SystemError::last_os(SystemError::SigProcMask));
        }
    }

    pub fn blocks_preemption(&self) -> bool {
        // SAFETY: `self.0` is an initialized set.
        unsafe { libc::sigismember(&self.0, PREEMPT_SIGNAL) == 1 }
    }

    pub fn without_preemption(mut self) -> Self {
        // SAFETY: `self.0` is an initialized set.
        unsafe { libc::sigdelset(&mut self.0, PREEMPT_SIGNAL) };
        self
    }
}

impl fmt::Debug for SignalMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalMask")
            .field("blocks_preemption", &self.blocks_preemption())
            .finish()
    }
}

/// Proof that quantum expiry is masked. Dropping it restores the mask that
/// was in force when it was created, so critical sections nest.
#[must_use = "preemption is unmasked as soon as the guard is dropped"]
pub struct PreemptGuard {
    previous: SignalMask,
}

impl PreemptGuard {
    pub fn previous(&self) -> &SignalMask {
        &self.previous
    }
}

impl Drop for PreemptGuard {
    fn drop(&mut self) {
        leave_critical(&self.previous);
    }
}

/// Masks quantum expiry until the returned guard is dropped.
pub fn enter_critical() -> PreemptGuard {
    let mut previous = MaybeUninit::<libc::sigset_t>::uninit();
    let block = SignalMask::preemption();
    // SAFETY: both sets are valid; `previous` is written on success.
    let rc = unsafe { libc::sigprocmask(libc::SIG_BLOCK, &block.0, previous.as_mut_ptr()) };
    if rc != 0 {
        fatal(SystemError::last_os(SystemError::SigProcMask));
    }
    PreemptGuard {
        // SAFETY: sigprocmask succeeded.
        previous: SignalMask(unsafe { previous.assume_init() }),
    }
}

/// Reinstates `previous`, the mask saved by [`enter_critical`].
pub fn leave_critical(previous: &SignalMask) {
    previous.apply();
}

/// Routes quantum expiry to `handler`. The signal stays masked while the
/// handler runs.
pub fn install_quantum_handler(handler: QuantumHandler) {
    // SAFETY: an all-zero sigaction is a valid starting point.
    let mut action: libc::sigaction = unsafe { mem::zeroed() };
    action.sa_sigaction = handler as libc::sighandler_t;
    action.sa_mask = SignalMask::preemption().0;
    action.sa_flags = libc::SA_RESTART;

    // SAFETY: `action` is fully initialized; the old action is not needed.
    let rc = unsafe { libc::sigaction(PREEMPT_SIGNAL, &action, ptr::null_mut()) };
    if rc != 0 {
        fatal(SystemError::last_os(SystemError::SigAction));
    }
}

/// The interrupted code's `errno`, kept across a handler that makes system
/// calls of its own.
pub struct SavedErrno(libc::c_int);

impl SavedErrno {
    pub fn save() -> Self {
        // SAFETY: errno is thread-local and always addressable.
        Self(unsafe { *libc::__errno_location() })
    }

    pub fn restore(self) {
        // SAFETY: as in `save`.
        unsafe { *libc::__errno_location() = self.0 };
    }
}

/// Ignores quantum expiry from now on. Used on shutdown after the timer has
/// been disarmed, so a signal already in flight is dropped.
pub fn uninstall_quantum_handler() {
    // SAFETY: see `install_quantum_handler`.
    let mut action: libc::sigaction = unsafe { mem::zeroed() };
    action.sa_sigaction = libc::SIG_IGN;
    let rc = unsafe { libc::sigaction(PREEMPT_SIGNAL, &action, ptr::null_mut()) };
    if rc != 0 {
        fatal(SystemError::last_os(SystemError::SigAction));
    }
}
