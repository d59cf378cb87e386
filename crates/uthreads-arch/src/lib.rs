//! Raw execution-context capture and resume.
//!
//! This is the only place that touches registers directly. A [`Context`]
//! holds the callee-saved state of a suspended logical thread; the scheduler
//! treats it as opaque and only primes fresh ones through
//! [`foundation::ArchContext`].
//!
//! Fresh contexts start in [`thread_trampoline`], which clears the frame
//! pointer and calls the start routine stored with
//! [`ArchContext::set_start_routine`]. That routine must never return.

#![no_std]

use cfg_if::cfg_if;
pub use foundation::ArchContext;

cfg_if! {
    if #[cfg(all(target_arch = "x86_64", target_os = "linux"))] {
        mod x86_64;
        use x86_64 as imp;
    } else if #[cfg(all(target_arch = "aarch64", target_os = "linux"))] {
        mod aarch64;
        use aarch64 as imp;
    } else {
        compile_error!("uthreads-arch supports x86_64 and aarch64 Linux only");
    }
}

pub use imp::Context;

// Implemented in the per-arch global_asm blocks.
extern "C" {
    fn uthreads_switch_context(from: *mut Context, to: *const Context);
    fn uthreads_restore_context(to: *const Context) -> !;
    fn uthreads_thread_trampoline() -> !;
}

/// Saves the running context into `from` and resumes `to`.
///
/// Returns only when some later switch resumes `from`.
///
/// # Safety
/// - `from` must be valid for writes and stay alive until it is resumed.
/// - `to` must hold a context captured by `switch_context` or primed for the
///   trampoline, whose stack is still allocated.
#[inline]
pub unsafe fn switch_context(from: *mut Context, to: *const Context) {
    unsafe { uthreads_switch_context(from, to) }
}

/// Resumes `to` without saving the running context.
///
/// # Safety
/// Same requirements on `to` as [`switch_context`]. Nothing on the current
/// stack is ever touched again.
#[inline]
pub unsafe fn restore_context(to: *const Context) -> ! {
    unsafe { uthreads_restore_context(to) }
}

/// Address fresh contexts start executing at.
#[inline]
pub fn thread_trampoline() -> usize {
    uthreads_thread_trampoline as usize
}

/// Primes `ctx` to run `start` on the stack whose aligned top is `sp`.
pub fn prime(ctx: &mut Context, sp: usize, start: extern "C" fn() -> !) {
    *ctx = Context::new();
    ctx.set_sp(sp);
    ctx.set_pc(thread_trampoline());
    ctx.set_frame_pointer(0);
    ctx.set_start_routine(start as usize);
}
