//! The process-wide runtime and the code that acts on scheduling decisions.
//!
//! Every function here expects preemption to be masked by the caller. A
//! switch is only ever performed after the borrow of [`RUNTIME`] that
//! produced it has ended, since the resumed thread will borrow it again.

use core::ffi::c_int;
use core::ptr::{self, NonNull};

use foundation::utils::GlobalOption;
use os_linux::{
    fatal, install_quantum_handler, uninstall_quantum_handler, QuantumTimer, SavedErrno,
    SignalMask, SystemError,
};
use scheduler_round_robin::{
    Error, Result, Scheduler, SuspendPoint, Switch, Tid, MAIN_TID,
};

use crate::config::Config;

struct Runtime {
    scheduler: Scheduler,
    timer: QuantumTimer,
}

static RUNTIME: GlobalOption<Runtime> = GlobalOption::none();

pub(crate) fn start(config: Config) -> Result<()> {
    config.validate()?;
    if RUNTIME.is_some() {
        return Err(Error::InvalidOperation("the library is already initialized"));
    }

    let timer = QuantumTimer::new(config.quantum_usecs as u32);
    let mut scheduler = Scheduler::new(config.stack_size, thread_start);
    scheduler.begin();
    RUNTIME.set(Runtime { scheduler, timer });

    os_linux::set_teardown(release_for_exit);
    install_quantum_handler(on_quantum_expired);
    timer.arm();
    log::debug!("uthreads initialized: {timer:?}, {} byte stacks", config.stack_size);
    Ok(())
}

/// Runs a mutating operation. A thread that terminated itself earlier is
/// released first; whoever calls this is running on a different stack.
pub(crate) fn with_scheduler<T>(f: impl FnOnce(&mut Scheduler) -> Result<T>) -> Result<T> {
    decide(f).map(|(value, _)| value)
}

/// Like [`with_scheduler`], also handing back the timer so a resulting
/// switch can rearm it.
pub(crate) fn decide<T>(
    f: impl FnOnce(&mut Scheduler) -> Result<T>,
) -> Result<(T, QuantumTimer)> {
    RUNTIME
        .with_some_mut(|rt| {
            rt.scheduler.finish_pending();
            f(&mut rt.scheduler).map(|value| (value, rt.timer))
        })
        .unwrap_or(Err(Error::NotInitialized))
}

/// Runs a read-only query.
pub(crate) fn query<T>(f: impl FnOnce(&Scheduler) -> T) -> Option<T> {
    RUNTIME.with_some(|rt| f(&rt.scheduler))
}

/// Rearms the timer and transfers control as `switch` says. Returns once the
/// outgoing thread is dispatched again.
///
/// # Safety
/// `switch` must come from the live runtime and no scheduler state may have
/// changed since. Preemption must be masked.
pub(crate) unsafe fn perform(switch: Switch, timer: QuantumTimer) {
    timer.arm();
    let Some(from) = switch.from else {
        // SAFETY: forwarded from the caller.
        unsafe { abandon(switch.to) }
    };
    if switch.is_resume_self() {
        return;
    }

    let from = from.as_ptr();
    // SAFETY: both control blocks are boxed and alive. The outgoing one stays
    // alive until it runs again because only its own thread can free it.
    unsafe {
        (*from).sigmask = SignalMask::current();
        arch::switch_context(
            ptr::addr_of_mut!((*from).regs),
            ptr::addr_of!((*switch.to.as_ptr()).regs),
        );
        (*from).sigmask.apply();
    }

    if switch.from_tid == MAIN_TID && exit_requested() {
        shutdown();
    }
}

/// Resumes `to` without saving the running thread, which is gone.
///
/// # Safety
/// `to` must point at a live suspend point. Nothing on the current stack is
/// used again.
pub(crate) unsafe fn abandon(to: NonNull<SuspendPoint>) -> ! {
    // SAFETY: forwarded from the caller.
    unsafe { arch::restore_context(ptr::addr_of!((*to.as_ptr()).regs)) }
}

/// Stops preemption, releases every thread and exits successfully. Must run
/// on the main thread's stack.
pub(crate) fn shutdown() -> ! {
    QuantumTimer::disarm();
    uninstall_quantum_handler();
    if let Some(runtime) = RUNTIME.take() {
        log::debug!(
            "uthreads shutting down after {} quantums",
            runtime.scheduler.total_quantums()
        );
        drop(runtime);
    }
    std::process::exit(0)
}

pub(crate) fn current_tid() -> Tid {
    query(Scheduler::current_tid).unwrap_or(MAIN_TID)
}

fn exit_requested() -> bool {
    query(Scheduler::exit_requested).unwrap_or(false)
}

/// Teardown hook for fatal exits.
fn release_for_exit() {
    QuantumTimer::disarm();
    RUNTIME.with_some_mut(|rt| rt.scheduler.release_for_exit());
}

/// First code every spawned thread runs, entered from the trampoline with
/// preemption still masked by the switch that dispatched it.
extern "C" fn thread_start() -> ! {
    let started = query(|sched| {
        (
            sched.current_tid(),
            sched.current_entry(),
            sched.current_suspend_point().map(|point| point.sigmask),
        )
    });
    let Some((tid, Some(entry), Some(sigmask))) = started else {
        fatal(SystemError::Scheduler(
            "a new thread was dispatched without an entry point".into(),
        ))
    };

    sigmask.apply();
    entry.call();
    exit_returned_thread(tid)
}

fn exit_returned_thread(tid: Tid) -> ! {
    let err = match crate::terminate(tid) {
        Ok(()) => Error::InvalidOperation("a thread outlived its own termination"),
        Err(err) => err,
    };
    fatal(SystemError::Scheduler(err.to_string()))
}

extern "C" fn on_quantum_expired(_signum: c_int) {
    let errno = SavedErrno::save();

    match decide(Scheduler::on_quantum_expired) {
        // SAFETY: the decision was just made; the signal is masked while
        // its handler runs.
        Ok((switch, timer)) => unsafe { perform(switch, timer) },
        Err(Error::NotInitialized) => {}
        Err(err) => fatal(SystemError::Scheduler(err.to_string())),
    }

    errno.restore();
}
