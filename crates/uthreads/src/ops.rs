//! The public thread operations. Each one masks preemption for its whole
//! duration, including error returns.

use os_linux::{enter_critical, fatal, SystemError};
use scheduler_round_robin::{Entry, Error, Result, Termination, Tid};

use crate::config::Config;
use crate::runtime;

/// Logs a failed operation before it is handed back. An error the scheduler
/// cannot recover from ends the process instead.
pub(crate) fn report<T>(result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        if err.is_fatal() {
            fatal(SystemError::Scheduler(err.to_string()));
        }
        log::error!("{err}");
    }
    result
}

/// Starts the library with quantums of `quantum_usecs` microseconds of user
/// CPU time. The caller becomes thread 0 and keeps running.
pub fn init(quantum_usecs: i32) -> Result<()> {
    init_with(Config::new(quantum_usecs))
}

pub fn init_with(config: Config) -> Result<()> {
    let _guard = enter_critical();
    report(runtime::start(config))
}

/// Creates a thread that runs `entry` once dispatched. Returning from `entry`
/// terminates the thread.
pub fn spawn(entry: fn()) -> Result<Tid> {
    spawn_entry(Entry::Rust(entry))
}

pub(crate) fn spawn_entry(entry: Entry) -> Result<Tid> {
    let _guard = enter_critical();
    let tid = report(runtime::with_scheduler(|sched| sched.spawn(entry)))?;
    log::debug!("spawned thread {tid}");
    Ok(tid)
}

/// Terminates thread `tid`.
///
/// Terminating the caller never returns. Terminating thread 0 releases every
/// thread and exits the process with status 0.
pub fn terminate(tid: Tid) -> Result<()> {
    let _guard = enter_critical();
    let (termination, timer) = report(runtime::decide(|sched| sched.terminate(tid)))?;
    match termination {
        Termination::Removed => {
            log::debug!("terminated thread {tid}");
            Ok(())
        }
        Termination::SelfTerminated(switch) => {
            log::debug!("thread {tid} terminated itself");
            // SAFETY: fresh decision, preemption masked.
            unsafe { runtime::perform(switch, timer) };
            unreachable!("a terminated thread was dispatched again")
        }
        Termination::Shutdown { resume_main: None } => runtime::shutdown(),
        Termination::Shutdown {
            resume_main: Some(main),
        } => {
            log::debug!("thread 0 terminated from another thread");
            // SAFETY: main's control block lives until shutdown, which main
            // performs as soon as it resumes.
            unsafe { runtime::abandon(main) }
        }
    }
}

/// Blocks thread `tid` until it is resumed. A thread blocking itself is
/// switched out before this returns.
pub fn block(tid: Tid) -> Result<()> {
    let _guard = enter_critical();
    let (switch, timer) = report(runtime::decide(|sched| sched.block(tid)))?;
    if let Some(switch) = switch {
        // SAFETY: fresh decision, preemption masked.
        unsafe { runtime::perform(switch, timer) };
    }
    Ok(())
}

/// Makes a blocked thread schedulable again. Not an error for threads that
/// are not blocked.
pub fn resume(tid: Tid) -> Result<()> {
    let _guard = enter_critical();
    report(runtime::with_scheduler(|sched| sched.resume(tid)))
}

/// Suspends the calling thread for `quantums` dispatches. `sleep(0)` yields
/// the rest of the current quantum. Thread 0 cannot sleep.
pub fn sleep(quantums: i32) -> Result<()> {
    let _guard = enter_critical();
    let (switch, timer) = report(runtime::decide(|sched| sched.sleep(quantums)))?;
    // SAFETY: fresh decision, preemption masked.
    unsafe { runtime::perform(switch, timer) };
    Ok(())
}

pub fn get_current_id() -> Tid {
    let _guard = enter_critical();
    runtime::current_tid()
}

/// Number of dispatches since `init`, the first quantum included.
pub fn get_total_quantums() -> u64 {
    let _guard = enter_critical();
    runtime::query(|sched| sched.total_quantums()).unwrap_or(0)
}

/// Number of quantums thread `tid` has been dispatched for.
pub fn get_quantums(tid: Tid) -> Result<u64> {
    let _guard = enter_critical();
    report(
        runtime::query(|sched| sched.quantums(tid)).unwrap_or(Err(Error::NotInitialized)),
    )
}

/// Live threads, thread 0 included. Zero before `init`.
pub fn thread_count() -> usize {
    let _guard = enter_critical();
    runtime::query(|sched| sched.thread_count()).unwrap_or(0)
}
