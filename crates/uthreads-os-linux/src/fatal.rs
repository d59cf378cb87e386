use std::io;

use foundation::utils::GlobalCell;
use thiserror::Error;

/// Failures of the underlying system primitives. These are never returned to
/// callers; they end the process through [`fatal`].
#[derive(Debug, Error)]
pub enum SystemError {
    #[error("system error: the sigaction system call has failed: {0}")]
    SigAction(#[source] io::Error),

    #[error("system error: the sigprocmask system call has failed: {0}")]
    SigProcMask(#[source] io::Error),

    #[error("system error: the setitimer system call has failed: {0}")]
    SetTimer(#[source] io::Error),

    #[error("system error: {0}")]
    Scheduler(String),
}

impl SystemError {
    pub(crate) fn last_os(ctor: fn(io::Error) -> SystemError) -> SystemError {
        ctor(io::Error::last_os_error())
    }
}

static TEARDOWN: GlobalCell<Option<fn()>> = GlobalCell::new(None);

/// Registers the routine [`fatal`] runs before exiting, to release whatever
/// thread resources can still be released safely.
pub fn set_teardown(teardown: fn()) {
    TEARDOWN.replace(Some(teardown));
}

/// Reports `err`, runs the teardown hook once, and exits with status 1.
pub fn fatal(err: SystemError) -> ! {
    log::error!("{err}");
    if let Some(teardown) = TEARDOWN.replace(None) {
        teardown();
    }
    std::process::exit(1)
}
