pub mod context;
pub mod error;
pub mod scheduler;
pub mod thread;

pub use context::{Context, SuspendPoint};
pub use error::{Error, Result};
pub use scheduler::{Scheduler, Switch, Termination, DEFAULT_STACK_SIZE, MAX_THREADS};
pub use thread::{Entry, ThreadControlBlock, ThreadStart, ThreadState, Tid, MAIN_TID};

#[cfg(test)]
mod tests;
