//! Preemptive user-space threads.
//!
//! Up to [`MAX_THREADS`] logical threads share the calling OS thread and are
//! scheduled round-robin. A thread runs until it blocks, sleeps, terminates
//! or uses up its quantum, which is measured in user CPU time with
//! `ITIMER_VIRTUAL` and delivered as `SIGVTALRM`.
//!
//! ```no_run
//! fn worker() {
//!     loop {
//!         uthreads::sleep(1).unwrap();
//!     }
//! }
//!
//! uthreads::init(10_000).unwrap();
//! let tid = uthreads::spawn(worker).unwrap();
//! while uthreads::get_quantums(tid).unwrap() < 5 {}
//! uthreads::terminate(uthreads::MAIN_TID).unwrap();
//! ```
//!
//! Code running on these threads must not hold locks across preemption
//! points another thread might contend on, the allocator's and stdout's
//! included. Wrap such code in [`enter_critical`].

pub mod config;
#[cfg(feature = "ffi")]
pub mod ffi;
mod ops;
mod runtime;

pub use config::{Config, ConfigBuilder, ConfigBuilderError, MIN_STACK_SIZE};
pub use ops::{
    block, get_current_id, get_quantums, get_total_quantums, init, init_with, resume, sleep,
    spawn, terminate, thread_count,
};
pub use os_linux::{enter_critical, PreemptGuard};
pub use scheduler_round_robin::{Error, Result, Tid, DEFAULT_STACK_SIZE, MAIN_TID, MAX_THREADS};
