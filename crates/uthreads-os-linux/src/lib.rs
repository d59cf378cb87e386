//! Preemption and atomicity for a single physical executor.
//!
//! Quantum expiry arrives as `SIGVTALRM` from an `ITIMER_VIRTUAL` timer.
//! Masking that one signal is the only synchronization the scheduler needs:
//! [`enter_critical`] masks it and the returned [`PreemptGuard`] restores the
//! previous mask when dropped, on every exit path.

pub mod fatal;
pub mod signal;
pub mod timer;

pub use fatal::{fatal, set_teardown, SystemError};
pub use signal::{
    enter_critical, install_quantum_handler, leave_critical, uninstall_quantum_handler,
    PreemptGuard, SavedErrno, SignalMask,
};
pub use timer::QuantumTimer;
