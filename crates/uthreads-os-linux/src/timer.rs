use core::ptr;

use crate::fatal::{fatal, SystemError};

const USECS_PER_SEC: u32 = 1_000_000;

/// Repeating `ITIMER_VIRTUAL` interval of one quantum. The timer only runs
/// while the process is executing in user mode.
#[derive(Clone, Copy)]
pub struct QuantumTimer {
    interval: libc::itimerval,
}

impl QuantumTimer {
    pub fn new(quantum_usecs: u32) -> Self {
        let slice = libc::timeval {
            tv_sec: (quantum_usecs / USECS_PER_SEC) as libc::time_t,
            tv_usec: (quantum_usecs % USECS_PER_SEC) as libc::suseconds_t,
        };
        Self {
            interval: libc::itimerval {
                it_interval: slice,
                it_value: slice,
            },
        }
    }

    pub fn quantum_usecs(&self) -> u64 {
        let value = &self.interval.it_value;
        value.tv_sec as u64 * USECS_PER_SEC as u64 + value.tv_usec as u64
    }

    /// Restarts the countdown so the next expiry is a full quantum away.
    pub fn arm(&self) {
        set_virtual_timer(&self.interval);
    }

    pub fn disarm() {
        let zero = libc::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        set_virtual_timer(&libc::itimerval {
            it_interval: zero,
            it_value: zero,
        });
    }
}

impl core::fmt::Debug for QuantumTimer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("QuantumTimer")
            .field("quantum_usecs", &self.quantum_usecs())
            .finish()
    }
}

fn set_virtual_timer(value: &libc::itimerval) {
    // SAFETY: `value` is a valid itimerval; the old value is not requested.
    let rc = unsafe { libc::setitimer(libc::ITIMER_VIRTUAL, value, ptr::null_mut()) };
    if rc != 0 {
        fatal(SystemError::last_os(SystemError::SetTimer));
    }
}
