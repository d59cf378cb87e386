use foundation::ArchContext;
use os_linux::SignalMask;

pub type Context = arch::Context;

/// Everything needed to resume a logical thread exactly where it stopped:
/// callee-saved registers (stack and instruction pointer included) and the
/// signal mask that was in force.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct SuspendPoint {
    pub regs: Context,
    pub sigmask: SignalMask,
}

impl SuspendPoint {
    pub fn new() -> Self {
        Self {
            regs: Context::new(),
            sigmask: SignalMask::empty(),
        }
    }
}

impl Default for SuspendPoint {
    fn default() -> Self {
        Self::new()
    }
}
