use core::ptr::NonNull;

use foundation::utils::ThreadStack;
use os_linux::SignalMask;

use crate::context::SuspendPoint;

pub type Tid = usize;

/// The thread that was running when the library was initialized.
pub const MAIN_TID: Tid = 0;

/// Routine a fresh context starts in. It reads the current thread's
/// [`Entry`] and must never return.
pub type ThreadStart = extern "C" fn() -> !;

/// Scheduling status. The running thread stays `Ready`; which thread is
/// running is tracked by the scheduler, not by the control block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Ready,
    Blocked,
    Sleeping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    Rust(fn()),
    Foreign(extern "C" fn()),
}

impl Entry {
    pub fn call(self) {
        match self {
            Entry::Rust(f) => f(),
            Entry::Foreign(f) => f(),
        }
    }
}

/// Per-thread record. A spawned thread owns its stack; the main thread runs
/// on the process stack and owns none.
///
/// Cloning copies the saved context verbatim and the stack into a new
/// allocation, so the clone's stack pointer still refers to the original's
/// stack.
#[derive(Debug, Clone)]
pub struct ThreadControlBlock {
    tid: Tid,
    state: ThreadState,
    sleep_countdown: u32,
    quantums_ran: u64,
    suspend: SuspendPoint,
    stack: Option<ThreadStack>,
    entry: Option<Entry>,
}

impl ThreadControlBlock {
    /// Builds a `Ready` thread whose first resume enters `start` on a fresh
    /// stack of `stack_size` bytes, with every signal unmasked.
    pub fn new(tid: Tid, entry: Entry, stack_size: usize, start: ThreadStart) -> Self {
        debug_assert_ne!(tid, MAIN_TID, "the main thread is never spawned");

        let mut stack = ThreadStack::new(stack_size);
        // Two zero words give the trampoline a null return slot to unwind to.
        let sp = stack.prime(&[0, 0]);
        let mut suspend = SuspendPoint::new();
        arch::prime(&mut suspend.regs, sp, start);
        suspend.sigmask = SignalMask::empty();

        Self {
            tid,
            state: ThreadState::Ready,
            sleep_countdown: 0,
            quantums_ran: 0,
            suspend,
            stack: Some(stack),
            entry: Some(entry),
        }
    }

    /// The main thread's record. Its context is filled in the first time it
    /// is switched away from.
    pub fn new_main() -> Self {
        Self {
            tid: MAIN_TID,
            state: ThreadState::Ready,
            sleep_countdown: 0,
            quantums_ran: 0,
            suspend: SuspendPoint::new(),
            stack: None,
            entry: None,
        }
    }

    #[inline]
    pub fn tid(&self) -> Tid {
        self.tid
    }

    #[inline]
    pub fn is_main(&self) -> bool {
        self.tid == MAIN_TID
    }

    #[inline]
    pub fn state(&self) -> ThreadState {
        self.state
    }

    #[inline]
    pub fn set_state(&mut self, state: ThreadState) {
        self.state = state;
    }

    #[inline]
    pub fn sleep_countdown(&self) -> u32 {
        self.sleep_countdown
    }

    #[inline]
    pub fn set_sleep_countdown(&mut self, quantums: u32) {
        self.sleep_countdown = quantums;
    }

    #[inline]
    pub fn quantums_ran(&self) -> u64 {
        self.quantums_ran
    }

    #[inline]
    pub fn inc_quantums_ran(&mut self) {
        self.quantums_ran += 1;
    }

    #[inline]
    pub fn entry(&self) -> Option<Entry> {
        self.entry
    }

    #[inline]
    pub fn stack(&self) -> Option<&ThreadStack> {
        self.stack.as_ref()
    }

    #[inline]
    pub fn suspend_point(&self) -> &SuspendPoint {
        &self.suspend
    }

    /// Stable address of the saved context. Control blocks are boxed, so it
    /// stays valid until the block is dropped.
    #[inline]
    pub(crate) fn suspend_ptr(&mut self) -> NonNull<SuspendPoint> {
        NonNull::from(&mut self.suspend)
    }
}
