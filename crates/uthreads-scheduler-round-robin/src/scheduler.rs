use std::collections::VecDeque;
use std::mem;
use std::ptr::NonNull;

use foundation::utils::IdBitmap;

use crate::context::SuspendPoint;
use crate::error::{Error, Result};
use crate::thread::{Entry, ThreadControlBlock, ThreadStart, ThreadState, Tid, MAIN_TID};

pub const MAX_THREADS: usize = 100;
pub const DEFAULT_STACK_SIZE: usize = 64 * 1024;

/// One context transfer decided by the scheduler. The caller performs it
/// after releasing every borrow of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Switch {
    pub from_tid: Tid,
    /// `None` when the outgoing thread no longer exists and its context must
    /// not be saved.
    pub from: Option<NonNull<SuspendPoint>>,
    pub to_tid: Tid,
    pub to: NonNull<SuspendPoint>,
}

impl Switch {
    /// The outgoing thread was picked again; nothing needs restoring.
    #[inline]
    pub fn is_resume_self(&self) -> bool {
        self.from == Some(self.to)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// A thread other than the caller was removed.
    Removed,
    /// The caller terminated itself. Its control block is freed by the next
    /// scheduling decision, once execution has left its stack.
    SelfTerminated(Switch),
    /// The main thread was terminated and the process must exit. When the
    /// caller is not main, control has to return to main first.
    Shutdown {
        resume_main: Option<NonNull<SuspendPoint>>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Outgoing {
    Suspended,
    Exited,
}

/// Round-robin scheduling state for a single physical executor.
///
/// The main thread is always registered under [`MAIN_TID`]. The running
/// thread is never in the ready queue; every queued thread is `Ready` with no
/// pending sleep.
pub struct Scheduler {
    threads: [Option<Box<ThreadControlBlock>>; MAX_THREADS],
    ready: VecDeque<Tid>,
    ids: IdBitmap,
    current: Tid,
    pending_free: Option<Box<ThreadControlBlock>>,
    total_quantums: u64,
    stack_size: usize,
    start: ThreadStart,
    exit_requested: bool,
}

impl Scheduler {
    pub fn new(stack_size: usize, start: ThreadStart) -> Self {
        let mut threads: [Option<Box<ThreadControlBlock>>; MAX_THREADS] =
            std::array::from_fn(|_| None);
        threads[MAIN_TID] = Some(Box::new(ThreadControlBlock::new_main()));
        let mut ids = IdBitmap::new(MAX_THREADS);
        ids.insert(MAIN_TID);

        Self {
            threads,
            // Sized for every thread up front so scheduling from the signal
            // handler never allocates.
            ready: VecDeque::with_capacity(MAX_THREADS),
            ids,
            current: MAIN_TID,
            pending_free: None,
            total_quantums: 0,
            stack_size,
            start,
            exit_requested: false,
        }
    }

    /// Accounts the quantum the main thread is already running in.
    pub fn begin(&mut self) {
        self.total_quantums = 1;
        if let Some(main) = self.threads[MAIN_TID].as_deref_mut() {
            main.inc_quantums_ran();
        }
    }

    #[inline]
    pub fn current_tid(&self) -> Tid {
        self.current
    }

    #[inline]
    pub fn total_quantums(&self) -> u64 {
        self.total_quantums
    }

    #[inline]
    pub fn stack_size(&self) -> usize {
        self.stack_size
    }

    /// Number of live threads, main included.
    pub fn thread_count(&self) -> usize {
        self.ids.taken()
    }

    #[inline]
    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    pub fn thread(&self, tid: Tid) -> Option<&ThreadControlBlock> {
        self.threads.get(tid)?.as_deref()
    }

    pub fn live_tids(&self) -> impl Iterator<Item = Tid> + '_ {
        self.ids.iter()
    }

    pub fn ready_queue(&self) -> impl Iterator<Item = Tid> + '_ {
        self.ready.iter().copied()
    }

    #[inline]
    pub fn has_pending_free(&self) -> bool {
        self.pending_free.is_some()
    }

    pub fn current_entry(&self) -> Option<Entry> {
        self.thread(self.current)?.entry()
    }

    pub fn current_suspend_point(&self) -> Option<&SuspendPoint> {
        self.thread(self.current).map(ThreadControlBlock::suspend_point)
    }

    pub fn quantums(&self, tid: Tid) -> Result<u64> {
        self.check_live(tid)?;
        Ok(self.threads[tid]
            .as_deref()
            .map_or(0, ThreadControlBlock::quantums_ran))
    }

    /// Registers a new `Ready` thread under the lowest free id and appends it
    /// to the ready queue.
    pub fn spawn(&mut self, entry: Entry) -> Result<Tid> {
        let tid = self
            .ids
            .allocate_lowest()
            .ok_or(Error::ResourceExhausted { max: MAX_THREADS })?;
        let tcb = ThreadControlBlock::new(tid, entry, self.stack_size, self.start);
        self.threads[tid] = Some(Box::new(tcb));
        self.ready.push_back(tid);
        Ok(tid)
    }

    pub fn terminate(&mut self, tid: Tid) -> Result<Termination> {
        self.check_live(tid)?;

        if tid == MAIN_TID {
            self.exit_requested = true;
            if self.current == MAIN_TID {
                return Ok(Termination::Shutdown { resume_main: None });
            }
            self.current = MAIN_TID;
            return Ok(Termination::Shutdown {
                resume_main: self.suspend_ptr(MAIN_TID),
            });
        }

        if tid == self.current {
            // Still executing on this stack: park the block until the next
            // decision instead of freeing it here.
            self.finish_pending();
            self.pending_free = self.threads[tid].take();
            self.ids.remove(tid);
            return self.select_next(Outgoing::Exited).map(Termination::SelfTerminated);
        }

        self.ready.retain(|queued| *queued != tid);
        self.threads[tid] = None;
        self.ids.remove(tid);
        Ok(Termination::Removed)
    }

    /// Blocks `tid`. Returns the switch to perform when the caller blocked
    /// itself. Blocking an already blocked thread changes nothing.
    pub fn block(&mut self, tid: Tid) -> Result<Option<Switch>> {
        self.check_live(tid)?;
        if tid == MAIN_TID {
            return Err(Error::InvalidOperation("the main thread cannot be blocked"));
        }

        if let Some(tcb) = self.threads[tid].as_deref_mut() {
            tcb.set_state(ThreadState::Blocked);
        }
        if tid == self.current {
            return self.dispatch(Outgoing::Suspended).map(Some);
        }
        self.ready.retain(|queued| *queued != tid);
        Ok(None)
    }

    /// Lifts a block. A thread whose sleep has not run out yet keeps
    /// sleeping; anything not blocked is left alone.
    pub fn resume(&mut self, tid: Tid) -> Result<()> {
        self.check_live(tid)?;
        let Some(tcb) = self.threads[tid].as_deref_mut() else {
            return Ok(());
        };
        if tcb.state() != ThreadState::Blocked {
            return Ok(());
        }
        if tcb.sleep_countdown() == 0 {
            tcb.set_state(ThreadState::Ready);
            self.ready.push_back(tid);
        } else {
            tcb.set_state(ThreadState::Sleeping);
        }
        Ok(())
    }

    /// Puts the caller to sleep for `quantums` scheduling decisions. Zero
    /// gives up the rest of the quantum and requeues the caller at the tail.
    pub fn sleep(&mut self, quantums: i32) -> Result<Switch> {
        let quantums = u32::try_from(quantums)
            .map_err(|_| Error::InvalidArgument("sleep quantums must not be negative"))?;
        if self.current == MAIN_TID {
            return Err(Error::InvalidOperation("the main thread cannot sleep"));
        }

        if quantums > 0 {
            if let Some(tcb) = self.threads[self.current].as_deref_mut() {
                tcb.set_state(ThreadState::Sleeping);
                tcb.set_sleep_countdown(quantums);
            }
        }
        self.dispatch(Outgoing::Suspended)
    }

    /// Quantum expiry: the running thread goes to the back of the queue.
    pub fn on_quantum_expired(&mut self) -> Result<Switch> {
        self.dispatch(Outgoing::Suspended)
    }

    /// Frees the control block of a thread that terminated itself. Must only
    /// run once execution is on another stack.
    pub fn finish_pending(&mut self) {
        self.pending_free = None;
    }

    /// Releases every thread whose stack is not possibly in use, before a
    /// fatal exit. The running thread and a pending self-terminated thread
    /// are leaked instead.
    pub fn release_for_exit(&mut self) {
        self.ready.clear();
        let running = self.current;
        for (tid, slot) in self.threads.iter_mut().enumerate() {
            match slot.take() {
                Some(tcb) if tid == running && !tcb.is_main() => mem::forget(tcb),
                other => drop(other),
            }
        }
        if let Some(zombie) = self.pending_free.take() {
            mem::forget(zombie);
        }
        self.ids = IdBitmap::new(MAX_THREADS);
    }

    fn check_live(&self, tid: Tid) -> Result<()> {
        if tid >= MAX_THREADS {
            return Err(Error::InvalidId(tid as i64));
        }
        if !self.ids.contains(tid) {
            return Err(Error::NoSuchThread(tid));
        }
        Ok(())
    }

    fn suspend_ptr(&mut self, tid: Tid) -> Option<NonNull<SuspendPoint>> {
        self.threads[tid]
            .as_deref_mut()
            .map(ThreadControlBlock::suspend_ptr)
    }

    fn dispatch(&mut self, outgoing: Outgoing) -> Result<Switch> {
        self.finish_pending();
        self.select_next(outgoing)
    }

    fn select_next(&mut self, outgoing: Outgoing) -> Result<Switch> {
        let prev = self.current;
        let from = match outgoing {
            Outgoing::Exited => None,
            Outgoing::Suspended => {
                let tcb = self.threads[prev]
                    .as_deref_mut()
                    .ok_or(Error::NoSuchThread(prev))?;
                if tcb.state() == ThreadState::Ready && tcb.sleep_countdown() == 0 {
                    self.ready.push_back(prev);
                }
                Some(tcb.suspend_ptr())
            }
        };

        self.wake_sleepers(prev);

        let next = self.ready.pop_front().ok_or(Error::ReadyQueueEmpty)?;
        let tcb = self.threads[next]
            .as_deref_mut()
            .ok_or(Error::NoSuchThread(next))?;
        tcb.inc_quantums_ran();
        self.total_quantums += 1;
        self.current = next;

        Ok(Switch {
            from_tid: prev,
            from,
            to_tid: next,
            to: tcb.suspend_ptr(),
        })
    }

    /// Counts one decision off every pending sleep. A sleeper whose count
    /// runs out becomes `Ready` unless it was blocked meanwhile, in which
    /// case it waits for `resume`.
    fn wake_sleepers(&mut self, outgoing: Tid) {
        for (tid, slot) in self.threads.iter_mut().enumerate() {
            if tid == outgoing {
                continue;
            }
            let Some(tcb) = slot.as_deref_mut() else {
                continue;
            };
            match tcb.sleep_countdown() {
                0 => {}
                1 => {
                    tcb.set_sleep_countdown(0);
                    if tcb.state() != ThreadState::Blocked {
                        tcb.set_state(ThreadState::Ready);
                        self.ready.push_back(tid);
                    }
                }
                n => tcb.set_sleep_countdown(n - 1),
            }
        }
    }
}
