use super::*;

extern "C" fn parked() -> ! {
    loop {
        core::hint::spin_loop();
    }
}

fn work() {}

fn scheduler() -> Scheduler {
    let mut sched = Scheduler::new(DEFAULT_STACK_SIZE, parked);
    sched.begin();
    sched
}

fn spawn_n(sched: &mut Scheduler, n: usize) -> Vec<Tid> {
    (0..n).map(|_| sched.spawn(Entry::Rust(work)).unwrap()).collect()
}

fn queue(sched: &Scheduler) -> Vec<Tid> {
    sched.ready_queue().collect()
}

fn state(sched: &Scheduler, tid: Tid) -> ThreadState {
    sched.thread(tid).unwrap().state()
}

/// Checks the structural invariants that must hold between calls.
fn assert_consistent(sched: &Scheduler) {
    let live: Vec<Tid> = sched.live_tids().collect();
    for tid in 0..MAX_THREADS {
        assert_eq!(sched.thread(tid).is_some(), live.contains(&tid), "tid {tid}");
    }
    assert!(live.contains(&MAIN_TID));
    assert!(live.contains(&sched.current_tid()));

    let ready = queue(sched);
    for (i, tid) in ready.iter().enumerate() {
        assert!(!ready[i + 1..].contains(tid), "{tid} queued twice");
        assert_ne!(*tid, sched.current_tid(), "running thread is queued");
        let tcb = sched.thread(*tid).unwrap();
        assert_eq!(tcb.state(), ThreadState::Ready);
        assert_eq!(tcb.sleep_countdown(), 0);
    }
    for tid in live {
        let tcb = sched.thread(tid).unwrap();
        if tcb.state() == ThreadState::Sleeping {
            assert!(tcb.sleep_countdown() > 0);
        }
    }
}

#[test]
fn test_initial_state() {
    let sched = scheduler();
    assert_eq!(sched.current_tid(), MAIN_TID);
    assert_eq!(sched.total_quantums(), 1);
    assert_eq!(sched.quantums(MAIN_TID), Ok(1));
    assert_eq!(sched.thread_count(), 1);
    assert!(queue(&sched).is_empty());
    assert!(sched.thread(MAIN_TID).unwrap().stack().is_none());
    assert_consistent(&sched);
}

#[test]
fn test_spawn_assigns_lowest_ids_in_order() {
    let mut sched = scheduler();
    assert_eq!(spawn_n(&mut sched, 3), vec![1, 2, 3]);
    assert_eq!(queue(&sched), vec![1, 2, 3]);
    assert_eq!(sched.quantums(2), Ok(0));
    assert_eq!(sched.thread(2).unwrap().stack().unwrap().len(), DEFAULT_STACK_SIZE);
    assert_consistent(&sched);
}

#[test]
fn test_spawn_reuses_freed_id() {
    let mut sched = scheduler();
    spawn_n(&mut sched, 3);
    assert_eq!(sched.terminate(2), Ok(Termination::Removed));
    assert_eq!(queue(&sched), vec![1, 3]);
    assert_eq!(sched.spawn(Entry::Rust(work)), Ok(2));
    assert_eq!(queue(&sched), vec![1, 3, 2]);
    assert_consistent(&sched);
}

#[test]
fn test_spawn_fails_at_capacity() {
    let mut sched = scheduler();
    spawn_n(&mut sched, MAX_THREADS - 1);
    assert_eq!(sched.thread_count(), MAX_THREADS);
    assert_eq!(
        sched.spawn(Entry::Rust(work)),
        Err(Error::ResourceExhausted { max: MAX_THREADS })
    );
    assert_eq!(sched.thread_count(), MAX_THREADS);
}

#[test]
fn test_round_robin_rotation() {
    let mut sched = scheduler();
    spawn_n(&mut sched, 2);

    let mut order = Vec::new();
    for _ in 0..6 {
        let switch = sched.on_quantum_expired().unwrap();
        assert_eq!(switch.from_tid, order.last().copied().unwrap_or(MAIN_TID));
        order.push(switch.to_tid);
        assert_consistent(&sched);
    }
    assert_eq!(order, vec![1, 2, 0, 1, 2, 0]);
    assert_eq!(sched.total_quantums(), 7);
    assert_eq!(sched.quantums(MAIN_TID), Ok(3));
    assert_eq!(sched.quantums(1), Ok(2));
    assert_eq!(sched.quantums(2), Ok(2));
}

#[test]
fn test_lone_main_keeps_running() {
    let mut sched = scheduler();
    let switch = sched.on_quantum_expired().unwrap();
    assert_eq!(switch.to_tid, MAIN_TID);
    assert!(switch.is_resume_self());
    assert_eq!(sched.total_quantums(), 2);
    assert_eq!(sched.quantums(MAIN_TID), Ok(2));
}

#[test]
fn test_fairness_over_many_quantums() {
    let mut sched = scheduler();
    spawn_n(&mut sched, 4);
    for _ in 0..500 {
        sched.on_quantum_expired().unwrap();
    }
    let counts: Vec<u64> = (0..5).map(|tid| sched.quantums(tid).unwrap()).collect();
    let min = counts.iter().min().unwrap();
    let max = counts.iter().max().unwrap();
    assert!(max - min <= 1, "{counts:?}");
    assert_eq!(counts.iter().sum::<u64>(), sched.total_quantums());
}

#[test]
fn test_sleep_wakes_after_exact_number_of_decisions() {
    let mut sched = scheduler();
    spawn_n(&mut sched, 2);

    assert_eq!(sched.on_quantum_expired().unwrap().to_tid, 1);
    let switch = sched.sleep(3).unwrap();
    assert_eq!(switch.from_tid, 1);
    assert_eq!(switch.to_tid, 2);
    assert_eq!(state(&sched, 1), ThreadState::Sleeping);
    assert_eq!(sched.thread(1).unwrap().sleep_countdown(), 3);
    assert_eq!(queue(&sched), vec![0]);

    // Decisions 1 and 2 after the sleep only count down.
    assert_eq!(sched.on_quantum_expired().unwrap().to_tid, 0);
    assert_eq!(sched.on_quantum_expired().unwrap().to_tid, 2);
    assert_eq!(state(&sched, 1), ThreadState::Sleeping);
    assert_eq!(sched.thread(1).unwrap().sleep_countdown(), 1);

    // The third wakes it at the tail, behind the thread just preempted.
    assert_eq!(sched.on_quantum_expired().unwrap().to_tid, 0);
    assert_eq!(state(&sched, 1), ThreadState::Ready);
    assert_eq!(queue(&sched), vec![2, 1]);
    assert_consistent(&sched);
}

#[test]
fn test_sleep_zero_yields_to_tail() {
    let mut sched = scheduler();
    spawn_n(&mut sched, 2);
    sched.on_quantum_expired().unwrap();

    let switch = sched.sleep(0).unwrap();
    assert_eq!((switch.from_tid, switch.to_tid), (1, 2));
    assert_eq!(state(&sched, 1), ThreadState::Ready);
    assert_eq!(queue(&sched), vec![0, 1]);
    assert_consistent(&sched);
}

#[test]
fn test_sleep_rejections() {
    let mut sched = scheduler();
    assert!(matches!(sched.sleep(1), Err(Error::InvalidOperation(_))));
    spawn_n(&mut sched, 1);
    sched.on_quantum_expired().unwrap();
    assert!(matches!(sched.sleep(-1), Err(Error::InvalidArgument(_))));
    assert_eq!(sched.current_tid(), 1);
    assert_eq!(state(&sched, 1), ThreadState::Ready);
}

#[test]
fn test_block_and_resume_other_thread() {
    let mut sched = scheduler();
    spawn_n(&mut sched, 3);

    assert_eq!(sched.block(2), Ok(None));
    assert_eq!(state(&sched, 2), ThreadState::Blocked);
    assert_eq!(queue(&sched), vec![1, 3]);

    // Blocking twice is not an error.
    assert_eq!(sched.block(2), Ok(None));

    sched.resume(2).unwrap();
    assert_eq!(state(&sched, 2), ThreadState::Ready);
    assert_eq!(queue(&sched), vec![1, 3, 2]);

    // Resuming a ready thread changes nothing.
    sched.resume(2).unwrap();
    assert_eq!(queue(&sched), vec![1, 3, 2]);
    assert_consistent(&sched);
}

#[test]
fn test_block_self_switches_away() {
    let mut sched = scheduler();
    spawn_n(&mut sched, 2);
    sched.on_quantum_expired().unwrap();

    let switch = sched.block(1).unwrap().unwrap();
    assert_eq!((switch.from_tid, switch.to_tid), (1, 2));
    assert!(switch.from.is_some());
    assert_eq!(queue(&sched), vec![0]);

    sched.on_quantum_expired().unwrap();
    sched.on_quantum_expired().unwrap();
    assert_eq!(state(&sched, 1), ThreadState::Blocked);
    assert!(!queue(&sched).contains(&1));
    assert_consistent(&sched);
}

#[test]
fn test_block_main_is_rejected() {
    let mut sched = scheduler();
    assert!(matches!(sched.block(MAIN_TID), Err(Error::InvalidOperation(_))));
    assert_eq!(state(&sched, MAIN_TID), ThreadState::Ready);
}

#[test]
fn test_blocked_sleeper_waits_for_resume() {
    let mut sched = scheduler();
    spawn_n(&mut sched, 2);
    sched.on_quantum_expired().unwrap();
    sched.sleep(2).unwrap();
    // Thread 2 is running; thread 1 is sleeping.
    assert_eq!(sched.block(1), Ok(None));
    assert_eq!(state(&sched, 1), ThreadState::Blocked);
    assert_eq!(sched.thread(1).unwrap().sleep_countdown(), 2);

    for _ in 0..4 {
        sched.on_quantum_expired().unwrap();
    }
    assert_eq!(state(&sched, 1), ThreadState::Blocked);
    assert_eq!(sched.thread(1).unwrap().sleep_countdown(), 0);

    sched.resume(1).unwrap();
    assert_eq!(state(&sched, 1), ThreadState::Ready);
    assert_eq!(queue(&sched).last(), Some(&1));
    assert_consistent(&sched);
}

#[test]
fn test_resume_during_sleep_keeps_sleeping() {
    let mut sched = scheduler();
    spawn_n(&mut sched, 2);
    sched.on_quantum_expired().unwrap();
    sched.sleep(3).unwrap();
    sched.block(1).unwrap();

    sched.resume(1).unwrap();
    assert_eq!(state(&sched, 1), ThreadState::Sleeping);
    assert!(!queue(&sched).contains(&1));

    for _ in 0..3 {
        sched.on_quantum_expired().unwrap();
    }
    assert_eq!(state(&sched, 1), ThreadState::Ready);
    assert!(queue(&sched).contains(&1));
    assert_consistent(&sched);
}

#[test]
fn test_self_termination_defers_free() {
    let mut sched = scheduler();
    spawn_n(&mut sched, 2);
    sched.on_quantum_expired().unwrap();

    let Termination::SelfTerminated(switch) = sched.terminate(1).unwrap() else {
        panic!("expected a self-termination switch");
    };
    assert_eq!(switch.from, None);
    assert_eq!(switch.to_tid, 2);
    assert!(sched.has_pending_free());
    assert!(sched.thread(1).is_none());
    assert_eq!(sched.thread_count(), 2);

    // The id is free at once; the old block goes on the next decision.
    assert_eq!(sched.spawn(Entry::Rust(work)), Ok(1));
    sched.on_quantum_expired().unwrap();
    assert!(!sched.has_pending_free());
    assert_consistent(&sched);
}

#[test]
fn test_terminate_main_requests_shutdown() {
    let mut sched = scheduler();
    spawn_n(&mut sched, 1);
    assert_eq!(
        sched.terminate(MAIN_TID),
        Ok(Termination::Shutdown { resume_main: None })
    );
    assert!(sched.exit_requested());
}

#[test]
fn test_terminate_main_from_other_thread_returns_to_main() {
    let mut sched = scheduler();
    spawn_n(&mut sched, 1);
    sched.on_quantum_expired().unwrap();

    let Termination::Shutdown { resume_main } = sched.terminate(MAIN_TID).unwrap() else {
        panic!("expected shutdown");
    };
    assert!(resume_main.is_some());
    assert_eq!(sched.current_tid(), MAIN_TID);
    assert!(sched.exit_requested());
}

#[test]
fn test_invalid_ids() {
    let mut sched = scheduler();
    assert_eq!(sched.terminate(MAX_THREADS), Err(Error::InvalidId(MAX_THREADS as i64)));
    assert_eq!(sched.terminate(7), Err(Error::NoSuchThread(7)));
    assert_eq!(sched.block(7), Err(Error::NoSuchThread(7)));
    assert_eq!(sched.resume(7), Err(Error::NoSuchThread(7)));
    assert_eq!(sched.quantums(7), Err(Error::NoSuchThread(7)));
    assert_eq!(sched.total_quantums(), 1);
}

#[test]
fn test_current_entry_follows_switch() {
    extern "C" fn foreign() {}
    let mut sched = scheduler();
    sched.spawn(Entry::Foreign(foreign)).unwrap();
    assert_eq!(sched.current_entry(), None);
    sched.on_quantum_expired().unwrap();
    assert!(matches!(sched.current_entry(), Some(Entry::Foreign(_))));
    let point = sched.current_suspend_point().unwrap();
    assert!(!point.sigmask.blocks_preemption());
}

#[test]
fn test_clone_copies_stack_independently() {
    let mut sched = scheduler();
    spawn_n(&mut sched, 1);
    let original = sched.thread(1).unwrap();
    let copy = original.clone();

    assert_eq!(copy.tid(), original.tid());
    assert_eq!(copy.state(), original.state());
    let (a, b) = (original.stack().unwrap(), copy.stack().unwrap());
    assert_eq!(a.len(), b.len());
    assert_ne!(a.base(), b.base());
    assert_eq!(a.as_bytes(), b.as_bytes());
}

#[test]
fn test_release_for_exit_keeps_running_stack() {
    let mut sched = scheduler();
    spawn_n(&mut sched, 3);
    sched.on_quantum_expired().unwrap();
    sched.release_for_exit();
    assert_eq!(sched.thread_count(), 0);
    assert!(queue(&sched).is_empty());
    assert!(sched.thread(MAIN_TID).is_none());
}

#[test]
fn test_invariants_hold_under_mixed_operations() {
    let mut sched = scheduler();
    spawn_n(&mut sched, 6);
    for round in 0..200usize {
        let current = sched.current_tid();
        match round % 7 {
            0 if current != MAIN_TID => {
                sched.sleep((round % 4) as i32).unwrap();
            }
            1 => {
                let victim = 1 + round % 6;
                if victim != current && sched.thread(victim).is_some() {
                    sched.block(victim).unwrap();
                }
            }
            2 | 5 => {
                for tid in 1..7 {
                    if sched.thread(tid).is_some() {
                        sched.resume(tid).unwrap();
                    }
                }
            }
            3 if current != MAIN_TID && sched.thread_count() > 3 => {
                sched.terminate(current).unwrap();
            }
            4 if sched.thread_count() < 7 => {
                sched.spawn(Entry::Rust(work)).unwrap();
            }
            _ => {
                sched.on_quantum_expired().unwrap();
            }
        }
        assert_consistent(&sched);
    }
}
