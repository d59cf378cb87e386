//! Drives the live runtime: real timer signals and real context switches.
//!
//! Runs without the test harness because the library must own the process
//! main thread. Threads spawned here only touch atomics and call the library,
//! so none of them can be preempted while holding the allocator's lock.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use uthreads::{Error, MAIN_TID};

const QUANTUM_USECS: i32 = 2_000;
const DEADLINE: Duration = Duration::from_secs(20);

static SPIN_A: AtomicU64 = AtomicU64::new(0);
static SPIN_B: AtomicU64 = AtomicU64::new(0);
static SLEPT_AT: AtomicU64 = AtomicU64::new(0);
static WOKE_AT: AtomicU64 = AtomicU64::new(0);
static RETURNED: AtomicBool = AtomicBool::new(false);
static QUIT: AtomicBool = AtomicBool::new(false);

fn spin_a() {
    loop {
        SPIN_A.fetch_add(1, Ordering::Relaxed);
    }
}

fn spin_b() {
    loop {
        SPIN_B.fetch_add(1, Ordering::Relaxed);
    }
}

fn sleeper() {
    SLEPT_AT.store(uthreads::get_total_quantums(), Ordering::SeqCst);
    let _ = uthreads::sleep(3);
    WOKE_AT.store(uthreads::get_total_quantums(), Ordering::SeqCst);
    loop {
        let _ = uthreads::sleep(0);
    }
}

fn returns_early() {
    RETURNED.store(true, Ordering::SeqCst);
}

fn quits() {
    QUIT.store(true, Ordering::SeqCst);
    let _ = uthreads::terminate(uthreads::get_current_id());
    loop {
        std::hint::spin_loop();
    }
}

fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let start = Instant::now();
    while !cond() {
        assert!(start.elapsed() < DEADLINE, "timed out waiting for {what}");
        std::hint::spin_loop();
    }
}

fn wait_quantums(n: u64) {
    let target = uthreads::get_total_quantums() + n;
    wait_until("quantums to pass", || uthreads::get_total_quantums() >= target);
}

fn check_rejections() {
    assert!(matches!(uthreads::init(QUANTUM_USECS), Err(Error::InvalidOperation(_))));
    assert!(matches!(uthreads::block(MAIN_TID), Err(Error::InvalidOperation(_))));
    assert!(matches!(uthreads::sleep(1), Err(Error::InvalidOperation(_))));
    assert_eq!(uthreads::terminate(42), Err(Error::NoSuchThread(42)));
    assert_eq!(
        uthreads::get_quantums(uthreads::MAX_THREADS),
        Err(Error::InvalidId(uthreads::MAX_THREADS as i64))
    );
}

fn check_preemption() -> (usize, usize) {
    let a = uthreads::spawn(spin_a).unwrap();
    let b = uthreads::spawn(spin_b).unwrap();
    assert_eq!((a, b), (1, 2));
    assert_eq!(uthreads::thread_count(), 3);

    wait_until("both spinners to run", || {
        SPIN_A.load(Ordering::Relaxed) > 0 && SPIN_B.load(Ordering::Relaxed) > 0
    });
    assert_eq!(uthreads::get_current_id(), MAIN_TID);
    assert!(uthreads::get_quantums(a).unwrap() >= 1);
    assert!(uthreads::get_quantums(MAIN_TID).unwrap() >= 2);
    (a, b)
}

fn check_block_resume(a: usize) {
    uthreads::block(a).unwrap();
    let frozen = SPIN_A.load(Ordering::Relaxed);
    let quantums = uthreads::get_quantums(a).unwrap();
    wait_quantums(10);
    assert_eq!(SPIN_A.load(Ordering::Relaxed), frozen);
    assert_eq!(uthreads::get_quantums(a).unwrap(), quantums);

    uthreads::resume(a).unwrap();
    wait_until("the resumed spinner to run", || {
        SPIN_A.load(Ordering::Relaxed) > frozen
    });
}

fn check_sleep() {
    let tid = uthreads::spawn(sleeper).unwrap();
    wait_until("the sleeper to wake", || WOKE_AT.load(Ordering::SeqCst) > 0);
    let slept = WOKE_AT.load(Ordering::SeqCst) - SLEPT_AT.load(Ordering::SeqCst);
    assert!(slept >= 4, "woke after {slept} quantums");
    uthreads::terminate(tid).unwrap();
}

fn check_self_termination() {
    let before = uthreads::thread_count();

    let tid = uthreads::spawn(returns_early).unwrap();
    wait_until("the returning thread to finish", || {
        RETURNED.load(Ordering::SeqCst) && uthreads::thread_count() == before
    });
    assert_eq!(uthreads::get_quantums(tid), Err(Error::NoSuchThread(tid)));

    let tid = uthreads::spawn(quits).unwrap();
    wait_until("the quitting thread to finish", || {
        QUIT.load(Ordering::SeqCst) && uthreads::thread_count() == before
    });
    // Freed ids are handed out again.
    assert_eq!(uthreads::spawn(returns_early).unwrap(), tid);
}

fn main() {
    uthreads::init(QUANTUM_USECS).unwrap();
    assert_eq!(uthreads::get_current_id(), MAIN_TID);
    assert_eq!(uthreads::get_total_quantums(), 1);
    assert_eq!(uthreads::get_quantums(MAIN_TID), Ok(1));

    check_rejections();
    let (a, b) = check_preemption();
    check_block_resume(a);
    check_sleep();
    check_self_termination();

    uthreads::terminate(b).unwrap();
    assert_eq!(uthreads::get_quantums(b), Err(Error::NoSuchThread(b)));

    println!("preemption: ok");
    uthreads::terminate(MAIN_TID).unwrap();
    unreachable!("terminating thread 0 exits the process");
}
