use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{ensure, Context, Result};
use clap::Parser;
use uthreads::{ConfigBuilder, Tid, MAIN_TID, MAX_THREADS};

/// Round-robin demo: spawn spinning workers and watch them share the CPU
#[derive(Parser, Debug)]
#[command(name = "round-robin", version, about)]
struct Cli {
    /// Quantum length in microseconds of user CPU time
    #[arg(long, env = "UTHREADS_QUANTUM_USECS", default_value_t = 10_000)]
    quantum_usecs: i32,

    /// Number of worker threads
    #[arg(long, default_value_t = 4)]
    workers: usize,

    /// Number of progress reports before shutting down
    #[arg(long, default_value_t = 10)]
    rounds: u32,

    /// Per-thread stack size in KiB
    #[arg(long, default_value_t = 64)]
    stack_kib: usize,
}

const ZERO: AtomicU64 = AtomicU64::new(0);
static SPINS: [AtomicU64; MAX_THREADS] = [ZERO; MAX_THREADS];

/// Odd threads nap for a couple of quantums now and then; even ones spin.
fn worker() {
    let tid = uthreads::get_current_id();
    let mut spins = 0u64;
    loop {
        spins += 1;
        SPINS[tid].store(spins, Ordering::Relaxed);
        if tid % 2 == 1 && spins % (1 << 20) == 0 {
            let _ = uthreads::sleep(2);
        }
    }
}

fn report(round: u32, workers: &[Tid]) -> Result<()> {
    let _guard = uthreads::enter_critical();
    println!(
        "round {round}: total quantums {}",
        uthreads::get_total_quantums()
    );
    for &tid in workers {
        println!(
            "  thread {tid}: {} quantums, {} spins",
            uthreads::get_quantums(tid)?,
            SPINS[tid].load(Ordering::Relaxed)
        );
    }
    Ok(())
}

fn wait_quantums(n: u64) {
    let target = uthreads::get_total_quantums() + n;
    while uthreads::get_total_quantums() < target {
        std::hint::spin_loop();
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    ensure!(
        cli.workers < MAX_THREADS,
        "at most {} workers fit next to the main thread",
        MAX_THREADS - 1
    );

    let config = ConfigBuilder::default()
        .quantum_usecs(cli.quantum_usecs)
        .stack_size(cli.stack_kib * 1024)
        .build()?;
    uthreads::init_with(config).context("failed to start uthreads")?;

    let workers = (0..cli.workers)
        .map(|_| uthreads::spawn(worker))
        .collect::<Result<Vec<_>, _>>()?;
    log::info!("spawned {} workers", workers.len());

    for round in 1..=cli.rounds {
        wait_quantums(workers.len() as u64 + 1);

        // Hold the first worker back for half the rounds.
        if let Some(&first) = workers.first() {
            if round == cli.rounds / 4 {
                uthreads::block(first)?;
            } else if round == cli.rounds * 3 / 4 {
                uthreads::resume(first)?;
            }
        }
        report(round, &workers)?;
    }

    log::info!("done after {} quantums", uthreads::get_total_quantums());
    uthreads::terminate(MAIN_TID)?;
    unreachable!("terminating the main thread ends the process")
}
