//! Two fixed CPU workloads, each timed in process CPU time and averaged
//! over N runs.

use std::hint::black_box;
use std::time::Duration;

const FIB_N: u64 = 45;
const FACTORIAL_STEPS: u64 = 100_000_000;

fn fib(n: u64) -> u64 {
    if n <= 1 {
        return n;
    }
    fib(n - 1) + fib(n - 2)
}

fn factorial_loop(steps: u64) -> u64 {
    let mut acc: u64 = 1;
    for i in 1..steps {
        acc = acc.wrapping_mul(black_box(i));
    }
    acc
}

/// CPU time consumed by this process so far. Time spent waiting for the
/// scheduler does not count.
#[cfg(unix)]
fn process_cpu_time() -> Duration {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: `ts` is a valid, writable timespec.
    if unsafe { libc::clock_gettime(libc::CLOCK_PROCESS_CPUTIME_ID, &mut ts) } != 0 {
        return Duration::ZERO;
    }
    Duration::new(ts.tv_sec as u64, ts.tv_nsec as u32)
}

#[cfg(not(unix))]
fn process_cpu_time() -> Duration {
    use std::sync::OnceLock;
    use std::time::Instant;

    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed()
}

fn average(
    iterations: u32,
    mut clock: impl FnMut() -> Duration,
    mut work: impl FnMut(),
) -> Duration {
    let mut total = Duration::ZERO;
    for _ in 0..iterations {
        let start = clock();
        work();
        total += clock().saturating_sub(start);
    }
    total / iterations.max(1)
}

fn parse_iterations(arg: &str) -> Option<u32> {
    arg.parse().ok().filter(|n| *n > 0)
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let parsed = match args.as_slice() {
        [_, it1, it2] => parse_iterations(it1).zip(parse_iterations(it2)),
        _ => None,
    };
    let Some((test_1_iterations, test_2_iterations)) = parsed else {
        eprintln!("Usage: check_cpu_speed <test_1_iterations> <test_2_iterations>");
        std::process::exit(1);
    };

    println!("Running Test 1...");
    let avg = average(test_1_iterations, process_cpu_time, || {
        black_box(fib(black_box(FIB_N)));
    });
    println!(
        "Test 1: average time taken: {:.6} seconds",
        avg.as_secs_f64()
    );

    println!("\nRunning Test 2...");
    let avg = average(test_2_iterations, process_cpu_time, || {
        black_box(factorial_loop(black_box(FACTORIAL_STEPS)));
    });
    println!(
        "Test 2: average time taken: {:.6} seconds",
        avg.as_secs_f64()
    );
}
