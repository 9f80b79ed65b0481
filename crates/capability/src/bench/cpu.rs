//! CPU benchmark: one worker per logical CPU in a tight arithmetic loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use crate::bench::saturate;

/// Iterations per second that map to one score point.
const ITERATIONS_PER_POINT: f64 = 1_000_000.0;

/// Run `workers` threads for the given wall-clock window and score the total
/// iteration rate. All workers are started before the window opens and all
/// are joined before the score is read.
pub fn run_cpu_benchmark(workers: usize, window: Duration) -> u32 {
    let workers = workers.max(1);
    let stop = Arc::new(AtomicBool::new(false));
    let barrier = Arc::new(Barrier::new(workers + 1));

    let mut handles = Vec::with_capacity(workers);
    for seed in 0..workers {
        let stop = Arc::clone(&stop);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            let mut value = seed as u64 + 1;
            let mut iterations = 0u64;
            while !stop.load(Ordering::Relaxed) {
                for _ in 0..1024 {
                    value = value
                        .wrapping_mul(6_364_136_223_846_793_005)
                        .wrapping_add(1_442_695_040_888_963_407);
                }
                iterations += 1024;
            }
            std::hint::black_box(value);
            iterations
        }));
    }

    barrier.wait();
    let opened = Instant::now();
    thread::sleep(window);
    stop.store(true, Ordering::Relaxed);

    let total: u64 = handles.into_iter().map(|h| h.join().unwrap_or(0)).sum();
    let elapsed = opened.elapsed().as_secs_f64().max(f64::EPSILON);

    saturate(total as f64 / elapsed / ITERATIONS_PER_POINT)
}
