//! Micro-benchmark suite.
//!
//! Every score is an integer saturating at [`MAX_SCORE`]. The suite records
//! its start time and total duration and cleans up every temporary resource
//! it creates, including on failure.

use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;

use crate::error::{CapabilityError, Result};
use crate::probe::SystemProbe;
use crate::types::{BenchmarkScores, GpuDescriptor, MAX_SCORE};

pub mod cpu;
pub mod disk;
pub mod gpu;
pub mod memory;
pub mod network;

pub use cpu::run_cpu_benchmark;
pub use disk::run_disk_benchmark;
pub use gpu::score_gpus;
pub use memory::run_memory_benchmark;
pub use network::score_network;

/// Tunables for a benchmark pass.
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Wall-clock window for the CPU workers.
    pub cpu_window: Duration,
    /// Number of 1 MiB allocation passes in the memory benchmark.
    pub memory_passes: usize,
    /// Number of write+read passes in the disk benchmark.
    pub disk_passes: usize,
    /// Size of the disk benchmark file.
    pub chunk_bytes: usize,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            cpu_window: Duration::from_millis(100),
            memory_passes: 100,
            disk_passes: 10,
            chunk_bytes: 1024 * 1024,
        }
    }
}

/// Run the full suite. CPU, memory and disk run one after another so they do
/// not skew each other; the whole pass is bounded by `deadline`.
pub async fn run_benchmarks(
    probe: &dyn SystemProbe,
    gpus: &[GpuDescriptor],
    config: &BenchmarkConfig,
    deadline: Duration,
) -> Result<BenchmarkScores> {
    let ran_at = Utc::now();
    let started = Instant::now();

    let workers = probe.logical_cpus().max(1);
    let cpu_window = config.cpu_window;
    let memory_passes = config.memory_passes;
    let disk_passes = config.disk_passes;
    let chunk_bytes = config.chunk_bytes;

    let bounded = async {
        let cpu = tokio::task::spawn_blocking(move || run_cpu_benchmark(workers, cpu_window))
            .await
            .map_err(|e| CapabilityError::Benchmark(format!("CPU benchmark task failed: {e}")))?;
        let memory = tokio::task::spawn_blocking(move || run_memory_benchmark(memory_passes))
            .await
            .map_err(|e| CapabilityError::Benchmark(format!("memory benchmark task failed: {e}")))?;
        let disk = tokio::task::spawn_blocking(move || run_disk_benchmark(disk_passes, chunk_bytes))
            .await
            .map_err(|e| CapabilityError::Benchmark(format!("disk benchmark task failed: {e}")))??;
        let network = network::run_network_benchmark(probe).await;
        Ok::<_, CapabilityError>((cpu, memory, disk, network))
    };

    let (cpu, memory, disk, network) = tokio::time::timeout(deadline, bounded)
        .await
        .map_err(|_| CapabilityError::Cancelled)??;

    Ok(BenchmarkScores {
        cpu,
        memory,
        disk,
        network,
        gpu: score_gpus(gpus),
        ran_at,
        // strictly positive even on a degenerate clock
        duration: started.elapsed().max(Duration::from_nanos(1)),
    })
}

pub(crate) fn saturate(score: f64) -> u32 {
    if score <= 0.0 {
        0
    } else {
        (score as u32).min(MAX_SCORE)
    }
}
