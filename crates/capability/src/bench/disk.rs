//! Disk benchmark: repeated write+read of a scratch file.

use std::fs::File;
use std::io::Write;
use std::time::Instant;

use crate::bench::saturate;
use crate::error::Result;

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Write then read a `chunk_bytes` file `passes` times in a temporary
/// directory and score the mean of the write and read rates in MiB/s. The
/// directory is removed on every exit path.
pub fn run_disk_benchmark(passes: usize, chunk_bytes: usize) -> Result<u32> {
    if passes == 0 || chunk_bytes == 0 {
        return Ok(0);
    }

    // RAII cleanup covers the error paths below
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("io-probe.dat");
    let data = vec![0xA5u8; chunk_bytes];
    let total_mib = passes as f64 * chunk_bytes as f64 / BYTES_PER_MIB;

    let write_start = Instant::now();
    for _ in 0..passes {
        let mut file = File::create(&path)?;
        file.write_all(&data)?;
        file.sync_all()?;
    }
    let write_rate = total_mib / write_start.elapsed().as_secs_f64().max(f64::EPSILON);

    let read_start = Instant::now();
    for _ in 0..passes {
        let bytes = std::fs::read(&path)?;
        std::hint::black_box(&bytes);
    }
    let read_rate = total_mib / read_start.elapsed().as_secs_f64().max(f64::EPSILON);

    Ok(saturate((write_rate + read_rate) / 2.0))
}
