//! GPU benchmark heuristic.
//!
//! Scores are derived from memory tier, vendor and well-known model names
//! rather than a kernel run; the range and saturation rule match the other
//! benchmarks.

use std::collections::BTreeMap;

use crate::types::{GpuDescriptor, GpuVendor, MAX_SCORE};

/// Premium model substrings and their bonuses, matched against the
/// lowercased device name.
const MODEL_BONUSES: &[(&str, u32)] = &[
    ("h200", 300),
    ("h100", 300),
    ("mi300", 300),
    ("a100", 250),
    ("mi250", 250),
    ("mi210", 250),
    ("l40", 150),
    ("a6000", 150),
    ("4090", 150),
    ("v100", 100),
    ("3090", 100),
];

/// Score every GPU in the list, keyed by GPU index.
pub fn score_gpus(gpus: &[GpuDescriptor]) -> BTreeMap<u64, u32> {
    gpus.iter().map(|gpu| (gpu.index, score_gpu(gpu))).collect()
}

fn score_gpu(gpu: &GpuDescriptor) -> u32 {
    if !gpu.available {
        return 0;
    }

    let mut score = memory_tier(gpu.memory_mib);
    score += match gpu.vendor {
        GpuVendor::Nvidia => 100,
        GpuVendor::Amd => 75,
        GpuVendor::Intel => 50,
        GpuVendor::Other => 0,
    };

    let name = gpu.name.to_lowercase();
    if let Some((_, bonus)) = MODEL_BONUSES.iter().find(|(model, _)| name.contains(model)) {
        score += bonus;
    }

    score.min(MAX_SCORE)
}

fn memory_tier(memory_mib: u64) -> u32 {
    match memory_mib {
        0 => 50,
        m if m >= 65536 => 600,
        m if m >= 24576 => 500,
        m if m >= 16384 => 400,
        m if m >= 8192 => 250,
        m if m >= 4096 => 150,
        _ => 100,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gpu(vendor: GpuVendor, name: &str, memory_mib: u64) -> GpuDescriptor {
        GpuDescriptor {
            memory_mib,
            ..GpuDescriptor::new(vendor, 0, name)
        }
    }

    #[test]
    fn premium_models_outscore_commodity_parts() {
        let h100 = score_gpu(&gpu(GpuVendor::Nvidia, "NVIDIA H100 80GB HBM3", 81559));
        let gtx = score_gpu(&gpu(GpuVendor::Nvidia, "GeForce GTX 1080", 8192));
        assert!(h100 > gtx);
        assert!(h100 <= MAX_SCORE);
    }

    #[test]
    fn more_memory_never_scores_lower() {
        let small = score_gpu(&gpu(GpuVendor::Amd, "Radeon", 4096));
        let large = score_gpu(&gpu(GpuVendor::Amd, "Radeon", 32768));
        assert!(large >= small);
    }

    #[test]
    fn unavailable_gpus_score_zero() {
        let mut g = gpu(GpuVendor::Nvidia, "NVIDIA H100", 81559);
        g.available = false;
        assert_eq!(score_gpu(&g), 0);
    }

    #[test]
    fn scores_are_keyed_by_index() {
        let mut a = gpu(GpuVendor::Nvidia, "NVIDIA L4", 23034);
        let mut b = gpu(GpuVendor::Nvidia, "NVIDIA L4", 23034);
        a.index = 0;
        b.index = 3;
        let scores = score_gpus(&[a, b]);
        assert_eq!(scores.len(), 2);
        assert!(scores.contains_key(&0) && scores.contains_key(&3));
    }
}
