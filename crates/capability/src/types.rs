//! Canonical descriptor types published by the capability detector.
//!
//! Serialization contract: timestamps are ISO-8601 strings, durations are
//! integer nanoseconds. GPU memory values are MiB, storage values are bytes.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Execution engine families a node can offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineType {
    Container,
    Wasm,
    Native,
}

impl EngineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineType::Container => "container",
            EngineType::Wasm => "wasm",
            EngineType::Native => "native",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Local,
    Network,
    Object,
}

/// One detected execution engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineDescriptor {
    #[serde(rename = "Type")]
    pub engine: EngineType,
    #[serde(rename = "Version", skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(rename = "Available")]
    pub available: bool,
    #[serde(rename = "Constraints")]
    pub constraints: Vec<String>,
    #[serde(rename = "Features")]
    pub features: Vec<String>,
}

impl EngineDescriptor {
    pub fn unavailable(engine: EngineType) -> Self {
        Self {
            engine,
            version: None,
            available: false,
            constraints: Vec::new(),
            features: Vec::new(),
        }
    }
}

/// One physical GPU. `memory_mib` is total memory, not free memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuDescriptor {
    #[serde(rename = "Index")]
    pub index: u64,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Vendor")]
    pub vendor: GpuVendor,
    #[serde(rename = "MemoryMiB")]
    pub memory_mib: u64,
    #[serde(rename = "PCIAddress", skip_serializing_if = "Option::is_none")]
    pub pci_address: Option<String>,
    #[serde(rename = "Driver", skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(rename = "ComputeCapability", skip_serializing_if = "Option::is_none")]
    pub compute_capability: Option<String>,
    #[serde(rename = "TemperatureC", skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f32>,
    #[serde(rename = "UtilizationPct", skip_serializing_if = "Option::is_none")]
    pub utilization_pct: Option<f32>,
    #[serde(rename = "Available")]
    pub available: bool,
}

impl GpuDescriptor {
    pub fn new(vendor: GpuVendor, index: u64, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            vendor,
            memory_mib: 0,
            pci_address: None,
            driver: None,
            compute_capability: None,
            temperature_c: None,
            utilization_pct: None,
            available: true,
        }
    }
}

/// One mounted filesystem usable for job scratch space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageDescriptor {
    #[serde(rename = "Type")]
    pub storage_type: StorageType,
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "TotalBytes")]
    pub total_bytes: u64,
    #[serde(rename = "AvailableBytes")]
    pub available_bytes: u64,
    #[serde(rename = "ReadOnly")]
    pub read_only: bool,
    #[serde(rename = "Network")]
    pub network: bool,
    #[serde(rename = "LatencyUs", skip_serializing_if = "Option::is_none")]
    pub latency_us: Option<u64>,
    #[serde(rename = "BandwidthMBps", skip_serializing_if = "Option::is_none")]
    pub bandwidth_mbps: Option<u64>,
}

/// Network posture of the node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkAttributes {
    #[serde(rename = "PublicIP", skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
    #[serde(rename = "PrivateIPs")]
    pub private_ips: Vec<String>,
    #[serde(rename = "BandwidthMbps", skip_serializing_if = "Option::is_none")]
    pub bandwidth_mbps: Option<u64>,
    #[serde(rename = "Region", skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(rename = "Zone", skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(rename = "BehindNAT")]
    pub behind_nat: bool,
    #[serde(rename = "IPv6Supported")]
    pub ipv6_supported: bool,
}

/// Micro-benchmark scores, each saturating at [`MAX_SCORE`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkScores {
    #[serde(rename = "CPU")]
    pub cpu: u32,
    #[serde(rename = "Memory")]
    pub memory: u32,
    #[serde(rename = "Disk")]
    pub disk: u32,
    #[serde(rename = "Network")]
    pub network: u32,
    /// Per-GPU scores keyed by GPU index.
    #[serde(rename = "GPU")]
    pub gpu: BTreeMap<u64, u32>,
    #[serde(rename = "RanAt")]
    pub ran_at: DateTime<Utc>,
    #[serde(rename = "Duration", with = "duration_nanos")]
    pub duration: Duration,
}

/// Upper bound for every benchmark and aggregate score.
pub const MAX_SCORE: u32 = 1000;

/// GPUs at or above this much memory earn an extra aggregate bonus.
pub const LARGE_GPU_MEMORY_MIB: u64 = 16384;

/// Aggregate snapshot of everything a node can do. Immutable once published;
/// the detector replaces the whole value on refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeCapabilities {
    #[serde(rename = "DetectionTime")]
    pub detection_time: DateTime<Utc>,
    #[serde(rename = "OS")]
    pub os: String,
    #[serde(rename = "Architecture")]
    pub architecture: String,
    #[serde(rename = "Hostname")]
    pub hostname: String,
    #[serde(rename = "Engines")]
    pub engines: Vec<EngineDescriptor>,
    #[serde(rename = "GPUs")]
    pub gpus: Vec<GpuDescriptor>,
    #[serde(rename = "Storage")]
    pub storage: Vec<StorageDescriptor>,
    #[serde(rename = "Network")]
    pub network: NetworkAttributes,
    #[serde(rename = "Benchmarks", skip_serializing_if = "Option::is_none")]
    pub benchmarks: Option<BenchmarkScores>,
}

impl NodeCapabilities {
    pub fn has_engine(&self, engine: EngineType) -> bool {
        self.get_engine(engine).is_some_and(|e| e.available)
    }

    pub fn get_engine(&self, engine: EngineType) -> Option<&EngineDescriptor> {
        self.engines.iter().find(|e| e.engine == engine)
    }

    pub fn has_gpu_vendor(&self, vendor: GpuVendor) -> bool {
        self.gpus.iter().any(|g| g.vendor == vendor && g.available)
    }

    pub fn total_gpu_memory_mib(&self) -> u64 {
        self.gpus.iter().map(|g| g.memory_mib).sum()
    }

    /// Single-integer summary used by the placement ranker as a tiebreaker.
    ///
    /// 50 per available engine, 100 per available GPU, 50 extra per GPU with
    /// at least [`LARGE_GPU_MEMORY_MIB`] of memory, plus a tenth of the
    /// cpu+memory+disk benchmark sum when benchmarks are attached.
    pub fn capability_score(&self) -> u32 {
        let mut score = 0u32;
        score += self.engines.iter().filter(|e| e.available).count() as u32 * 50;
        for gpu in self.gpus.iter().filter(|g| g.available) {
            score += 100;
            if gpu.memory_mib >= LARGE_GPU_MEMORY_MIB {
                score += 50;
            }
        }
        if let Some(bench) = &self.benchmarks {
            score += (bench.cpu + bench.memory + bench.disk) / 10;
        }
        score.min(MAX_SCORE)
    }
}

pub(crate) mod duration_nanos {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        (d.as_nanos() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let nanos = u64::deserialize(deserializer)?;
        Ok(Duration::from_nanos(nanos))
    }
}
