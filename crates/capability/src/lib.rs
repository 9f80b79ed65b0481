//! Node capability detection for the DEparrow compute marketplace.
//!
//! A node periodically asks the [`CapabilityDetector`] what it can offer:
//! execution engines, GPUs, storage, network attributes and benchmark scores.
//! Detection is permissive by design: absent vendor tooling degrades the
//! snapshot instead of failing it. All host interaction goes through the
//! [`SystemProbe`] boundary so the rest of the crate stays testable.

pub mod bench;
pub mod detector;
pub mod engine;
pub mod error;
pub mod gpu;
pub mod network;
pub mod probe;
pub mod storage;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use bench::{run_benchmarks, BenchmarkConfig};
pub use detector::{CapabilityDetector, CapabilityDetectorBuilder, DetectorConfig};
pub use error::{CapabilityError, Result};
pub use gpu::{merge_gpus, GpuAdapter};
pub use probe::{OsProbe, ProbeOutput, SystemProbe};
pub use types::{
    BenchmarkScores, EngineDescriptor, EngineType, GpuDescriptor, GpuVendor, NetworkAttributes,
    NodeCapabilities, StorageDescriptor, StorageType, MAX_SCORE,
};
