//! Capability detection orchestrator with a time-bounded snapshot cache.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::bench::{run_benchmarks, BenchmarkConfig};
use crate::engine::detect_engines;
use crate::error::{CapabilityError, Result};
use crate::gpu::{default_adapters, detect_gpus, GpuAdapter};
use crate::network::detect_network;
use crate::probe::{OsProbe, SystemProbe};
use crate::storage::detect_storage;
use crate::types::{BenchmarkScores, NodeCapabilities};

/// Detector tunables.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Maximum age of a cached snapshot before a new detection runs.
    pub cache_expiry: Duration,
    /// Benchmark suite tunables.
    pub benchmark: BenchmarkConfig,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            cache_expiry: Duration::from_secs(300),
            benchmark: BenchmarkConfig::default(),
        }
    }
}

/// Detects what the node can do and caches the published snapshot.
///
/// Detection is permissive: missing vendor tooling degrades the snapshot but
/// never fails it. The snapshot lock is held only to read or swap the cached
/// value, never across a probe; concurrent cache misses are serialised by a
/// separate detection gate and re-check the cache after acquiring it.
pub struct CapabilityDetector {
    probe: Arc<dyn SystemProbe>,
    adapters: Vec<Arc<dyn GpuAdapter>>,
    config: DetectorConfig,
    snapshot: RwLock<Option<NodeCapabilities>>,
    detect_gate: Mutex<()>,
}

pub struct CapabilityDetectorBuilder {
    probe: Option<Arc<dyn SystemProbe>>,
    adapters: Option<Vec<Arc<dyn GpuAdapter>>>,
    config: DetectorConfig,
}

impl CapabilityDetectorBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            probe: None,
            adapters: None,
            config: DetectorConfig::default(),
        }
    }

    #[must_use]
    pub fn with_probe(mut self, probe: Arc<dyn SystemProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Add a vendor adapter. The default set is used when none are added.
    #[must_use]
    pub fn with_gpu_adapter(mut self, adapter: Arc<dyn GpuAdapter>) -> Self {
        self.adapters.get_or_insert_with(Vec::new).push(adapter);
        self
    }

    #[must_use]
    pub fn with_cache_expiry(mut self, cache_expiry: Duration) -> Self {
        self.config.cache_expiry = cache_expiry;
        self
    }

    #[must_use]
    pub fn with_benchmark_config(mut self, benchmark: BenchmarkConfig) -> Self {
        self.config.benchmark = benchmark;
        self
    }

    #[must_use]
    pub fn build(self) -> CapabilityDetector {
        CapabilityDetector {
            probe: self.probe.unwrap_or_else(|| Arc::new(OsProbe::new())),
            adapters: self.adapters.unwrap_or_else(default_adapters),
            config: self.config,
            snapshot: RwLock::new(None),
            detect_gate: Mutex::new(()),
        }
    }
}

impl Default for CapabilityDetectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityDetector {
    #[must_use]
    pub fn builder() -> CapabilityDetectorBuilder {
        CapabilityDetectorBuilder::new()
    }

    /// Return the cached snapshot while it is younger than `cache_expiry`,
    /// otherwise run a fresh detection and publish it.
    pub async fn detect_all(&self, deadline: Duration) -> Result<NodeCapabilities> {
        if let Some(snapshot) = self.fresh_snapshot().await {
            debug!("returning cached capability snapshot");
            return Ok(snapshot);
        }

        let _gate = self.detect_gate.lock().await;
        // another task may have detected while we waited for the gate
        if let Some(snapshot) = self.fresh_snapshot().await {
            return Ok(snapshot);
        }

        let snapshot = self.detect_fresh(deadline).await?;
        Ok(self.publish(snapshot).await)
    }

    /// Invalidate the cache, then detect.
    pub async fn refresh(&self, deadline: Duration) -> Result<NodeCapabilities> {
        let _gate = self.detect_gate.lock().await;
        {
            let mut guard = self.snapshot.write().await;
            *guard = None;
        }
        let snapshot = self.detect_fresh(deadline).await?;
        Ok(self.publish(snapshot).await)
    }

    /// Run the benchmark suite against the current GPU set. Never cached.
    pub async fn benchmark(&self, deadline: Duration) -> Result<BenchmarkScores> {
        let gpus = self.detect_all(deadline).await?.gpus;
        run_benchmarks(
            self.probe.as_ref(),
            &gpus,
            &self.config.benchmark,
            deadline,
        )
        .await
    }

    /// Fresh detection with the benchmark suite attached to the snapshot.
    pub async fn detect_all_with_benchmarks(&self, deadline: Duration) -> Result<NodeCapabilities> {
        let _gate = self.detect_gate.lock().await;
        let mut snapshot = self.detect_fresh(deadline).await?;
        let scores = run_benchmarks(
            self.probe.as_ref(),
            &snapshot.gpus,
            &self.config.benchmark,
            deadline,
        )
        .await?;
        snapshot.benchmarks = Some(scores);
        Ok(self.publish(snapshot).await)
    }

    async fn fresh_snapshot(&self) -> Option<NodeCapabilities> {
        let guard = self.snapshot.read().await;
        guard.as_ref().filter(|s| self.age_of(s) < self.config.cache_expiry).cloned()
    }

    fn age_of(&self, snapshot: &NodeCapabilities) -> Duration {
        Utc::now()
            .signed_duration_since(snapshot.detection_time)
            .to_std()
            .unwrap_or_default()
    }

    /// Swap in a new snapshot, keeping `detection_time` monotonic.
    async fn publish(&self, mut snapshot: NodeCapabilities) -> NodeCapabilities {
        let mut guard = self.snapshot.write().await;
        if let Some(previous) = guard.as_ref() {
            if snapshot.detection_time < previous.detection_time {
                snapshot.detection_time = previous.detection_time;
            }
        }
        *guard = Some(snapshot.clone());
        snapshot
    }

    async fn detect_fresh(&self, deadline: Duration) -> Result<NodeCapabilities> {
        let probe = self.probe.as_ref();
        let detection = async {
            let (engines, gpus, storage, network) = tokio::join!(
                detect_engines(probe, deadline),
                detect_gpus(&self.adapters, probe, deadline),
                detect_storage(probe),
                detect_network(probe, deadline),
            );

            NodeCapabilities {
                detection_time: Utc::now(),
                os: probe.os(),
                architecture: probe.arch(),
                hostname: probe.hostname(),
                engines,
                gpus,
                storage,
                network,
                benchmarks: None,
            }
        };

        let snapshot = tokio::time::timeout(deadline, detection)
            .await
            .map_err(|_| CapabilityError::Cancelled)?;
        info!(
            engines = snapshot.engines.len(),
            gpus = snapshot.gpus.len(),
            mounts = snapshot.storage.len(),
            "capability detection complete"
        );
        Ok(snapshot)
    }
}
