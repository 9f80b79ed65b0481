//! Symmetric inter-region latency matrix with probe integration.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PlacementError, Result};
use crate::location::region_to_continent;

/// Latency assumed for a region pair nothing has measured or seeded yet.
pub const DEFAULT_LATENCY: Duration = Duration::from_millis(100);

/// A node under consideration, as the matrix sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSelection {
    pub node_id: String,
    pub region: String,
}

/// Process-wide symmetric region-pair latency cache.
///
/// Writes always cover both directions inside one critical section, so every
/// reader observes a consistent `(a,b)`/`(b,a)` pair. Self-latency is zero
/// and absent pairs fall back to the configured default.
pub struct LatencyMatrix {
    latencies: RwLock<HashMap<(String, String), Duration>>,
    default_latency: Duration,
}

impl LatencyMatrix {
    #[must_use]
    pub fn new(default_latency: Duration) -> Self {
        Self {
            latencies: RwLock::new(HashMap::new()),
            default_latency,
        }
    }

    /// Build a matrix seeded with [`estimated_latency`] for every pair of the
    /// given regions.
    #[must_use]
    pub fn with_estimates(default_latency: Duration, regions: &[&str]) -> Self {
        let matrix = Self::new(default_latency);
        for (i, a) in regions.iter().enumerate() {
            for b in &regions[i + 1..] {
                matrix.update_latency(a, b, estimated_latency(a, b));
            }
        }
        matrix
    }

    /// Zero for `a == b`, the stored symmetric value when present, otherwise
    /// the configured default.
    pub fn get_latency(&self, a: &str, b: &str) -> Duration {
        if a == b {
            return Duration::ZERO;
        }
        let latencies = self.latencies.read().unwrap_or_else(|e| e.into_inner());
        latencies
            .get(&(a.to_string(), b.to_string()))
            .copied()
            .unwrap_or(self.default_latency)
    }

    /// Store `latency` for both directions of the pair.
    pub fn update_latency(&self, a: &str, b: &str, latency: Duration) {
        if a == b {
            return;
        }
        let mut latencies = self.latencies.write().unwrap_or_else(|e| e.into_inner());
        latencies.insert((a.to_string(), b.to_string()), latency);
        latencies.insert((b.to_string(), a.to_string()), latency);
    }

    /// Stable sort of `nodes` ascending by latency from `origin`; ties keep
    /// their input order.
    pub fn get_nearest_nodes(&self, origin: &str, nodes: &[NodeSelection]) -> Vec<NodeSelection> {
        let mut sorted = nodes.to_vec();
        sorted.sort_by_key(|node| self.get_latency(origin, &node.region));
        sorted
    }

    /// Every populated pair involving `origin`.
    pub fn get_all_latencies(&self, origin: &str) -> HashMap<String, Duration> {
        let latencies = self.latencies.read().unwrap_or_else(|e| e.into_inner());
        latencies
            .iter()
            .filter(|((a, _), _)| a == origin)
            .map(|((_, b), latency)| (b.clone(), *latency))
            .collect()
    }

    /// Empty the store; subsequent queries return the default.
    pub fn clear_cache(&self) {
        let mut latencies = self.latencies.write().unwrap_or_else(|e| e.into_inner());
        latencies.clear();
    }

    /// Probe `endpoint` and store the measured round trip for
    /// `(origin, region)`. A failed probe leaves the previous entry intact.
    pub async fn probe_and_update(
        &self,
        origin: &str,
        region: &str,
        endpoint: &str,
        probe: &dyn LatencyProbe,
        deadline: Duration,
    ) -> Result<Duration> {
        match probe.probe(endpoint, deadline).await {
            Ok(latency) => {
                self.update_latency(origin, region, latency);
                Ok(latency)
            }
            Err(e) => {
                debug!("latency probe for {region} via {endpoint} failed: {e}");
                Err(e)
            }
        }
    }
}

/// Baseline latency estimate for well-known region pairs.
pub fn estimated_latency(a: &str, b: &str) -> Duration {
    if a == b {
        return Duration::from_millis(5);
    }
    let mut continents = [region_to_continent(a), region_to_continent(b)];
    continents.sort_unstable();
    let millis = match (continents[0], continents[1]) {
        _ if continents.contains(&"unknown") => 200,
        (x, y) if x == y => 30,
        ("europe", "north-america") => 85,
        ("asia", "north-america") => 150,
        ("asia", "europe") => 180,
        ("north-america", "south-america") => 120,
        ("europe", "south-america") => 190,
        ("asia", "south-america") => 250,
        _ => 200,
    };
    Duration::from_millis(millis)
}

/// Pluggable latency measurement.
#[async_trait]
pub trait LatencyProbe: Send + Sync {
    async fn probe(&self, endpoint: &str, deadline: Duration) -> Result<Duration>;
}

/// Measures latency as the round trip of a plain HTTP GET.
pub struct HttpLatencyProbe {
    client: reqwest::Client,
}

impl HttpLatencyProbe {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpLatencyProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LatencyProbe for HttpLatencyProbe {
    async fn probe(&self, endpoint: &str, deadline: Duration) -> Result<Duration> {
        let start = std::time::Instant::now();
        // Any response counts; we are timing the round trip, not the body
        self.client
            .get(endpoint)
            .timeout(deadline)
            .send()
            .await
            .map_err(|e| PlacementError::Probe(e.to_string()))?;
        Ok(start.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, region: &str) -> NodeSelection {
        NodeSelection {
            node_id: id.to_string(),
            region: region.to_string(),
        }
    }

    #[test]
    fn updates_are_symmetric() {
        let matrix = LatencyMatrix::new(DEFAULT_LATENCY);
        matrix.update_latency("us-east", "eu-west", Duration::from_millis(85));
        assert_eq!(
            matrix.get_latency("us-east", "eu-west"),
            Duration::from_millis(85)
        );
        assert_eq!(
            matrix.get_latency("eu-west", "us-east"),
            Duration::from_millis(85)
        );
    }

    #[test]
    fn self_latency_is_zero() {
        let matrix = LatencyMatrix::new(DEFAULT_LATENCY);
        matrix.update_latency("us-east", "eu-west", Duration::from_millis(85));
        assert_eq!(matrix.get_latency("us-east", "us-east"), Duration::ZERO);
        assert_eq!(matrix.get_latency("nowhere", "nowhere"), Duration::ZERO);
    }

    #[test]
    fn absent_pairs_fall_back_to_the_default() {
        let matrix = LatencyMatrix::new(Duration::from_millis(42));
        assert_eq!(
            matrix.get_latency("us-east", "asia-east"),
            Duration::from_millis(42)
        );
    }

    #[test]
    fn clear_cache_restores_defaults() {
        let matrix = LatencyMatrix::new(DEFAULT_LATENCY);
        matrix.update_latency("us-east", "eu-west", Duration::from_millis(85));
        matrix.clear_cache();
        assert_eq!(matrix.get_latency("us-east", "eu-west"), DEFAULT_LATENCY);
        assert!(matrix.get_all_latencies("us-east").is_empty());
    }

    #[test]
    fn nearest_nodes_sorts_ascending_and_is_a_permutation() {
        let matrix = LatencyMatrix::new(DEFAULT_LATENCY);
        matrix.update_latency("us-east", "us-west", Duration::from_millis(65));
        matrix.update_latency("us-east", "eu-west", Duration::from_millis(85));
        matrix.update_latency("us-east", "asia-east", Duration::from_millis(200));

        let nodes = vec![
            node("n-asia", "asia-east"),
            node("n-local", "us-east"),
            node("n-eu", "eu-west"),
            node("n-west", "us-west"),
        ];
        let sorted = matrix.get_nearest_nodes("us-east", &nodes);

        let ids: Vec<&str> = sorted.iter().map(|n| n.node_id.as_str()).collect();
        assert_eq!(ids, vec!["n-local", "n-west", "n-eu", "n-asia"]);

        let latencies: Vec<Duration> = sorted
            .iter()
            .map(|n| matrix.get_latency("us-east", &n.region))
            .collect();
        let mut ordered = latencies.clone();
        ordered.sort();
        assert_eq!(latencies, ordered);
        assert_eq!(sorted.len(), nodes.len());
    }

    #[test]
    fn ties_preserve_input_order() {
        let matrix = LatencyMatrix::new(DEFAULT_LATENCY);
        let nodes = vec![node("a", "r1"), node("b", "r2"), node("c", "r3")];
        // every pair resolves to the same default latency
        let sorted = matrix.get_nearest_nodes("origin", &nodes);
        let ids: Vec<&str> = sorted.iter().map(|n| n.node_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn get_all_latencies_only_returns_populated_pairs() {
        let matrix = LatencyMatrix::new(DEFAULT_LATENCY);
        matrix.update_latency("us-east", "eu-west", Duration::from_millis(85));
        matrix.update_latency("eu-west", "asia-east", Duration::from_millis(180));

        let all = matrix.get_all_latencies("us-east");
        assert_eq!(all.len(), 1);
        assert_eq!(all.get("eu-west"), Some(&Duration::from_millis(85)));
    }

    #[test]
    fn estimates_are_symmetric_and_tiered() {
        assert_eq!(
            estimated_latency("us-east", "eu-west"),
            estimated_latency("eu-west", "us-east")
        );
        // intra-region < same-continent < trans-Atlantic < trans-Pacific
        let intra = estimated_latency("us-east", "us-east");
        let continental = estimated_latency("us-east", "us-west");
        let atlantic = estimated_latency("us-east", "eu-west");
        let pacific = estimated_latency("us-west", "asia-east");
        assert!(intra < continental);
        assert!(continental < atlantic);
        assert!(atlantic < pacific);
    }

    #[test]
    fn seeded_matrix_answers_from_estimates() {
        let matrix =
            LatencyMatrix::with_estimates(DEFAULT_LATENCY, &["us-east", "us-west", "eu-west"]);
        assert_eq!(
            matrix.get_latency("us-east", "eu-west"),
            estimated_latency("us-east", "eu-west")
        );
        assert_eq!(
            matrix.get_latency("eu-west", "us-west"),
            estimated_latency("us-west", "eu-west")
        );
    }

    #[tokio::test]
    async fn failed_probes_leave_the_entry_intact() {
        struct FailingProbe;

        #[async_trait]
        impl LatencyProbe for FailingProbe {
            async fn probe(&self, _endpoint: &str, _deadline: Duration) -> Result<Duration> {
                Err(PlacementError::Probe("connection refused".to_string()))
            }
        }

        let matrix = LatencyMatrix::new(DEFAULT_LATENCY);
        matrix.update_latency("us-east", "eu-west", Duration::from_millis(85));

        let result = matrix
            .probe_and_update(
                "us-east",
                "eu-west",
                "http://node.example:8080/healthz",
                &FailingProbe,
                Duration::from_secs(1),
            )
            .await;
        assert!(result.is_err());
        assert_eq!(
            matrix.get_latency("us-east", "eu-west"),
            Duration::from_millis(85)
        );
    }

    #[tokio::test]
    async fn successful_probes_update_both_directions() {
        struct FixedProbe(Duration);

        #[async_trait]
        impl LatencyProbe for FixedProbe {
            async fn probe(&self, _endpoint: &str, _deadline: Duration) -> Result<Duration> {
                Ok(self.0)
            }
        }

        let matrix = LatencyMatrix::new(DEFAULT_LATENCY);
        let measured = matrix
            .probe_and_update(
                "us-east",
                "eu-west",
                "http://node.example:8080/healthz",
                &FixedProbe(Duration::from_millis(91)),
                Duration::from_secs(1),
            )
            .await
            .unwrap();
        assert_eq!(measured, Duration::from_millis(91));
        assert_eq!(
            matrix.get_latency("eu-west", "us-east"),
            Duration::from_millis(91)
        );
    }
}
