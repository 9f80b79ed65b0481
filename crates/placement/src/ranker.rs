//! Geographic placement ranking.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PlacementError, Result};
use crate::latency::LatencyMatrix;
use crate::location::infer_location;

/// Base rank of a candidate nothing has boosted or penalised yet.
pub const RANK_POSSIBLE: i64 = 0;
/// Sentinel strictly below any rank the arithmetic can produce.
pub const RANK_UNSUITABLE: i64 = i64::MIN;

/// Job label holding a comma-separated list of preferred regions.
pub const LABEL_PREFERRED_REGIONS: &str = "preferred-regions";
/// Job label holding a comma-separated list of excluded regions.
pub const LABEL_EXCLUDE_REGIONS: &str = "exclude-regions";

/// Ranker tunables with the documented defaults.
#[derive(Debug, Clone)]
pub struct RankerConfig {
    /// Added when the candidate sits in the job's origin region.
    pub local_boost: i64,
    /// Added when the candidate region is in `preferred-regions`.
    pub preferred_bonus: i64,
    /// Width of one latency penalty bucket.
    pub latency_bucket: Duration,
    /// Points subtracted per full latency bucket.
    pub penalty_per_bucket: i64,
    /// When set, candidates above `max_latency` become unsuitable.
    pub exclude_high_latency: bool,
    pub max_latency: Duration,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            local_boost: 10,
            preferred_bonus: 30,
            latency_bucket: Duration::from_millis(20),
            penalty_per_bucket: 5,
            exclude_high_latency: false,
            max_latency: Duration::from_millis(500),
        }
    }
}

/// A placement request for one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementRequest {
    pub job_id: String,
    pub origin_region: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

/// A node considered for placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub node_id: String,
    pub region: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl Candidate {
    /// The candidate's canonical region, inferred from labels when the
    /// explicit region is blank.
    pub fn canonical_region(&self) -> String {
        let region = self.region.trim();
        if region.is_empty() {
            infer_location(&self.labels).region
        } else {
            region.to_lowercase()
        }
    }
}

/// One ranked candidate. Higher ranks are better; `unsuitable` pins the rank
/// to [`RANK_UNSUITABLE`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRank {
    pub node_id: String,
    pub rank: i64,
    pub reason: String,
    pub unsuitable: bool,
}

/// Ranks candidate nodes by proximity to a job's origin.
pub struct GeoRanker {
    config: RankerConfig,
    matrix: Arc<LatencyMatrix>,
}

impl GeoRanker {
    #[must_use]
    pub fn new(config: RankerConfig, matrix: Arc<LatencyMatrix>) -> Self {
        Self { config, matrix }
    }

    #[must_use]
    pub fn matrix(&self) -> &Arc<LatencyMatrix> {
        &self.matrix
    }

    /// Produce one [`NodeRank`] per candidate, in input order. Ranking is
    /// strict: an empty candidate set or a blank origin region is an error.
    pub fn rank_nodes(
        &self,
        job: &PlacementRequest,
        candidates: &[Candidate],
    ) -> Result<Vec<NodeRank>> {
        if candidates.is_empty() {
            return Err(PlacementError::NoCandidates);
        }
        let origin = job.origin_region.trim().to_lowercase();
        if origin.is_empty() {
            return Err(PlacementError::InvalidOrigin(job.origin_region.clone()));
        }

        let preferred = label_list(&job.labels, LABEL_PREFERRED_REGIONS);
        let excluded = label_list(&job.labels, LABEL_EXCLUDE_REGIONS);

        let ranks = candidates
            .iter()
            .map(|candidate| self.rank_one(&origin, candidate, &preferred, &excluded))
            .collect();
        Ok(ranks)
    }

    fn rank_one(
        &self,
        origin: &str,
        candidate: &Candidate,
        preferred: &[String],
        excluded: &[String],
    ) -> NodeRank {
        let region = candidate.canonical_region();
        let mut rank = RANK_POSSIBLE;
        let mut reasons: Vec<String> = Vec::new();

        if region == origin {
            rank += self.config.local_boost;
            reasons.push("local region".to_string());
        }
        if preferred.iter().any(|r| r == &region) {
            rank += self.config.preferred_bonus;
            reasons.push("preferred region".to_string());
        }
        if excluded.iter().any(|r| r == &region) {
            debug!("candidate {} excluded by job labels", candidate.node_id);
            return NodeRank {
                node_id: candidate.node_id.clone(),
                rank: RANK_UNSUITABLE,
                reason: "excluded region".to_string(),
                unsuitable: true,
            };
        }

        let latency = self.matrix.get_latency(origin, &region);
        if self.config.exclude_high_latency && latency > self.config.max_latency {
            return NodeRank {
                node_id: candidate.node_id.clone(),
                rank: RANK_UNSUITABLE,
                reason: format!(
                    "exceeds max latency ({}ms > {}ms)",
                    latency.as_millis(),
                    self.config.max_latency.as_millis()
                ),
                unsuitable: true,
            };
        }

        let bucket_ms = self.config.latency_bucket.as_millis().max(1) as i64;
        let buckets = latency.as_millis() as i64 / bucket_ms;
        let penalty = buckets * self.config.penalty_per_bucket;
        rank -= penalty;
        if penalty > 0 {
            reasons.push(format!(
                "latency penalty -{penalty} ({}ms)",
                latency.as_millis()
            ));
        }

        if reasons.is_empty() {
            reasons.push(format!("latency {}ms", latency.as_millis()));
        }

        NodeRank {
            node_id: candidate.node_id.clone(),
            rank,
            reason: reasons.join("; "),
            unsuitable: false,
        }
    }
}

/// Parse a comma-separated label into lowercased entries.
fn label_list(labels: &HashMap<String, String>, key: &str) -> Vec<String> {
    labels
        .get(key)
        .map(|value| {
            value
                .split(',')
                .map(|entry| entry.trim().to_lowercase())
                .filter(|entry| !entry.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::latency::DEFAULT_LATENCY;

    fn candidate(id: &str, region: &str) -> Candidate {
        Candidate {
            node_id: id.to_string(),
            region: region.to_string(),
            labels: HashMap::new(),
        }
    }

    fn job(origin: &str, labels: &[(&str, &str)]) -> PlacementRequest {
        PlacementRequest {
            job_id: "job-1".to_string(),
            origin_region: origin.to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn ranker() -> GeoRanker {
        let matrix = Arc::new(LatencyMatrix::new(DEFAULT_LATENCY));
        matrix.update_latency("us-east", "us-west", Duration::from_millis(65));
        matrix.update_latency("us-east", "eu-west", Duration::from_millis(85));
        matrix.update_latency("us-east", "asia-east", Duration::from_millis(200));
        GeoRanker::new(RankerConfig::default(), matrix)
    }

    #[test]
    fn empty_candidates_is_an_error() {
        let result = ranker().rank_nodes(&job("us-east", &[]), &[]);
        assert!(matches!(result, Err(PlacementError::NoCandidates)));
    }

    #[test]
    fn blank_origin_is_an_error() {
        let result = ranker().rank_nodes(&job("  ", &[]), &[candidate("n1", "us-east")]);
        assert!(matches!(result, Err(PlacementError::InvalidOrigin(_))));
    }

    #[test]
    fn local_candidate_gets_the_boost_and_reason() {
        let ranks = ranker()
            .rank_nodes(&job("us-east", &[]), &[candidate("n1", "us-east")])
            .unwrap();
        assert_eq!(ranks[0].rank, 10);
        assert!(ranks[0].reason.contains("local"));
        assert!(!ranks[0].unsuitable);
    }

    #[test]
    fn preferred_region_arithmetic_matches_the_documented_buckets() {
        // preferred 200ms region: 0 + 30 - floor(200/20)*5 = -20 + 30 = 10
        let ranks = ranker()
            .rank_nodes(
                &job("us-east", &[(LABEL_PREFERRED_REGIONS, "asia-east")]),
                &[candidate("n-asia", "asia-east"), candidate("n-eu", "eu-west")],
            )
            .unwrap();
        assert_eq!(ranks[0].rank, 10);
        assert!(ranks[0].reason.contains("preferred"));
        // 85ms: 0 - floor(85/20)*5 = -20
        assert_eq!(ranks[1].rank, -20);
        assert!(ranks[0].rank > ranks[1].rank);
    }

    #[test]
    fn excluded_region_is_unsuitable_regardless_of_boosts() {
        let labels = [
            (LABEL_PREFERRED_REGIONS, "eu-west"),
            (LABEL_EXCLUDE_REGIONS, "eu-west"),
        ];
        let ranks = ranker()
            .rank_nodes(&job("eu-west", &labels), &[candidate("n-eu", "eu-west")])
            .unwrap();
        assert_eq!(ranks[0].rank, RANK_UNSUITABLE);
        assert!(ranks[0].unsuitable);
        assert!(ranks[0].reason.contains("excluded"));
    }

    #[test]
    fn high_latency_cutoff() {
        let matrix = Arc::new(LatencyMatrix::new(DEFAULT_LATENCY));
        matrix.update_latency("us-east", "asia-east", Duration::from_millis(200));
        let ranker = GeoRanker::new(
            RankerConfig {
                exclude_high_latency: true,
                max_latency: Duration::from_millis(100),
                ..RankerConfig::default()
            },
            matrix,
        );

        let ranks = ranker
            .rank_nodes(&job("us-east", &[]), &[candidate("n-asia", "asia-east")])
            .unwrap();
        assert_eq!(ranks[0].rank, RANK_UNSUITABLE);
        assert!(ranks[0].reason.contains("max latency"));
    }

    #[test]
    fn rank_is_monotonic_in_latency() {
        let matrix = Arc::new(LatencyMatrix::new(DEFAULT_LATENCY));
        let ranker = GeoRanker::new(RankerConfig::default(), Arc::clone(&matrix));
        let job = job("us-east", &[]);
        let candidates = [candidate("n", "eu-west")];

        let mut previous = i64::MAX;
        for ms in [0u64, 10, 40, 85, 200, 400] {
            matrix.update_latency("us-east", "eu-west", Duration::from_millis(ms));
            let rank = ranker.rank_nodes(&job, &candidates).unwrap()[0].rank;
            assert!(rank <= previous, "rank increased when latency grew");
            previous = rank;
        }
    }

    #[test]
    fn candidates_keep_their_input_order() {
        let ranks = ranker()
            .rank_nodes(
                &job("us-east", &[]),
                &[
                    candidate("n-asia", "asia-east"),
                    candidate("n-local", "us-east"),
                ],
            )
            .unwrap();
        assert_eq!(ranks[0].node_id, "n-asia");
        assert_eq!(ranks[1].node_id, "n-local");
    }

    #[test]
    fn blank_region_falls_back_to_label_inference() {
        let mut c = candidate("n-label", "");
        c.labels
            .insert("region".to_string(), "us-east".to_string());
        let ranks = ranker().rank_nodes(&job("us-east", &[]), &[c]).unwrap();
        assert_eq!(ranks[0].rank, 10);
        assert!(ranks[0].reason.contains("local"));
    }
}
