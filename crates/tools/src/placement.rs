//! Tools exposing the placement stack.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deparrow_placement::{
    infer_location, Candidate, GeoRanker, LatencyMatrix, PlacementRequest,
    LABEL_EXCLUDE_REGIONS, LABEL_PREFERRED_REGIONS,
};

use crate::args::{get_array, get_str, get_u64, require_str};
use crate::{Tool, ToolArgs, ToolResult};

/// Rank candidate nodes for a job by geographic proximity to its origin.
pub struct RankNodesTool {
    ranker: Arc<GeoRanker>,
}

impl RankNodesTool {
    #[must_use]
    pub fn new(ranker: Arc<GeoRanker>) -> Self {
        Self { ranker }
    }
}

#[async_trait]
impl Tool for RankNodesTool {
    fn name(&self) -> &str {
        "rank_nodes"
    }

    fn description(&self) -> &str {
        "Rank candidate nodes for a job by latency to its origin region. \
         Honours preferred and excluded regions; higher ranks are better and \
         unsuitable nodes are flagged."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "job_id": {
                    "type": "string",
                    "description": "Identifier of the job being placed",
                    "default": "adhoc"
                },
                "origin_region": {
                    "type": "string",
                    "description": "Canonical region the job was submitted from, e.g. us-east"
                },
                "candidates": {
                    "type": "array",
                    "description": "Candidate nodes as {node_id, region} objects",
                    "items": {
                        "type": "object",
                        "properties": {
                            "node_id": {"type": "string", "description": "Node identifier"},
                            "region": {"type": "string", "description": "Canonical node region"}
                        },
                        "required": ["node_id", "region"]
                    }
                },
                "preferred_regions": {
                    "type": "string",
                    "description": "Comma-separated regions to boost"
                },
                "exclude_regions": {
                    "type": "string",
                    "description": "Comma-separated regions to reject"
                }
            },
            "required": ["origin_region", "candidates"]
        })
    }

    async fn execute(&self, _deadline: Duration, args: &ToolArgs) -> ToolResult {
        let origin = match require_str(args, "origin_region") {
            Ok(origin) => origin.to_string(),
            Err(e) => return ToolResult::error(e),
        };
        let Some(raw_candidates) = get_array(args, "candidates") else {
            return ToolResult::error("missing required parameter: candidates");
        };

        let mut candidates = Vec::with_capacity(raw_candidates.len());
        for raw in raw_candidates {
            match serde_json::from_value::<Candidate>(raw.clone()) {
                Ok(candidate) => candidates.push(candidate),
                Err(e) => {
                    return ToolResult::error(format!("malformed candidate {raw}: {e}"));
                }
            }
        }

        let mut labels = HashMap::new();
        if let Some(preferred) = get_str(args, "preferred_regions") {
            labels.insert(LABEL_PREFERRED_REGIONS.to_string(), preferred.to_string());
        }
        if let Some(excluded) = get_str(args, "exclude_regions") {
            labels.insert(LABEL_EXCLUDE_REGIONS.to_string(), excluded.to_string());
        }

        let job = PlacementRequest {
            job_id: get_str(args, "job_id").unwrap_or("adhoc").to_string(),
            origin_region: origin,
            labels,
        };

        match self.ranker.rank_nodes(&job, &candidates) {
            Ok(ranks) => {
                let lines: Vec<String> = ranks
                    .iter()
                    .map(|r| {
                        if r.unsuitable {
                            format!("{}: unsuitable ({})", r.node_id, r.reason)
                        } else {
                            format!("{}: rank {} ({})", r.node_id, r.rank, r.reason)
                        }
                    })
                    .collect();
                ToolResult::ok(lines.join("\n"))
            }
            Err(e) => ToolResult::error(format!("ranking failed: {e}")),
        }
    }
}

/// Read one pairwise latency from the matrix.
pub struct GetLatencyTool {
    matrix: Arc<LatencyMatrix>,
}

impl GetLatencyTool {
    #[must_use]
    pub fn new(matrix: Arc<LatencyMatrix>) -> Self {
        Self { matrix }
    }
}

#[async_trait]
impl Tool for GetLatencyTool {
    fn name(&self) -> &str {
        "get_latency"
    }

    fn description(&self) -> &str {
        "Look up the tracked latency between two regions in milliseconds."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "from_region": {"type": "string", "description": "First region"},
                "to_region": {"type": "string", "description": "Second region"}
            },
            "required": ["from_region", "to_region"]
        })
    }

    async fn execute(&self, _deadline: Duration, args: &ToolArgs) -> ToolResult {
        let (from, to) = match (require_str(args, "from_region"), require_str(args, "to_region")) {
            (Ok(from), Ok(to)) => (from, to),
            (Err(e), _) | (_, Err(e)) => return ToolResult::error(e),
        };
        let latency = self.matrix.get_latency(from, to);
        ToolResult::ok(format!(
            "latency {from} -> {to}: {}ms",
            latency.as_millis()
        ))
    }
}

/// Record a measured latency for a region pair (both directions).
pub struct UpdateLatencyTool {
    matrix: Arc<LatencyMatrix>,
}

impl UpdateLatencyTool {
    #[must_use]
    pub fn new(matrix: Arc<LatencyMatrix>) -> Self {
        Self { matrix }
    }
}

#[async_trait]
impl Tool for UpdateLatencyTool {
    fn name(&self) -> &str {
        "update_latency"
    }

    fn description(&self) -> &str {
        "Record a measured latency between two regions. The matrix is \
         symmetric, so both directions are updated."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "from_region": {"type": "string", "description": "First region"},
                "to_region": {"type": "string", "description": "Second region"},
                "latency_ms": {
                    "type": "number",
                    "description": "Measured round-trip latency in milliseconds",
                    "minimum": 0
                }
            },
            "required": ["from_region", "to_region", "latency_ms"]
        })
    }

    async fn execute(&self, _deadline: Duration, args: &ToolArgs) -> ToolResult {
        let (from, to) = match (require_str(args, "from_region"), require_str(args, "to_region")) {
            (Ok(from), Ok(to)) => (from, to),
            (Err(e), _) | (_, Err(e)) => return ToolResult::error(e),
        };
        let Some(latency_ms) = get_u64(args, "latency_ms") else {
            return ToolResult::error("missing required parameter: latency_ms");
        };
        self.matrix
            .update_latency(from, to, Duration::from_millis(latency_ms));
        ToolResult::ok(format!("recorded {from} <-> {to} at {latency_ms}ms"))
    }
}

/// Normalise a node's labels into a canonical region.
pub struct InferLocationTool;

#[async_trait]
impl Tool for InferLocationTool {
    fn name(&self) -> &str {
        "infer_location"
    }

    fn description(&self) -> &str {
        "Normalise a node's location labels (cloud region, topology labels, \
         country code) into a canonical region identifier."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "labels": {
                    "type": "object",
                    "description": "The node's label map, e.g. {\"cloud-region\": \"us-east-1\"}"
                }
            },
            "required": ["labels"]
        })
    }

    async fn execute(&self, _deadline: Duration, args: &ToolArgs) -> ToolResult {
        let Some(raw) = args.get("labels").and_then(|v| v.as_object()) else {
            return ToolResult::error("missing required parameter: labels");
        };
        let labels: HashMap<String, String> = raw
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect();

        let location = infer_location(&labels);
        match serde_json::to_string_pretty(&location) {
            Ok(json) => ToolResult::ok(json),
            Err(e) => ToolResult::error(format!("failed to serialise location: {e}")),
        }
    }
}
