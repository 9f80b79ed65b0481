//! Tools exposing the capability detector.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deparrow_capability::CapabilityDetector;
use tracing::debug;

use crate::args::get_bool;
use crate::{Tool, ToolArgs, ToolResult};

/// Detect what this node can do, optionally forcing a cache refresh.
pub struct DetectCapabilitiesTool {
    detector: Arc<CapabilityDetector>,
}

impl DetectCapabilitiesTool {
    #[must_use]
    pub fn new(detector: Arc<CapabilityDetector>) -> Self {
        Self { detector }
    }
}

#[async_trait]
impl Tool for DetectCapabilitiesTool {
    fn name(&self) -> &str {
        "detect_capabilities"
    }

    fn description(&self) -> &str {
        "Detect this node's execution engines, GPUs, storage and network attributes. \
         Results are cached; pass refresh=true to force a new detection."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "refresh": {
                    "type": "boolean",
                    "description": "Invalidate the cached snapshot before detecting",
                    "default": false
                }
            },
            "required": []
        })
    }

    async fn execute(&self, deadline: Duration, args: &ToolArgs) -> ToolResult {
        let refresh = get_bool(args, "refresh").unwrap_or(false);
        let result = if refresh {
            self.detector.refresh(deadline).await
        } else {
            self.detector.detect_all(deadline).await
        };

        match result {
            Ok(snapshot) => match serde_json::to_string_pretty(&snapshot) {
                Ok(json) => ToolResult::ok(json),
                Err(e) => ToolResult::error(format!("failed to serialise capabilities: {e}")),
            },
            Err(e) => {
                debug!("capability detection failed: {e}");
                ToolResult::error(format!("capability detection failed: {e}"))
            }
        }
    }
}

/// Run the benchmark suite and report the scores.
pub struct RunBenchmarkTool {
    detector: Arc<CapabilityDetector>,
}

impl RunBenchmarkTool {
    #[must_use]
    pub fn new(detector: Arc<CapabilityDetector>) -> Self {
        Self { detector }
    }
}

#[async_trait]
impl Tool for RunBenchmarkTool {
    fn name(&self) -> &str {
        "run_benchmark"
    }

    fn description(&self) -> &str {
        "Run CPU, memory, disk, network and GPU micro-benchmarks on this node. \
         Scores range from 0 to 1000; higher is faster."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, deadline: Duration, _args: &ToolArgs) -> ToolResult {
        match self.detector.benchmark(deadline).await {
            Ok(scores) => match serde_json::to_string_pretty(&scores) {
                Ok(json) => ToolResult::ok(json),
                Err(e) => ToolResult::error(format!("failed to serialise scores: {e}")),
            },
            Err(e) => ToolResult::error(format!(
                "benchmark failed: {e}; retry with a longer deadline if the node is under load"
            )),
        }
    }
}

/// Report the aggregate capability score used as a placement tiebreaker.
pub struct CapabilityScoreTool {
    detector: Arc<CapabilityDetector>,
}

impl CapabilityScoreTool {
    #[must_use]
    pub fn new(detector: Arc<CapabilityDetector>) -> Self {
        Self { detector }
    }
}

#[async_trait]
impl Tool for CapabilityScoreTool {
    fn name(&self) -> &str {
        "capability_score"
    }

    fn description(&self) -> &str {
        "Summarise this node's capabilities as a single score from 0 to 1000, \
         used to break ties between equally placed nodes."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, deadline: Duration, _args: &ToolArgs) -> ToolResult {
        match self.detector.detect_all(deadline).await {
            Ok(snapshot) => {
                let score = snapshot.capability_score();
                ToolResult::ok(format!(
                    "capability score: {score}/1000 ({} engines, {} GPUs, {} MiB GPU memory)",
                    snapshot.engines.iter().filter(|e| e.available).count(),
                    snapshot.gpus.len(),
                    snapshot.total_gpu_memory_mib()
                ))
            }
            Err(e) => ToolResult::error(format!("capability detection failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deparrow_capability::testing::FakeProbe;

    const DEADLINE: Duration = Duration::from_secs(10);

    fn detector() -> Arc<CapabilityDetector> {
        Arc::new(
            CapabilityDetector::builder()
                .with_probe(Arc::new(FakeProbe::new()))
                .build(),
        )
    }

    #[tokio::test]
    async fn detect_tool_returns_snapshot_json() {
        let tool = DetectCapabilitiesTool::new(detector());
        let result = tool.execute(DEADLINE, &ToolArgs::new()).await;
        assert!(!result.is_error);

        let value: serde_json::Value = serde_json::from_str(&result.for_llm).unwrap();
        assert!(value.get("Engines").is_some());
        assert!(value.get("GPUs").is_some());
    }

    #[tokio::test]
    async fn score_tool_reports_a_bounded_score() {
        let tool = CapabilityScoreTool::new(detector());
        let result = tool.execute(DEADLINE, &ToolArgs::new()).await;
        assert!(!result.is_error);
        assert!(result.for_llm.contains("/1000"));
    }
}
