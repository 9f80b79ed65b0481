//! Agent-facing tool surface.
//!
//! External agents drive the capability and placement cores through a
//! uniform contract: every action has a unique name, a description, a JSON
//! schema for its parameters and an `execute` entry point that never panics.
//! Schemas are restricted JSON-Schema fragments (`type`, `properties`,
//! `required`, `items`, `enum`, `default`, `minimum`, `maximum`,
//! `description`).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deparrow_capability::CapabilityDetector;
use deparrow_placement::GeoRanker;

pub mod args;
pub mod capability;
pub mod placement;
pub mod registry;

pub use capability::{CapabilityScoreTool, DetectCapabilitiesTool, RunBenchmarkTool};
pub use placement::{
    GetLatencyTool, InferLocationTool, RankNodesTool, UpdateLatencyTool,
};
pub use registry::ToolRegistry;

/// Dynamically typed tool arguments as they arrive from an agent.
pub type ToolArgs = serde_json::Map<String, serde_json::Value>;

/// What a tool hands back to the calling agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    /// Human-readable payload for the agent.
    pub for_llm: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            for_llm: message.into(),
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            for_llm: message.into(),
            is_error: true,
        }
    }
}

/// Build a registry with the full tool set over a detector and ranker.
pub fn standard_registry(
    detector: Arc<CapabilityDetector>,
    ranker: Arc<GeoRanker>,
) -> ToolRegistry {
    let matrix = Arc::clone(ranker.matrix());
    let registry = ToolRegistry::new();
    registry.register(Arc::new(DetectCapabilitiesTool::new(Arc::clone(&detector))));
    registry.register(Arc::new(RunBenchmarkTool::new(Arc::clone(&detector))));
    registry.register(Arc::new(CapabilityScoreTool::new(detector)));
    registry.register(Arc::new(RankNodesTool::new(ranker)));
    registry.register(Arc::new(GetLatencyTool::new(Arc::clone(&matrix))));
    registry.register(Arc::new(UpdateLatencyTool::new(matrix)));
    registry.register(Arc::new(InferLocationTool));
    registry
}

/// One callable action.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Globally unique identifier.
    fn name(&self) -> &str;

    /// Free-form text agents use to pick a tool.
    fn description(&self) -> &str;

    /// JSON-schema object describing the accepted arguments.
    fn parameters(&self) -> serde_json::Value;

    /// Run the action. Failures come back as a [`ToolResult`] with
    /// `is_error` set, never as a panic.
    async fn execute(&self, deadline: Duration, args: &ToolArgs) -> ToolResult;
}
