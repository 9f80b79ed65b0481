//! Geographic placement for the DEparrow compute marketplace.
//!
//! Answers "where should this job run": the [`LatencyMatrix`] tracks
//! symmetric inter-region latencies, [`location`] normalises node labels
//! into canonical regions, and the [`GeoRanker`] turns a job plus a
//! candidate set into ranked placement decisions with human-readable
//! rationale.

pub mod error;
pub mod latency;
pub mod location;
pub mod ranker;

pub use error::{PlacementError, Result};
pub use latency::{
    estimated_latency, HttpLatencyProbe, LatencyMatrix, LatencyProbe, NodeSelection,
    DEFAULT_LATENCY,
};
pub use location::{infer_location, region_to_continent, Location, DEFAULT_REGION};
pub use ranker::{
    Candidate, GeoRanker, NodeRank, PlacementRequest, RankerConfig, LABEL_EXCLUDE_REGIONS,
    LABEL_PREFERRED_REGIONS, RANK_POSSIBLE, RANK_UNSUITABLE,
};
