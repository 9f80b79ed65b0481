use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlacementError {
    #[error("No candidate nodes to rank")]
    NoCandidates,

    #[error("Invalid origin region: {0:?}")]
    InvalidOrigin(String),

    #[error("Latency probe failed: {0}")]
    Probe(String),
}

pub type Result<T> = std::result::Result<T, PlacementError>;
