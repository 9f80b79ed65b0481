use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("Program not found on PATH: {0}")]
    ProbeNotFound(String),

    #[error("Probe deadline expired: {0}")]
    ProbeTimeout(String),

    #[error("Unexpected output from {tool}: {message}")]
    Parse { tool: String, message: String },

    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Benchmark error: {0}")]
    Benchmark(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CapabilityError {
    pub fn parse(tool: impl Into<String>, message: impl Into<String>) -> Self {
        CapabilityError::Parse {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Whether the error means "the capability is absent" rather than
    /// "detection broke". Callers treat these as empty results.
    pub fn is_absence(&self) -> bool {
        matches!(
            self,
            CapabilityError::ProbeNotFound(_) | CapabilityError::NotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CapabilityError>;
