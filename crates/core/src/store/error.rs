//! Error types for the store module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while listing or reading run artifacts.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to read from the backing storage.
    #[error("I/O error at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A document exists but could not be decoded.
    #[error("Failed to parse {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Listing runs for a job failed.
    #[error("Failed to list runs for {job}: {reason}")]
    Listing { job: String, reason: String },

    /// Reading a run's artifact failed.
    #[error("Failed to read artifact: {0}")]
    Read(String),

    /// The artifact was read but its content is inconsistent.
    #[error("Invalid artifact: {0}")]
    Invalid(String),

    /// The listing returned identifiers out of ascending order.
    #[error("Run {next} listed after {previous}, expected ascending order")]
    OutOfOrder { previous: String, next: String },

    /// Job list could not be produced.
    #[error("Failed to list jobs: {0}")]
    Jobs(String),
}

impl StoreError {
    /// Creates an I/O error for a path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a parse error for a path.
    pub fn parse(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Parse {
            path: path.into(),
            source,
        }
    }
}
