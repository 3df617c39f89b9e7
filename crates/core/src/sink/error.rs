use thiserror::Error;

/// Errors raised by the sink and the content uploaders.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The sink refused the write.
    #[error("Write rejected: {0}")]
    Rejected(String),
}

impl From<rusqlite::Error> for SinkError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}
