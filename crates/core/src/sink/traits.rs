//! Trait definitions for the sink module.

use async_trait::async_trait;

use crate::ingest::RunId;

use super::error::SinkError;
use super::types::CommitRecord;

/// Append-style system of record for committed runs.
///
/// Calls arrive concurrently from different jobs. Writes are at-least-once;
/// implementations must not rely on uniqueness.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Returns the name of this sink implementation.
    fn name(&self) -> &str;

    /// Appends one record.
    async fn put(&self, record: &CommitRecord) -> Result<(), SinkError>;

    /// Greatest run identifier recorded for `job`, if any.
    async fn latest_run_for(&self, job: &str) -> Result<Option<RunId>, SinkError>;
}

/// Writes the category-specific content of a committed run.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload_content(&self, record: &CommitRecord) -> Result<(), SinkError>;
}
