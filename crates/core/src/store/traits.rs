//! Trait definitions for the store module.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::ingest::{Job, RunId};

use super::error::StoreError;
use super::types::RawArtifact;

/// Ascending stream of run identifiers for one job.
pub type RunIdStream = BoxStream<'static, Result<RunId, StoreError>>;

/// Read-only access to the runs of CI jobs.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Returns the name of this store implementation.
    fn name(&self) -> &str;

    /// Lists the runs of `job` whose identifier is `>= from`, ascending.
    ///
    /// `None` lists every run. An empty stream is not an error.
    async fn list_run_ids(&self, job: &str, from: Option<&RunId>)
        -> Result<RunIdStream, StoreError>;

    /// Reads everything recorded for one run.
    ///
    /// Returns `Ok(None)` when the run has no artifact at all.
    async fn read_artifact(
        &self,
        job: &str,
        run: &RunId,
    ) -> Result<Option<RawArtifact>, StoreError>;
}

/// Source of the jobs tracked for ingestion.
#[async_trait]
pub trait JobSource: Send + Sync {
    async fn list_jobs(&self) -> Result<Vec<Job>, StoreError>;
}
