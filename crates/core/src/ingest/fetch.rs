//! Bounded fetch stage.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::metrics;
use crate::sink::CommitRecord;
use crate::store::{ArtifactStore, RawArtifact, StoreError};

use super::error::IngestError;
use super::types::RunId;

/// What a fetch produced for one run.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Finished run, normalized and ready to commit.
    Ready(CommitRecord),
    /// The run has not finished yet.
    NotReady,
    /// Nothing was recorded for the run.
    Absent,
    /// Reading or validating the run failed.
    Failed(IngestError),
}

/// Reads and validates run artifacts, at most `max_concurrent` at a time.
///
/// One stage is created per job, so the bound applies per job.
#[derive(Clone)]
pub struct FetchStage {
    store: Arc<dyn ArtifactStore>,
    tokens: Arc<Semaphore>,
    max_concurrent: usize,
}

impl FetchStage {
    pub fn new(store: Arc<dyn ArtifactStore>, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            store,
            tokens: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Tokens not currently held by a fetch.
    pub fn available_tokens(&self) -> usize {
        self.tokens.available_permits()
    }

    /// Waits for a fetch token. Returns `None` if `cancel` fires first.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Option<OwnedSemaphorePermit> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = Arc::clone(&self.tokens).acquire_owned() => permit.ok(),
        }
    }

    /// Reads and validates one run, releasing `token` when done.
    pub async fn fetch(&self, job: &str, run: &RunId, token: OwnedSemaphorePermit) -> FetchOutcome {
        let _token = token;
        let _in_flight = InFlight::enter();

        debug!(job, run = %run, "reading artifact");
        let artifact = match self.store.read_artifact(job, run).await {
            Ok(Some(artifact)) => artifact,
            Ok(None) => {
                debug!(job, run = %run, "no prowjob.json found");
                return FetchOutcome::Absent;
            }
            Err(source) => {
                warn!(job, run = %run, error = %source, "error reading artifact");
                return FetchOutcome::Failed(IngestError::Fetch {
                    job: job.to_string(),
                    run: run.clone(),
                    source,
                });
            }
        };

        match normalize(artifact) {
            Ok(Some(record)) => FetchOutcome::Ready(record),
            Ok(None) => {
                info!(job, run = %run, "skipping run because it isn't finished");
                FetchOutcome::NotReady
            }
            Err(source) => {
                warn!(job, run = %run, error = %source, "invalid artifact");
                FetchOutcome::Failed(IngestError::Fetch {
                    job: job.to_string(),
                    run: run.clone(),
                    source,
                })
            }
        }
    }
}

/// Validates a raw artifact and turns it into a commit record.
///
/// Returns `Ok(None)` for runs without a completion marker.
pub fn normalize(artifact: RawArtifact) -> Result<Option<CommitRecord>, StoreError> {
    let RawArtifact {
        job_name,
        run_id,
        prow_job,
        test_cases,
        disruption,
    } = artifact;

    let Some(end_time) = prow_job.status.completion_time else {
        return Ok(None);
    };
    let start_time = prow_job.status.start_time;
    if end_time < start_time {
        return Err(StoreError::Invalid(format!(
            "jobrun/{}/{} completed at {} before starting at {}",
            job_name, run_id, end_time, start_time
        )));
    }
    if !prow_job.spec.job.is_empty() && prow_job.spec.job != job_name {
        return Err(StoreError::Invalid(format!(
            "jobrun/{}/{} belongs to job {}",
            job_name, run_id, prow_job.spec.job
        )));
    }

    Ok(Some(CommitRecord {
        duration_secs: (end_time - start_time).num_seconds(),
        job_name,
        run_id,
        state: prow_job.status.state,
        start_time,
        end_time,
        cluster: prow_job.spec.cluster,
        release_tag: prow_job.spec.release_tag,
        url: prow_job.status.url,
        test_cases,
        disruption,
    }))
}

/// Keeps the in-flight gauge accurate even when a fetch is dropped midway.
struct InFlight;

impl InFlight {
    fn enter() -> Self {
        metrics::FETCHES_IN_FLIGHT.inc();
        Self
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        metrics::FETCHES_IN_FLIGHT.dec();
    }
}
