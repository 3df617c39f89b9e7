//! Error taxonomy of the ingest pipeline.

use std::fmt;

use thiserror::Error;

use crate::sink::SinkError;
use crate::store::StoreError;

use super::types::RunId;

/// A failure local to one run or one job.
///
/// Not-ready and absent runs are not errors and never appear here.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The job list could not be read; nothing was loaded.
    #[error("failed to get jobs: {0}")]
    ListJobs(#[source] StoreError),

    /// The latest recorded run could not be looked up; the job was not loaded.
    #[error("job/{job}: failed to read checkpoint: {source}")]
    Checkpoint {
        job: String,
        #[source]
        source: SinkError,
    },

    /// Run enumeration failed; runs after the failure were not loaded.
    #[error("job/{job}: failed to enumerate runs: {source}")]
    Enumerate {
        job: String,
        #[source]
        source: StoreError,
    },

    /// The run's artifact could not be read or validated.
    #[error("jobrun/{job}/{run}: failed to fetch: {source}")]
    Fetch {
        job: String,
        run: RunId,
        #[source]
        source: StoreError,
    },

    /// The sink rejected the run's record.
    #[error("jobrun/{job}/{run}: failed to commit: {source}")]
    Commit {
        job: String,
        run: RunId,
        #[source]
        source: SinkError,
    },

    /// The record was committed but its content upload failed.
    #[error("jobrun/{job}/{run}: failed to upload content: {source}")]
    Upload {
        job: String,
        run: RunId,
        #[source]
        source: SinkError,
    },

    /// Work was abandoned because of shutdown.
    #[error("cancelled{}", Scope(.job.as_deref(), .run.as_ref()))]
    Cancelled {
        job: Option<String>,
        run: Option<RunId>,
    },

    /// A slot or job task panicked.
    #[error("job/{job}: task failed: {message}")]
    TaskFailed { job: String, message: String },
}

/// Renders the optional job/run a cancellation applies to.
struct Scope<'a>(Option<&'a str>, Option<&'a RunId>);

impl fmt::Display for Scope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.0, self.1) {
            (Some(job), Some(run)) => write!(f, " at jobrun/{}/{}", job, run),
            (Some(job), None) => write!(f, " at job/{}", job),
            _ => Ok(()),
        }
    }
}

impl IngestError {
    /// Cancellation of one run of a job.
    pub fn cancelled(job: &str, run: Option<&RunId>) -> Self {
        Self::Cancelled {
            job: Some(job.to_string()),
            run: run.cloned(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Pipeline stage the error belongs to, used as a metric label.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::ListJobs(_) => "list_jobs",
            Self::Checkpoint { .. } => "checkpoint",
            Self::Enumerate { .. } => "enumerate",
            Self::Fetch { .. } => "fetch",
            Self::Commit { .. } => "commit",
            Self::Upload { .. } => "upload",
            Self::Cancelled { .. } => "cancelled",
            Self::TaskFailed { .. } => "task",
        }
    }
}

/// Every failure of a load pass, with the amount of work that was processed.
#[derive(Debug)]
pub struct AggregateError {
    pub errors: Vec<IngestError>,
    pub jobs_processed: usize,
    pub runs_processed: usize,
}

impl AggregateError {
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Whether any of the failures is a shutdown cancellation.
    pub fn was_cancelled(&self) -> bool {
        self.errors.iter().any(IngestError::is_cancelled)
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} error(s) across {} job(s), {} run(s) processed",
            self.errors.len(),
            self.jobs_processed,
            self.runs_processed
        )?;
        for error in &self.errors {
            write!(f, "\n  - {}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}
