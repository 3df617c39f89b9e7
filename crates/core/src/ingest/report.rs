//! Per-job and per-pass load reports.

use std::time::Duration;

use crate::metrics;

use super::commit::{SlotOutcome, SlotStatus};
use super::error::{AggregateError, IngestError};
use super::types::{Checkpoint, LoadCategory};

/// What loading one job did.
#[derive(Debug)]
pub struct JobReport {
    pub job: String,
    /// Runs handed to a slot.
    pub enumerated: usize,
    pub committed: usize,
    pub not_ready: usize,
    pub absent: usize,
    /// Slots that ended in a fetch, commit or upload failure.
    pub failed: usize,
    /// Slots abandoned by shutdown.
    pub cancelled: usize,
    /// Greatest run whose slot completed.
    pub watermark: Checkpoint,
    pub errors: Vec<IngestError>,
    pub duration: Duration,
}

impl JobReport {
    pub fn new(job: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            enumerated: 0,
            committed: 0,
            not_ready: 0,
            absent: 0,
            failed: 0,
            cancelled: 0,
            watermark: Checkpoint::Origin,
            errors: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    /// Counts a finished slot.
    pub fn record(&mut self, outcome: SlotOutcome) {
        match outcome.status {
            SlotStatus::Committed => {
                self.committed += 1;
                metrics::RUNS_COMMITTED.inc();
            }
            SlotStatus::NotReady => {
                self.not_ready += 1;
                metrics::RUNS_SKIPPED.with_label_values(&["not_ready"]).inc();
            }
            SlotStatus::Absent => {
                self.absent += 1;
                metrics::RUNS_SKIPPED.with_label_values(&["absent"]).inc();
            }
            SlotStatus::Failed(e) => {
                self.failed += 1;
                self.push_error(e);
            }
            SlotStatus::Cancelled => {
                self.cancelled += 1;
                let error = IngestError::cancelled(&self.job, Some(&outcome.run));
                self.push_error(error);
            }
        }
    }

    pub fn push_error(&mut self, error: IngestError) {
        metrics::RUN_FAILURES
            .with_label_values(&[error.stage()])
            .inc();
        self.errors.push(error);
    }

    /// Runs whose slot ran to completion, committed or not.
    pub fn runs_processed(&self) -> usize {
        self.committed + self.not_ready + self.absent + self.failed
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// What one load pass did across all jobs.
#[derive(Debug)]
pub struct LoadReport {
    pub category: LoadCategory,
    pub jobs: Vec<JobReport>,
    /// Jobs that did not opt into the category.
    pub skipped_jobs: Vec<String>,
    /// Jobs never started because of shutdown.
    pub abandoned_jobs: Vec<String>,
    /// Failures not tied to a single job's runs.
    pub errors: Vec<IngestError>,
    pub duration: Duration,
}

impl LoadReport {
    pub fn new(category: LoadCategory) -> Self {
        Self {
            category,
            jobs: Vec::new(),
            skipped_jobs: Vec::new(),
            abandoned_jobs: Vec::new(),
            errors: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    pub fn push_error(&mut self, error: IngestError) {
        metrics::RUN_FAILURES
            .with_label_values(&[error.stage()])
            .inc();
        self.errors.push(error);
    }

    pub fn error_count(&self) -> usize {
        self.errors.len() + self.jobs.iter().map(|j| j.errors.len()).sum::<usize>()
    }

    pub fn runs_processed(&self) -> usize {
        self.jobs.iter().map(JobReport::runs_processed).sum()
    }

    pub fn runs_committed(&self) -> usize {
        self.jobs.iter().map(|j| j.committed).sum()
    }

    pub fn job(&self, name: &str) -> Option<&JobReport> {
        self.jobs.iter().find(|j| j.job == name)
    }

    /// Turns the report into an error if anything failed.
    ///
    /// Pass-level errors come first, then each job's in the order jobs finished.
    pub fn into_result(mut self) -> Result<Self, AggregateError> {
        if self.error_count() == 0 {
            return Ok(self);
        }

        let jobs_processed = self.jobs.len();
        let runs_processed = self.runs_processed();
        let mut errors = std::mem::take(&mut self.errors);
        for job in &mut self.jobs {
            errors.append(&mut job.errors);
        }

        Err(AggregateError {
            errors,
            jobs_processed,
            runs_processed,
        })
    }
}
