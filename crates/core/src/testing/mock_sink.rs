//! Mock sink and uploader for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::ingest::RunId;
use crate::sink::{CommitRecord, Sink, SinkError, Uploader};

/// Mock implementation of the Sink trait.
///
/// Records every accepted put in arrival order, so tests can assert on the
/// exact commit sequence. Individual runs can be made to fail.
#[derive(Debug, Clone, Default)]
pub struct MockSink {
    puts: Arc<RwLock<Vec<CommitRecord>>>,
    failing: Arc<RwLock<HashSet<(String, RunId)>>>,
    latest: Arc<RwLock<HashMap<String, RunId>>>,
    latest_error: Arc<RwLock<Option<String>>>,
    latency: Arc<RwLock<Duration>>,
    lookup_latency: Arc<RwLock<Duration>>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend `run` was recorded for `job` by an earlier pass.
    pub async fn set_latest(&self, job: &str, run: &str) {
        self.latest
            .write()
            .await
            .insert(job.to_string(), RunId::from(run));
    }

    /// Make every checkpoint lookup fail.
    pub async fn set_latest_error(&self, reason: &str) {
        *self.latest_error.write().await = Some(reason.to_string());
    }

    /// Reject puts of this run.
    pub async fn fail_run(&self, job: &str, run: &str) {
        self.failing
            .write()
            .await
            .insert((job.to_string(), RunId::from(run)));
    }

    /// Delay every put.
    pub async fn set_latency(&self, latency: Duration) {
        *self.latency.write().await = latency;
    }

    /// Delay every checkpoint lookup.
    pub async fn set_lookup_latency(&self, latency: Duration) {
        *self.lookup_latency.write().await = latency;
    }

    /// Every accepted record, in arrival order.
    pub async fn puts(&self) -> Vec<CommitRecord> {
        self.puts.read().await.clone()
    }

    /// Runs accepted for one job, in arrival order.
    pub async fn committed_runs(&self, job: &str) -> Vec<RunId> {
        self.puts
            .read()
            .await
            .iter()
            .filter(|record| record.job_name == job)
            .map(|record| record.run_id.clone())
            .collect()
    }
}

#[async_trait]
impl Sink for MockSink {
    fn name(&self) -> &str {
        "mock"
    }

    async fn put(&self, record: &CommitRecord) -> Result<(), SinkError> {
        let latency = *self.latency.read().await;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let key = (record.job_name.clone(), record.run_id.clone());
        if self.failing.read().await.contains(&key) {
            return Err(SinkError::Rejected(format!(
                "run {} refused by mock",
                record.run_id
            )));
        }

        self.puts.write().await.push(record.clone());
        Ok(())
    }

    async fn latest_run_for(&self, job: &str) -> Result<Option<RunId>, SinkError> {
        let latency = *self.lookup_latency.read().await;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if let Some(reason) = self.latest_error.read().await.clone() {
            return Err(SinkError::Database(reason));
        }

        let preset = self.latest.read().await.get(job).cloned();
        let recorded = self.committed_runs(job).await.into_iter().max();
        Ok(preset.into_iter().chain(recorded).max())
    }
}

/// Mock implementation of the Uploader trait.
#[derive(Debug, Clone, Default)]
pub struct MockUploader {
    uploads: Arc<RwLock<Vec<CommitRecord>>>,
    error: Arc<RwLock<Option<String>>>,
}

impl MockUploader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every upload fail.
    pub async fn fail_with(&self, reason: &str) {
        *self.error.write().await = Some(reason.to_string());
    }

    /// Runs uploaded for one job, in arrival order.
    pub async fn uploaded_runs(&self, job: &str) -> Vec<RunId> {
        self.uploads
            .read()
            .await
            .iter()
            .filter(|record| record.job_name == job)
            .map(|record| record.run_id.clone())
            .collect()
    }
}

#[async_trait]
impl Uploader for MockUploader {
    async fn upload_content(&self, record: &CommitRecord) -> Result<(), SinkError> {
        if let Some(reason) = self.error.read().await.clone() {
            return Err(SinkError::Database(reason));
        }
        self.uploads.write().await.push(record.clone());
        Ok(())
    }
}
