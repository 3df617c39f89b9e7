//! Mock job source for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::ingest::Job;
use crate::store::{JobSource, StoreError};

/// Mock implementation of the JobSource trait.
#[derive(Debug, Clone, Default)]
pub struct MockJobSource {
    jobs: Arc<RwLock<Vec<Job>>>,
    error: Arc<RwLock<Option<String>>>,
}

impl MockJobSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, job: Job) {
        self.jobs.write().await.push(job);
    }

    /// Make job listing fail.
    pub async fn fail_with(&self, reason: &str) {
        *self.error.write().await = Some(reason.to_string());
    }
}

#[async_trait]
impl JobSource for MockJobSource {
    async fn list_jobs(&self) -> Result<Vec<Job>, StoreError> {
        if let Some(reason) = self.error.read().await.clone() {
            return Err(StoreError::Jobs(reason));
        }
        Ok(self.jobs.read().await.clone())
    }
}
