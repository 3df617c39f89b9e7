//! Job source backed by the `[[jobs]]` tables of the configuration.

use async_trait::async_trait;

use crate::ingest::Job;

use super::error::StoreError;
use super::traits::JobSource;

/// Serves a fixed list of jobs.
#[derive(Debug, Clone, Default)]
pub struct ConfigJobSource {
    jobs: Vec<Job>,
}

impl ConfigJobSource {
    pub fn new(jobs: Vec<Job>) -> Self {
        Self { jobs }
    }
}

#[async_trait]
impl JobSource for ConfigJobSource {
    async fn list_jobs(&self) -> Result<Vec<Job>, StoreError> {
        Ok(self.jobs.clone())
    }
}
