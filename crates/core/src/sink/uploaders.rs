//! Category-specific content uploaders.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::ingest::LoadCategory;

use super::{CommitRecord, SinkError, SqliteSink, Uploader};

/// Writes a run's test cases to the `test_runs` table.
pub struct TestRunUploader {
    sink: Arc<SqliteSink>,
}

impl TestRunUploader {
    pub fn new(sink: Arc<SqliteSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Uploader for TestRunUploader {
    async fn upload_content(&self, record: &CommitRecord) -> Result<(), SinkError> {
        let rows = self.sink.insert_test_cases(record)?;
        debug!(job = %record.job_name, run = %record.run_id, rows, "uploaded test cases");
        Ok(())
    }
}

/// Writes a run's disruption samples to the `backend_disruption` table.
pub struct DisruptionUploader {
    sink: Arc<SqliteSink>,
}

impl DisruptionUploader {
    pub fn new(sink: Arc<SqliteSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Uploader for DisruptionUploader {
    async fn upload_content(&self, record: &CommitRecord) -> Result<(), SinkError> {
        let rows = self.sink.insert_disruption(record)?;
        debug!(job = %record.job_name, run = %record.run_id, rows, "uploaded disruption samples");
        Ok(())
    }
}

/// Create the uploader for a load category.
pub fn create_uploader(category: LoadCategory, sink: Arc<SqliteSink>) -> Arc<dyn Uploader> {
    match category {
        LoadCategory::TestRuns => Arc::new(TestRunUploader::new(sink)),
        LoadCategory::Disruption => Arc::new(DisruptionUploader::new(sink)),
    }
}
