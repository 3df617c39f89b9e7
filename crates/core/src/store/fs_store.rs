//! Filesystem-backed artifact store.
//!
//! Mirrors the bucket layout CI systems upload to:
//!
//! ```text
//! <root>/logs/<job>/<run>/prowjob.json
//! <root>/logs/<job>/<run>/junit.json        (optional)
//! <root>/logs/<job>/<run>/disruption.json   (optional)
//! ```

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::de::DeserializeOwned;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

use crate::ingest::RunId;

use super::config::StoreConfig;
use super::error::StoreError;
use super::traits::{ArtifactStore, RunIdStream};
use super::types::{DisruptionSample, ProwJob, RawArtifact, TestCase};

const PROWJOB_FILE: &str = "prowjob.json";
const JUNIT_FILE: &str = "junit.json";
const DISRUPTION_FILE: &str = "disruption.json";

/// Artifact store reading run directories from local disk.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    config: StoreConfig,
}

impl FsArtifactStore {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    fn job_dir(&self, job: &str) -> PathBuf {
        self.config.root.join("logs").join(job)
    }

    fn run_dir(&self, job: &str, run: &RunId) -> PathBuf {
        self.job_dir(job).join(run.as_str())
    }

    /// Whether a run was touched too recently to be considered settled.
    fn is_too_recent(&self, modified: Option<SystemTime>, now: SystemTime) -> bool {
        let min_age = self.config.min_run_age();
        if min_age.is_zero() {
            return false;
        }
        match modified {
            Some(modified) => match now.duration_since(modified) {
                Ok(age) => age < min_age,
                // modified in the future
                Err(_) => true,
            },
            None => false,
        }
    }
}

/// Reads and decodes a JSON document, `None` if the file does not exist.
async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::parse(path, e)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    fn name(&self) -> &str {
        "filesystem"
    }

    async fn list_run_ids(
        &self,
        job: &str,
        from: Option<&RunId>,
    ) -> Result<RunIdStream, StoreError> {
        let dir = self.job_dir(job);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(job, path = %dir.display(), "job has no runs yet");
                return Ok(stream::empty().boxed());
            }
            Err(e) => return Err(StoreError::io(&dir, e)),
        };

        let now = SystemTime::now();
        let mut runs = Vec::new();
        let mut too_recent = 0usize;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&dir, e))?
        {
            let metadata = entry
                .metadata()
                .await
                .map_err(|e| StoreError::io(entry.path(), e))?;
            if !metadata.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(RunId::from) else {
                continue;
            };
            if from.is_some_and(|from| &name < from) {
                continue;
            }
            if self.is_too_recent(metadata.modified().ok(), now) {
                too_recent += 1;
                continue;
            }
            runs.push(name);
        }
        runs.sort();

        debug!(job, listed = runs.len(), too_recent, "listed runs");
        Ok(stream::iter(runs.into_iter().map(Ok)).boxed())
    }

    async fn read_artifact(
        &self,
        job: &str,
        run: &RunId,
    ) -> Result<Option<RawArtifact>, StoreError> {
        let dir = self.run_dir(job, run);
        let Some(prow_job) = read_json::<ProwJob>(&dir.join(PROWJOB_FILE)).await? else {
            return Ok(None);
        };
        let test_cases: Vec<TestCase> = read_json(&dir.join(JUNIT_FILE)).await?.unwrap_or_default();
        let disruption: Vec<DisruptionSample> = read_json(&dir.join(DISRUPTION_FILE))
            .await?
            .unwrap_or_default();

        Ok(Some(RawArtifact {
            job_name: job.to_string(),
            run_id: run.clone(),
            prow_job,
            test_cases,
            disruption,
        }))
    }
}
