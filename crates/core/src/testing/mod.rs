//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the collaborator traits
//! consumed by the ingest pipeline, allowing the pipeline to be exercised
//! without a real artifact bucket or warehouse.
//!
//! # Example
//!
//! ```rust,ignore
//! use runloader_core::testing::{MockArtifactStore, MockRun, MockSink};
//!
//! let store = MockArtifactStore::new();
//! let sink = MockSink::new();
//!
//! // Configure runs and their fetch behavior
//! store.add_run("e2e-aws", "6", MockRun::ready()).await;
//! store.add_run("e2e-aws", "7", MockRun::not_ready()).await;
//! sink.set_latest("e2e-aws", "5").await;
//!
//! // Run a JobPipeline, then inspect
//! assert_eq!(sink.committed_runs("e2e-aws").await.len(), 1);
//! ```

mod mock_jobs;
mod mock_sink;
mod mock_store;

pub use mock_jobs::MockJobSource;
pub use mock_sink::{MockSink, MockUploader};
pub use mock_store::{MockArtifactStore, MockRun};

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::{DateTime, Duration, Utc};

    use crate::ingest::RunId;
    use crate::sink::CommitRecord;
    use crate::store::{
        DisruptionSample, ProwJob, ProwJobSpec, ProwJobState, ProwJobStatus, RawArtifact,
        TestCase, TestStatus,
    };

    /// Release payload carried by every finished fixture run.
    pub const RELEASE_TAG: &str = "4.21.0-0.nightly-2025-12-31-230000";

    /// Start time shared by every fixture run (2026-01-01T00:00:00Z).
    pub fn start_time() -> DateTime<Utc> {
        DateTime::from_timestamp(1_767_225_600, 0).unwrap_or_default()
    }

    /// Test cases reported by a fixture run.
    pub fn test_cases() -> Vec<TestCase> {
        vec![
            TestCase {
                name: "[sig-network] Services should serve endpoints".to_string(),
                status: TestStatus::Passed,
                duration_secs: 12.5,
            },
            TestCase {
                name: "[sig-storage] PVC should bind".to_string(),
                status: TestStatus::Failed,
                duration_secs: 301.0,
            },
        ]
    }

    /// Disruption samples reported by a fixture run.
    pub fn disruption() -> Vec<DisruptionSample> {
        vec![
            DisruptionSample {
                backend: "kube-api-new-connections".to_string(),
                disruption_secs: 3,
            },
            DisruptionSample {
                backend: "ingress-to-console".to_string(),
                disruption_secs: 0,
            },
        ]
    }

    /// A run that finished successfully one hour after starting.
    pub fn finished_artifact(job: &str, run: &str) -> RawArtifact {
        let start = start_time();
        RawArtifact {
            job_name: job.to_string(),
            run_id: RunId::from(run),
            prow_job: ProwJob {
                spec: ProwJobSpec {
                    job: job.to_string(),
                    cluster: Some("build01".to_string()),
                    release_tag: Some(RELEASE_TAG.to_string()),
                },
                status: ProwJobStatus {
                    state: ProwJobState::Success,
                    start_time: start,
                    completion_time: Some(start + Duration::hours(1)),
                    url: Some(format!("https://prow.example.com/view/{}/{}", job, run)),
                },
            },
            test_cases: test_cases(),
            disruption: disruption(),
        }
    }

    /// A run that is still executing.
    pub fn unfinished_artifact(job: &str, run: &str) -> RawArtifact {
        let mut artifact = finished_artifact(job, run);
        artifact.prow_job.status.state = ProwJobState::Pending;
        artifact.prow_job.status.completion_time = None;
        artifact.test_cases.clear();
        artifact.disruption.clear();
        artifact
    }

    /// The record a [`finished_artifact`] normalizes to.
    pub fn commit_record(job: &str, run: &str) -> CommitRecord {
        let start = start_time();
        CommitRecord {
            job_name: job.to_string(),
            run_id: RunId::from(run),
            state: ProwJobState::Success,
            start_time: start,
            end_time: start + Duration::hours(1),
            duration_secs: 3600,
            cluster: Some("build01".to_string()),
            release_tag: Some(RELEASE_TAG.to_string()),
            url: Some(format!("https://prow.example.com/view/{}/{}", job, run)),
            test_cases: test_cases(),
            disruption: disruption(),
        }
    }
}
