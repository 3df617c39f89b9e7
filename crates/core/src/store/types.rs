//! Artifact documents read from the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ingest::RunId;

/// The subset of a `prowjob.json` document the loader needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProwJob {
    #[serde(default)]
    pub spec: ProwJobSpec,
    pub status: ProwJobStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProwJobSpec {
    /// Job name as recorded by the CI system.
    #[serde(default)]
    pub job: String,
    /// Build cluster the run was scheduled on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    /// Release payload the run tested, if it tested one.
    #[serde(
        default,
        alias = "releaseTag",
        skip_serializing_if = "Option::is_none"
    )]
    pub release_tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProwJobStatus {
    pub state: ProwJobState,
    pub start_time: DateTime<Utc>,
    /// Set once the run finished. Its absence marks the run as not ready.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Run state reported by the CI system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProwJobState {
    Triggered,
    Pending,
    Success,
    Failure,
    Aborted,
    Error,
    #[serde(other)]
    Unknown,
}

impl ProwJobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Triggered => "triggered",
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Aborted => "aborted",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }
}

/// Outcome of a single test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// One entry of a run's `junit.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub status: TestStatus,
    #[serde(default)]
    pub duration_secs: f64,
}

/// One entry of a run's `disruption.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisruptionSample {
    /// Backend that was polled (e.g., "kube-api-new-connections").
    pub backend: String,
    /// Seconds the backend was unavailable during the run.
    pub disruption_secs: u64,
}

/// Unprocessed content of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RawArtifact {
    pub job_name: String,
    pub run_id: RunId,
    pub prow_job: ProwJob,
    pub test_cases: Vec<TestCase>,
    pub disruption: Vec<DisruptionSample>,
}

impl RawArtifact {
    /// Whether the run carries its completion marker.
    pub fn is_finished(&self) -> bool {
        self.prow_job.status.completion_time.is_some()
    }
}
