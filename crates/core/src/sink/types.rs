//! Records written to the sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ingest::RunId;
use crate::store::{DisruptionSample, ProwJobState, TestCase};

/// Normalized form of a finished run, the unit written to the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub job_name: String,
    pub run_id: RunId,
    pub state: ProwJobState,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_secs: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Carried for the test-run uploader.
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
    /// Carried for the disruption uploader.
    #[serde(default)]
    pub disruption: Vec<DisruptionSample>,
}
