//! Types for the ingest module.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A tracked CI job whose runs are loaded into the sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Job name (e.g., "periodic-ci-release-amd64").
    pub name: String,
    /// Whether test-case results are collected for this job.
    #[serde(default)]
    pub collect_test_runs: bool,
    /// Whether backend disruption samples are collected for this job.
    #[serde(default)]
    pub collect_disruption: bool,
}

impl Job {
    /// Creates a job with no collection flags set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collect_test_runs: false,
            collect_disruption: false,
        }
    }

    /// Enables test-run collection.
    pub fn with_test_runs(mut self) -> Self {
        self.collect_test_runs = true;
        self
    }

    /// Enables disruption collection.
    pub fn with_disruption(mut self) -> Self {
        self.collect_disruption = true;
        self
    }
}

/// The data family a load pass collects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadCategory {
    /// Per-run test case results.
    #[default]
    TestRuns,
    /// Per-run backend disruption samples.
    Disruption,
}

impl LoadCategory {
    /// Whether a job opted into this category.
    pub fn wants(&self, job: &Job) -> bool {
        match self {
            Self::TestRuns => job.collect_test_runs,
            Self::Disruption => job.collect_disruption,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TestRuns => "test_runs",
            Self::Disruption => "disruption",
        }
    }
}

impl fmt::Display for LoadCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of a single job run.
///
/// Identifiers made only of ASCII digits compare numerically (leading zeros
/// do not change the position, they only break ties), and sort before every
/// non-numeric identifier. Non-numeric identifiers compare lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is a non-empty string of ASCII digits.
    pub fn is_numeric(&self) -> bool {
        !self.0.is_empty() && self.0.bytes().all(|b| b.is_ascii_digit())
    }

    /// Returns the next identifier in the space.
    ///
    /// Numeric identifiers are incremented keeping their width
    /// (`"0009"` becomes `"0010"`, `"99"` becomes `"100"`). Any other
    /// identifier gets a NUL appended, its immediate lexicographic successor.
    pub fn successor(&self) -> RunId {
        if !self.is_numeric() {
            let mut next = self.0.clone();
            next.push('\0');
            return RunId(next);
        }

        let mut digits = self.0.clone().into_bytes();
        for digit in digits.iter_mut().rev() {
            if *digit == b'9' {
                *digit = b'0';
            } else {
                *digit += 1;
                return RunId(String::from_utf8_lossy(&digits).into_owned());
            }
        }
        // every digit carried over
        digits.insert(0, b'1');
        RunId(String::from_utf8_lossy(&digits).into_owned())
    }
}

impl Ord for RunId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_numeric(), other.is_numeric()) {
            (true, true) => {
                let a = self.0.trim_start_matches('0');
                let b = other.0.trim_start_matches('0');
                a.len()
                    .cmp(&b.len())
                    .then_with(|| a.cmp(b))
                    .then_with(|| self.0.len().cmp(&other.0.len()))
            }
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for RunId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RunId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RunId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl FromStr for RunId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("run id cannot be empty".to_string());
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// Last processed run of a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "run", rename_all = "snake_case")]
pub enum Checkpoint {
    /// Nothing processed yet.
    #[default]
    Origin,
    /// Everything up to and including this run was processed.
    After(RunId),
}

impl Checkpoint {
    /// Builds a checkpoint from the latest run recorded in the sink.
    pub fn from_latest(latest: Option<RunId>) -> Self {
        latest.map(Self::After).unwrap_or(Self::Origin)
    }

    /// The last processed run, if any.
    pub fn last(&self) -> Option<&RunId> {
        match self {
            Self::Origin => None,
            Self::After(run) => Some(run),
        }
    }

    /// First identifier enumeration should return, `None` meaning "from the start".
    pub fn resume_point(&self) -> Option<RunId> {
        self.last().map(RunId::successor)
    }

    /// Whether `run` lies strictly after this checkpoint.
    pub fn admits(&self, run: &RunId) -> bool {
        match self {
            Self::Origin => true,
            Self::After(last) => run > last,
        }
    }

    /// Moves the checkpoint to `run` if that is forward. Returns whether it moved.
    pub fn advance(&mut self, run: &RunId) -> bool {
        if self.admits(run) {
            *self = Self::After(run.clone());
            true
        } else {
            false
        }
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Origin => f.write_str("origin"),
            Self::After(run) => write!(f, "{}", run),
        }
    }
}
