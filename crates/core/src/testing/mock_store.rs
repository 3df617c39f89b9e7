//! Mock artifact store for testing.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::ingest::RunId;
use crate::store::{ArtifactStore, RawArtifact, RunIdStream, StoreError};

use super::fixtures;

#[derive(Debug, Clone)]
enum RunKind {
    Ready,
    NotReady,
    Absent,
    Failing(String),
}

/// How a mock run behaves when read.
#[derive(Debug, Clone)]
pub struct MockRun {
    kind: RunKind,
    latency: Duration,
}

impl MockRun {
    /// A finished run, see [`fixtures::finished_artifact`].
    pub fn ready() -> Self {
        Self::of(RunKind::Ready)
    }

    /// A run without a completion time.
    pub fn not_ready() -> Self {
        Self::of(RunKind::NotReady)
    }

    /// A listed run with no prowjob.json.
    pub fn absent() -> Self {
        Self::of(RunKind::Absent)
    }

    /// A run whose read fails.
    pub fn failing(reason: &str) -> Self {
        Self::of(RunKind::Failing(reason.to_string()))
    }

    /// Delays the read by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn of(kind: RunKind) -> Self {
        Self {
            kind,
            latency: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
enum ListingFailure {
    Immediate(String),
    After(usize, String),
}

/// Mock implementation of the ArtifactStore trait.
///
/// Provides controllable behavior for testing:
/// - Per-run outcomes and latencies
/// - Listing failures, immediate or part way through
/// - Out-of-order listings
/// - Concurrency instrumentation of reads
#[derive(Debug, Clone, Default)]
pub struct MockArtifactStore {
    runs: Arc<RwLock<HashMap<String, BTreeMap<RunId, MockRun>>>>,
    listing_failures: Arc<RwLock<HashMap<String, ListingFailure>>>,
    listing_overrides: Arc<RwLock<HashMap<String, Vec<RunId>>>>,
    listed_from: Arc<RwLock<Vec<Option<RunId>>>>,
    listing_latency: Arc<RwLock<Duration>>,
    reads: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl MockArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a run to a job.
    pub async fn add_run(&self, job: &str, run: &str, behavior: MockRun) {
        self.runs
            .write()
            .await
            .entry(job.to_string())
            .or_default()
            .insert(RunId::from(run), behavior);
    }

    /// Make listing the job fail outright.
    pub async fn fail_listing(&self, job: &str, reason: &str) {
        self.listing_failures.write().await.insert(
            job.to_string(),
            ListingFailure::Immediate(reason.to_string()),
        );
    }

    /// Make the job's listing fail after yielding `count` identifiers.
    pub async fn fail_listing_after(&self, job: &str, count: usize, reason: &str) {
        self.listing_failures.write().await.insert(
            job.to_string(),
            ListingFailure::After(count, reason.to_string()),
        );
    }

    /// List exactly these identifiers for the job, ignoring the resume point.
    pub async fn set_listing_override(&self, job: &str, runs: Vec<&str>) {
        self.listing_overrides.write().await.insert(
            job.to_string(),
            runs.into_iter().map(RunId::from).collect(),
        );
    }

    /// Delay every listing request before it yields anything.
    pub async fn set_listing_latency(&self, latency: Duration) {
        *self.listing_latency.write().await = latency;
    }

    /// Resume points of every listing request, in call order.
    pub async fn listed_from(&self) -> Vec<Option<RunId>> {
        self.listed_from.read().await.clone()
    }

    /// Number of artifact reads performed.
    pub async fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Highest number of reads observed in flight at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Reads in flight right now.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

/// Counts a read as in flight until dropped.
struct ReadGuard(Arc<AtomicUsize>);

impl Drop for ReadGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ArtifactStore for MockArtifactStore {
    fn name(&self) -> &str {
        "mock"
    }

    async fn list_run_ids(
        &self,
        job: &str,
        from: Option<&RunId>,
    ) -> Result<RunIdStream, StoreError> {
        self.listed_from.write().await.push(from.cloned());

        let latency = *self.listing_latency.read().await;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let failure = self.listing_failures.read().await.get(job).cloned();
        if let Some(ListingFailure::Immediate(reason)) = &failure {
            return Err(StoreError::Listing {
                job: job.to_string(),
                reason: reason.clone(),
            });
        }

        let ids: Vec<RunId> = match self.listing_overrides.read().await.get(job) {
            Some(ids) => ids.clone(),
            None => self
                .runs
                .read()
                .await
                .get(job)
                .map(|runs| {
                    runs.keys()
                        .filter(|run| from.map_or(true, |from| *run >= from))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default(),
        };

        let mut items: Vec<Result<RunId, StoreError>> = Vec::new();
        match failure {
            Some(ListingFailure::After(count, reason)) => {
                items.extend(ids.into_iter().take(count).map(Ok));
                items.push(Err(StoreError::Listing {
                    job: job.to_string(),
                    reason,
                }));
            }
            _ => items.extend(ids.into_iter().map(Ok)),
        }

        Ok(stream::iter(items).boxed())
    }

    async fn read_artifact(
        &self,
        job: &str,
        run: &RunId,
    ) -> Result<Option<RawArtifact>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = ReadGuard(Arc::clone(&self.in_flight));

        let behavior = self
            .runs
            .read()
            .await
            .get(job)
            .and_then(|runs| runs.get(run))
            .cloned();
        let Some(behavior) = behavior else {
            return Ok(None);
        };

        if !behavior.latency.is_zero() {
            tokio::time::sleep(behavior.latency).await;
        }

        match behavior.kind {
            RunKind::Ready => Ok(Some(fixtures::finished_artifact(job, run.as_str()))),
            RunKind::NotReady => Ok(Some(fixtures::unfinished_artifact(job, run.as_str()))),
            RunKind::Absent => Ok(None),
            RunKind::Failing(reason) => Err(StoreError::Read(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_listing_is_sorted_and_resumes() {
        let store = MockArtifactStore::new();
        for run in ["10", "9", "11"] {
            store.add_run("e2e", run, MockRun::ready()).await;
        }

        let from = RunId::from("10");
        let ids: Vec<_> = store
            .list_run_ids("e2e", Some(&from))
            .await
            .unwrap()
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();

        assert_eq!(ids, vec![RunId::from("10"), RunId::from("11")]);
    }

    #[tokio::test]
    async fn test_read_outcomes() {
        let store = MockArtifactStore::new();
        store.add_run("e2e", "1", MockRun::ready()).await;
        store.add_run("e2e", "2", MockRun::failing("boom")).await;

        assert!(store
            .read_artifact("e2e", &RunId::from("1"))
            .await
            .unwrap()
            .is_some());
        assert!(store.read_artifact("e2e", &RunId::from("2")).await.is_err());
        assert!(store
            .read_artifact("e2e", &RunId::from("3"))
            .await
            .unwrap()
            .is_none());
        assert_eq!(store.reads().await, 3);
        assert_eq!(store.in_flight(), 0);
        assert_eq!(store.peak_concurrency(), 1);
    }
}
