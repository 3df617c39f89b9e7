//! Ordered commit stage.
//!
//! Every enumerated run gets a [`Slot`]. Slots of one job are chained by
//! gates: a slot may fetch at any time, but it only commits after the gate of
//! the slot before it is closed, and it closes its own gate when it is done
//! no matter how it finished. Commits of a job therefore happen in
//! enumeration order while fetches overlap.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedSemaphorePermit;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::sink::{CommitRecord, Sink, Uploader};

use super::error::IngestError;
use super::fetch::{FetchOutcome, FetchStage};
use super::gate::{Gate, GateCloser};
use super::types::{Checkpoint, RunId};

/// Writes committed runs to the sink, then uploads their content.
#[derive(Clone)]
pub struct CommitStage {
    sink: Arc<dyn Sink>,
    uploader: Arc<dyn Uploader>,
}

impl CommitStage {
    pub fn new(sink: Arc<dyn Sink>, uploader: Arc<dyn Uploader>) -> Self {
        Self { sink, uploader }
    }

    /// Appends the record and uploads its category content.
    ///
    /// Content is only uploaded once the record itself was accepted.
    pub async fn commit(&self, record: &CommitRecord) -> Result<(), IngestError> {
        self.sink
            .put(record)
            .await
            .map_err(|source| IngestError::Commit {
                job: record.job_name.clone(),
                run: record.run_id.clone(),
                source,
            })?;

        self.uploader
            .upload_content(record)
            .await
            .map_err(|source| IngestError::Upload {
                job: record.job_name.clone(),
                run: record.run_id.clone(),
                source,
            })?;

        info!(
            job = %record.job_name,
            run = %record.run_id,
            state = record.state.as_str(),
            "committed run"
        );
        Ok(())
    }
}

/// Greatest run of a job whose slot has completed.
///
/// Shared by the slots of one job. It only moves forward.
#[derive(Debug, Clone, Default)]
pub struct Watermark(Arc<Mutex<Checkpoint>>);

impl Watermark {
    pub fn new(start: Checkpoint) -> Self {
        Self(Arc::new(Mutex::new(start)))
    }

    /// Moves the watermark to `run` if that is forward.
    pub fn advance(&self, run: &RunId) -> bool {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .advance(run)
    }

    pub fn get(&self) -> Checkpoint {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// How a slot finished.
#[derive(Debug)]
pub enum SlotStatus {
    Committed,
    NotReady,
    Absent,
    Failed(IngestError),
    /// Shutdown was requested before the slot finished.
    Cancelled,
}

#[derive(Debug)]
pub struct SlotOutcome {
    pub run: RunId,
    pub status: SlotStatus,
}

/// The unit of work for one enumerated run.
pub struct Slot {
    job: String,
    run: RunId,
    predecessor: Gate,
    closer: GateCloser,
    token: OwnedSemaphorePermit,
}

impl Slot {
    /// Builds a slot that commits after `predecessor` is closed and closes
    /// the gate behind `closer` when done. `token` is a fetch token, held
    /// until the fetch is over.
    pub fn new(
        job: impl Into<String>,
        run: RunId,
        predecessor: Gate,
        closer: GateCloser,
        token: OwnedSemaphorePermit,
    ) -> Self {
        Self {
            job: job.into(),
            run,
            predecessor,
            closer,
            token,
        }
    }

    /// Fetches, waits for the predecessor, commits, then advances `watermark`.
    ///
    /// The predecessor is awaited on every path that is not a cancellation,
    /// so a slot never completes before the one ahead of it. Cancelled slots
    /// leave the watermark untouched.
    pub async fn run(
        self,
        fetch: FetchStage,
        commit: CommitStage,
        watermark: Watermark,
        cancel: CancellationToken,
    ) -> SlotOutcome {
        let Slot {
            job,
            run,
            predecessor,
            closer: _closer,
            token,
        } = self;

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return SlotOutcome::cancelled(run.clone()),
            outcome = fetch.fetch(&job, &run, token) => outcome,
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return SlotOutcome::cancelled(run.clone()),
            _ = predecessor.wait() => {}
        }

        let status = match fetched {
            FetchOutcome::Ready(record) => {
                let committed = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return SlotOutcome::cancelled(run.clone()),
                    result = commit.commit(&record) => result,
                };
                match committed {
                    Ok(()) => SlotStatus::Committed,
                    Err(e) => {
                        warn!(job = %job, run = %run, error = %e, "commit failed");
                        SlotStatus::Failed(e)
                    }
                }
            }
            FetchOutcome::NotReady => SlotStatus::NotReady,
            FetchOutcome::Absent => SlotStatus::Absent,
            FetchOutcome::Failed(e) => SlotStatus::Failed(e),
        };

        watermark.advance(&run);
        debug!(job = %job, run = %run, "slot complete");
        SlotOutcome { run, status }
    }
}

impl SlotOutcome {
    fn cancelled(run: RunId) -> Self {
        Self {
            run,
            status: SlotStatus::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockArtifactStore, MockRun, MockSink, MockUploader};
    use std::time::Duration;
    use tokio::task::JoinSet;

    struct Harness {
        store: Arc<MockArtifactStore>,
        sink: Arc<MockSink>,
        uploader: Arc<MockUploader>,
        fetch: FetchStage,
        commit: CommitStage,
        watermark: Watermark,
        cancel: CancellationToken,
    }

    fn harness(tokens: usize) -> Harness {
        let store = Arc::new(MockArtifactStore::new());
        let sink = Arc::new(MockSink::new());
        let uploader = Arc::new(MockUploader::new());
        Harness {
            fetch: FetchStage::new(store.clone(), tokens),
            commit: CommitStage::new(sink.clone(), uploader.clone()),
            store,
            sink,
            uploader,
            watermark: Watermark::default(),
            cancel: CancellationToken::new(),
        }
    }

    async fn spawn_chain(h: &Harness, runs: &[&str]) -> JoinSet<SlotOutcome> {
        let mut slots = JoinSet::new();
        let mut predecessor = Gate::closed();
        for run in runs {
            let token = h.fetch.acquire(&h.cancel).await.unwrap();
            let (gate, closer) = Gate::new();
            let previous = std::mem::replace(&mut predecessor, gate);
            let slot = Slot::new("e2e", RunId::from(*run), previous, closer, token);
            slots.spawn(slot.run(
                h.fetch.clone(),
                h.commit.clone(),
                h.watermark.clone(),
                h.cancel.clone(),
            ));
        }
        slots
    }

    #[test]
    fn test_watermark_only_moves_forward() {
        let watermark = Watermark::new(Checkpoint::After(RunId::from("5")));
        assert!(!watermark.advance(&RunId::from("3")));
        assert!(watermark.advance(&RunId::from("9")));
        assert!(!watermark.advance(&RunId::from("7")));
        assert_eq!(watermark.get(), Checkpoint::After(RunId::from("9")));
    }

    #[tokio::test]
    async fn test_later_fetch_commits_after_earlier_run() {
        let h = harness(4);
        h.store
            .add_run("e2e", "1", MockRun::ready().with_latency(Duration::from_millis(80)))
            .await;
        h.store.add_run("e2e", "2", MockRun::ready()).await;

        let mut slots = spawn_chain(&h, &["1", "2"]).await;
        while slots.join_next().await.is_some() {}

        assert_eq!(
            h.sink.committed_runs("e2e").await,
            vec![RunId::from("1"), RunId::from("2")]
        );
        assert_eq!(h.uploader.uploaded_runs("e2e").await.len(), 2);
        assert_eq!(h.watermark.get(), Checkpoint::After(RunId::from("2")));
    }

    #[tokio::test]
    async fn test_skipped_runs_release_successors() {
        let h = harness(4);
        h.store.add_run("e2e", "6", MockRun::ready()).await;
        h.store.add_run("e2e", "7", MockRun::not_ready()).await;
        h.store.add_run("e2e", "8", MockRun::absent()).await;
        h.store.add_run("e2e", "9", MockRun::ready()).await;

        let mut slots = spawn_chain(&h, &["6", "7", "8", "9"]).await;
        let done = tokio::time::timeout(Duration::from_secs(2), async {
            let mut outcomes = Vec::new();
            while let Some(outcome) = slots.join_next().await {
                outcomes.push(outcome.unwrap());
            }
            outcomes
        })
        .await
        .expect("chain must not deadlock");

        assert_eq!(done.len(), 4);
        assert_eq!(
            h.sink.committed_runs("e2e").await,
            vec![RunId::from("6"), RunId::from("9")]
        );
        assert_eq!(h.watermark.get(), Checkpoint::After(RunId::from("9")));
    }

    #[tokio::test]
    async fn test_failed_commit_is_reported_and_chain_continues() {
        let h = harness(2);
        h.store.add_run("e2e", "1", MockRun::ready()).await;
        h.store.add_run("e2e", "2", MockRun::ready()).await;
        h.sink.fail_run("e2e", "1").await;

        let mut slots = spawn_chain(&h, &["1", "2"]).await;
        let mut failures = Vec::new();
        while let Some(outcome) = slots.join_next().await {
            if let SlotStatus::Failed(e) = outcome.unwrap().status {
                failures.push(e);
            }
        }

        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0], IngestError::Commit { .. }));
        assert_eq!(h.sink.committed_runs("e2e").await, vec![RunId::from("2")]);
        assert_eq!(h.uploader.uploaded_runs("e2e").await, vec![RunId::from("2")]);
    }

    #[tokio::test]
    async fn test_upload_failure_keeps_record() {
        let h = harness(1);
        h.store.add_run("e2e", "3", MockRun::ready()).await;
        h.uploader.fail_with("table missing").await;

        let mut slots = spawn_chain(&h, &["3"]).await;
        let outcome = slots.join_next().await.unwrap().unwrap();

        assert!(matches!(
            outcome.status,
            SlotStatus::Failed(IngestError::Upload { .. })
        ));
        assert_eq!(h.sink.committed_runs("e2e").await, vec![RunId::from("3")]);
    }

    #[tokio::test]
    async fn test_cancelled_slot_leaves_watermark() {
        let h = harness(1);
        h.store
            .add_run("e2e", "1", MockRun::ready().with_latency(Duration::from_secs(30)))
            .await;

        let mut slots = spawn_chain(&h, &["1"]).await;
        h.cancel.cancel();
        let outcome = tokio::time::timeout(Duration::from_secs(1), slots.join_next())
            .await
            .expect("cancelled slot returns promptly")
            .unwrap()
            .unwrap();

        assert!(matches!(outcome.status, SlotStatus::Cancelled));
        assert_eq!(h.watermark.get(), Checkpoint::Origin);
        assert!(h.sink.committed_runs("e2e").await.is_empty());
    }
}
