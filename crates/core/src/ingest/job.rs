//! Per-job pipeline: checkpoint, enumerate, fetch, ordered commit.

use std::sync::Arc;
use std::time::Instant;

use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::metrics;
use crate::sink::{Sink, Uploader};
use crate::store::ArtifactStore;

use super::commit::{CommitStage, Slot, SlotOutcome, Watermark};
use super::enumerate::{load_checkpoint, RunEnumerator};
use super::error::IngestError;
use super::fetch::FetchStage;
use super::gate::Gate;
use super::report::JobReport;

/// Loads the new runs of one job at a time.
#[derive(Clone)]
pub struct JobPipeline {
    store: Arc<dyn ArtifactStore>,
    sink: Arc<dyn Sink>,
    uploader: Arc<dyn Uploader>,
    max_concurrent_fetches: usize,
}

impl JobPipeline {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        sink: Arc<dyn Sink>,
        uploader: Arc<dyn Uploader>,
        max_concurrent_fetches: usize,
    ) -> Self {
        Self {
            store,
            sink,
            uploader,
            max_concurrent_fetches,
        }
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    pub fn sink(&self) -> &Arc<dyn Sink> {
        &self.sink
    }

    /// Loads every run of `job` after its checkpoint.
    ///
    /// Never fails as a whole: every failure ends up in the report. Returns
    /// once every slot that was started has finished.
    pub async fn run(&self, job: &str, cancel: &CancellationToken) -> JobReport {
        let started = Instant::now();
        let mut report = JobReport::new(job);

        let lookup = tokio::select! {
            biased;
            _ = cancel.cancelled() => return cancelled(report, job, started),
            lookup = load_checkpoint(self.sink.as_ref(), job) => lookup,
        };
        let checkpoint = match lookup {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                warn!(job, error = %e, "unable to determine checkpoint");
                report.push_error(e);
                return finish(report, started);
            }
        };
        info!(job, %checkpoint, "loading job");

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                report.watermark = checkpoint.clone();
                return cancelled(report, job, started);
            }
            opened = RunEnumerator::open(self.store.as_ref(), job, &checkpoint) => opened,
        };
        let mut runs = match opened {
            Ok(runs) => runs,
            Err(e) => {
                warn!(job, error = %e, "unable to list runs");
                report.push_error(e);
                report.watermark = checkpoint;
                return finish(report, started);
            }
        };

        let watermark = Watermark::new(checkpoint);
        let fetch = FetchStage::new(Arc::clone(&self.store), self.max_concurrent_fetches);
        let commit = CommitStage::new(Arc::clone(&self.sink), Arc::clone(&self.uploader));

        let mut slots = JoinSet::new();
        let mut predecessor = Gate::closed();
        let mut interrupted = false;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    interrupted = true;
                    break;
                }
                next = runs.next() => next,
            };
            let run = match next {
                None => break,
                Some(Ok(run)) => run,
                Some(Err(e)) => {
                    warn!(job, error = %e, "run enumeration stopped");
                    report.push_error(e);
                    break;
                }
            };

            let Some(token) = fetch.acquire(cancel).await else {
                interrupted = true;
                break;
            };

            let (gate, closer) = Gate::new();
            let previous = std::mem::replace(&mut predecessor, gate);
            let slot = Slot::new(job, run, previous, closer, token);
            report.enumerated += 1;
            slots.spawn(slot.run(
                fetch.clone(),
                commit.clone(),
                watermark.clone(),
                cancel.clone(),
            ));

            while let Some(done) = slots.try_join_next() {
                reap(&mut report, done);
            }
        }

        while let Some(done) = slots.join_next().await {
            reap(&mut report, done);
        }

        if interrupted && report.cancelled == 0 {
            report.push_error(IngestError::cancelled(job, None));
        }
        report.watermark = watermark.get();
        finish(report, started)
    }
}

fn reap(report: &mut JobReport, done: Result<SlotOutcome, JoinError>) {
    match done {
        Ok(outcome) => report.record(outcome),
        Err(e) => {
            report.failed += 1;
            let error = IngestError::TaskFailed {
                job: report.job.clone(),
                message: e.to_string(),
            };
            report.push_error(error);
        }
    }
}

fn cancelled(mut report: JobReport, job: &str, started: Instant) -> JobReport {
    info!(job, "job interrupted before enumerating runs");
    report.push_error(IngestError::cancelled(job, None));
    finish(report, started)
}

fn finish(mut report: JobReport, started: Instant) -> JobReport {
    report.duration = started.elapsed();
    let result = if report.is_success() { "success" } else { "failed" };
    metrics::JOB_DURATION
        .with_label_values(&[result])
        .observe(report.duration.as_secs_f64());

    info!(
        job = %report.job,
        committed = report.committed,
        not_ready = report.not_ready,
        absent = report.absent,
        failed = report.failed,
        watermark = %report.watermark,
        duration_ms = report.duration.as_millis() as u64,
        "job complete"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{Checkpoint, RunId};
    use crate::testing::{MockArtifactStore, MockRun, MockSink, MockUploader};
    use std::time::Duration;

    fn pipeline(store: &Arc<MockArtifactStore>, sink: &Arc<MockSink>, n: usize) -> JobPipeline {
        JobPipeline::new(
            store.clone(),
            sink.clone(),
            Arc::new(MockUploader::new()),
            n,
        )
    }

    #[tokio::test]
    async fn test_release_scenario() {
        let store = Arc::new(MockArtifactStore::new());
        let sink = Arc::new(MockSink::new());
        sink.set_latest("release-amd64", "5").await;
        store.add_run("release-amd64", "5", MockRun::ready()).await;
        store.add_run("release-amd64", "6", MockRun::ready()).await;
        store.add_run("release-amd64", "7", MockRun::not_ready()).await;
        store.add_run("release-amd64", "8", MockRun::ready()).await;

        let pipeline = pipeline(&store, &sink, 3);
        assert_eq!(pipeline.store().name(), "mock");
        assert_eq!(pipeline.sink().name(), "mock");
        let report = pipeline
            .run("release-amd64", &CancellationToken::new())
            .await;

        assert_eq!(
            sink.committed_runs("release-amd64").await,
            vec![RunId::from("6"), RunId::from("8")]
        );
        assert_eq!(report.committed, 2);
        assert_eq!(report.not_ready, 1);
        assert_eq!(report.watermark, Checkpoint::After(RunId::from("8")));
        assert!(report.is_success());
    }

    #[tokio::test]
    async fn test_checkpoint_failure_skips_job() {
        let store = Arc::new(MockArtifactStore::new());
        let sink = Arc::new(MockSink::new());
        store.add_run("e2e", "1", MockRun::ready()).await;
        sink.set_latest_error("timeout").await;

        let report = pipeline(&store, &sink, 2)
            .run("e2e", &CancellationToken::new())
            .await;

        assert_eq!(report.errors.len(), 1);
        assert!(matches!(report.errors[0], IngestError::Checkpoint { .. }));
        assert_eq!(store.reads().await, 0);
    }

    #[tokio::test]
    async fn test_enumeration_failure_keeps_started_runs() {
        let store = Arc::new(MockArtifactStore::new());
        let sink = Arc::new(MockSink::new());
        for run in ["1", "2", "3"] {
            store.add_run("e2e", run, MockRun::ready()).await;
        }
        store.fail_listing_after("e2e", 2, "connection reset").await;

        let report = pipeline(&store, &sink, 2)
            .run("e2e", &CancellationToken::new())
            .await;

        assert_eq!(
            sink.committed_runs("e2e").await,
            vec![RunId::from("1"), RunId::from("2")]
        );
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(report.errors[0], IngestError::Enumerate { .. }));
        assert_eq!(report.watermark, Checkpoint::After(RunId::from("2")));
    }

    #[tokio::test]
    async fn test_fetches_bounded_per_job() {
        let store = Arc::new(MockArtifactStore::new());
        let sink = Arc::new(MockSink::new());
        for i in 1..=12 {
            let run = MockRun::ready().with_latency(Duration::from_millis(20));
            store.add_run("e2e", &i.to_string(), run).await;
        }

        let report = pipeline(&store, &sink, 3)
            .run("e2e", &CancellationToken::new())
            .await;

        assert_eq!(report.committed, 12);
        assert!(store.peak_concurrency() <= 3);
        assert!(store.peak_concurrency() >= 1);
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let store = Arc::new(MockArtifactStore::new());
        let sink = Arc::new(MockSink::new());
        store.add_run("e2e", "1", MockRun::ready()).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = pipeline(&store, &sink, 2).run("e2e", &cancel).await;

        assert!(sink.committed_runs("e2e").await.is_empty());
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].is_cancelled());
        assert_eq!(report.watermark, Checkpoint::Origin);
    }

    #[tokio::test]
    async fn test_cancel_during_slow_checkpoint_lookup() {
        let store = Arc::new(MockArtifactStore::new());
        let sink = Arc::new(MockSink::new());
        store.add_run("e2e", "1", MockRun::ready()).await;
        sink.set_lookup_latency(Duration::from_secs(30)).await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let report = tokio::time::timeout(
            Duration::from_secs(3),
            pipeline(&store, &sink, 2).run("e2e", &cancel),
        )
        .await
        .expect("pipeline returns promptly once cancelled");

        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].is_cancelled());
        assert_eq!(store.reads().await, 0);
        assert_eq!(report.watermark, Checkpoint::Origin);
    }

    #[tokio::test]
    async fn test_cancel_during_slow_listing() {
        let store = Arc::new(MockArtifactStore::new());
        let sink = Arc::new(MockSink::new());
        sink.set_latest("e2e", "4").await;
        store.add_run("e2e", "5", MockRun::ready()).await;
        store.set_listing_latency(Duration::from_secs(30)).await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let report = tokio::time::timeout(
            Duration::from_secs(3),
            pipeline(&store, &sink, 2).run("e2e", &cancel),
        )
        .await
        .expect("pipeline returns promptly once cancelled");

        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].is_cancelled());
        assert!(sink.committed_runs("e2e").await.is_empty());
        assert_eq!(report.watermark, Checkpoint::After(RunId::from("4")));
    }
}
