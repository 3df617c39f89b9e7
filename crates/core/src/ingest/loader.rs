//! Load pass over every tracked job.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::metrics;
use crate::sink::{Sink, Uploader};
use crate::store::{ArtifactStore, JobSource};

use super::config::LoaderConfig;
use super::error::IngestError;
use super::job::JobPipeline;
use super::pool::WorkerPool;
use super::report::LoadReport;
use super::types::Job;

/// Loads new runs of every job that opted into the configured category.
pub struct Loader {
    config: LoaderConfig,
    jobs: Arc<dyn JobSource>,
    pipeline: JobPipeline,
}

impl Loader {
    pub fn new(
        config: LoaderConfig,
        jobs: Arc<dyn JobSource>,
        store: Arc<dyn ArtifactStore>,
        sink: Arc<dyn Sink>,
        uploader: Arc<dyn Uploader>,
    ) -> Self {
        let pipeline = JobPipeline::new(store, sink, uploader, config.max_concurrent_fetches);
        Self {
            config,
            jobs,
            pipeline,
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Runs one pass. Failures are collected in the report, never raised.
    ///
    /// Use [`LoadReport::into_result`] to turn a pass with failures into an
    /// [`AggregateError`](super::AggregateError).
    pub async fn run(&self, cancel: &CancellationToken) -> LoadReport {
        let started = Instant::now();
        let category = self.config.category;
        let mut report = LoadReport::new(category);

        let jobs = match self.jobs.list_jobs().await {
            Ok(jobs) => jobs,
            Err(e) => {
                error!(error = %e, "failed to get jobs");
                report.push_error(IngestError::ListJobs(e));
                return finish(report, started);
            }
        };

        let (wanted, skipped): (Vec<Job>, Vec<Job>) =
            jobs.into_iter().partition(|job| category.wants(job));
        for job in &skipped {
            debug!(job = %job.name, %category, "skipping job, not collected for category");
            metrics::JOBS_SKIPPED.inc();
        }
        report.skipped_jobs = skipped.into_iter().map(|job| job.name).collect();

        let pool = WorkerPool::new(self.config.max_concurrent_jobs);
        info!(
            %category,
            jobs = wanted.len(),
            workers = pool.workers(),
            fetches = self.config.max_concurrent_fetches,
            store = self.pipeline.store().name(),
            sink = self.pipeline.sink().name(),
            "starting upload"
        );

        let pipeline = self.pipeline.clone();
        let job_cancel = cancel.clone();
        let outcome = pool
            .run(wanted, cancel, move |_, job| {
                let pipeline = pipeline.clone();
                let cancel = job_cancel.clone();
                async move { pipeline.run(&job.name, &cancel).await }
            })
            .await;

        report.jobs = outcome.results;
        for (job, message) in outcome.failures {
            report.push_error(IngestError::TaskFailed { job, message });
        }
        if !outcome.abandoned.is_empty() {
            report.abandoned_jobs = outcome.abandoned;
            report.push_error(IngestError::Cancelled {
                job: None,
                run: None,
            });
        }

        finish(report, started)
    }
}

fn finish(mut report: LoadReport, started: Instant) -> LoadReport {
    report.duration = started.elapsed();
    info!(
        category = %report.category,
        jobs = report.jobs.len(),
        runs = report.runs_processed(),
        committed = report.runs_committed(),
        duration_ms = report.duration.as_millis() as u64,
        errors = report.error_count(),
        "completed upload"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{LoadCategory, RunId};
    use crate::testing::{MockArtifactStore, MockJobSource, MockRun, MockSink, MockUploader};

    struct Fixture {
        jobs: Arc<MockJobSource>,
        store: Arc<MockArtifactStore>,
        sink: Arc<MockSink>,
        uploader: Arc<MockUploader>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                jobs: Arc::new(MockJobSource::new()),
                store: Arc::new(MockArtifactStore::new()),
                sink: Arc::new(MockSink::new()),
                uploader: Arc::new(MockUploader::new()),
            }
        }

        fn loader(&self, config: LoaderConfig) -> Loader {
            Loader::new(
                config,
                self.jobs.clone(),
                self.store.clone(),
                self.sink.clone(),
                self.uploader.clone(),
            )
        }
    }

    #[tokio::test]
    async fn test_only_jobs_in_category_are_loaded() {
        let f = Fixture::new();
        f.jobs.add(Job::new("tests").with_test_runs()).await;
        f.jobs.add(Job::new("disruption").with_disruption()).await;
        f.store.add_run("tests", "1", MockRun::ready()).await;
        f.store.add_run("disruption", "1", MockRun::ready()).await;

        let report = f
            .loader(LoaderConfig::default().with_category(LoadCategory::TestRuns))
            .run(&CancellationToken::new())
            .await;

        assert_eq!(report.jobs.len(), 1);
        assert_eq!(report.skipped_jobs, vec!["disruption".to_string()]);
        assert_eq!(f.sink.committed_runs("tests").await, vec![RunId::from("1")]);
        assert!(f.sink.committed_runs("disruption").await.is_empty());
    }

    #[tokio::test]
    async fn test_job_listing_failure() {
        let f = Fixture::new();
        f.jobs.fail_with("config unreadable").await;

        let report = f
            .loader(LoaderConfig::default())
            .run(&CancellationToken::new())
            .await;

        assert!(report.jobs.is_empty());
        let err = report.into_result().unwrap_err();
        assert_eq!(err.len(), 1);
        assert!(matches!(err.errors[0], IngestError::ListJobs(_)));
    }

    #[tokio::test]
    async fn test_one_failing_job_does_not_stop_others() {
        let f = Fixture::new();
        for name in ["a", "b", "c"] {
            f.jobs.add(Job::new(name).with_test_runs()).await;
            f.store.add_run(name, "1", MockRun::ready()).await;
        }
        f.store.fail_listing("b", "access denied").await;

        let report = f
            .loader(LoaderConfig::default().with_concurrency(1, 2))
            .run(&CancellationToken::new())
            .await;

        assert_eq!(report.jobs.len(), 3);
        assert_eq!(report.runs_committed(), 2);
        let err = report.into_result().unwrap_err();
        assert_eq!(err.len(), 1);
        assert!(err.to_string().contains("job/b: failed to enumerate runs"));
    }

    #[tokio::test]
    async fn test_cancelled_pass_reports_abandoned_jobs() {
        let f = Fixture::new();
        for name in ["a", "b"] {
            f.jobs.add(Job::new(name).with_test_runs()).await;
        }
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = f.loader(LoaderConfig::default()).run(&cancel).await;

        assert_eq!(report.abandoned_jobs.len(), 2);
        let err = report.into_result().unwrap_err();
        assert!(err.was_cancelled());
    }
}
