//! End-to-end load from a run directory tree into SQLite.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use runloader_core::{
    create_uploader, ConfigJobSource, FsArtifactStore, Job, LoadCategory, Loader, LoaderConfig,
    RunId, Sink, SqliteSink, StoreConfig,
};

fn write_run(root: &Path, job: &str, run: &str, prowjob: &str) {
    let dir = root.join("logs").join(job).join(run);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("prowjob.json"), prowjob).unwrap();
    std::fs::write(
        dir.join("junit.json"),
        r#"[{"name": "install", "status": "passed", "duration_secs": 900.0},
            {"name": "conformance", "status": "failed", "duration_secs": 2400.0}]"#,
    )
    .unwrap();
}

fn finished(job: &str) -> String {
    format!(
        r#"{{"spec": {{"job": "{}"}}, "status": {{"state": "success", "startTime": "2024-03-01T10:00:00Z", "completionTime": "2024-03-01T11:30:00Z"}}}}"#,
        job
    )
}

const PENDING: &str =
    r#"{"status": {"state": "pending", "startTime": "2024-03-01T10:00:00Z"}}"#;

struct Setup {
    store_dir: TempDir,
    sink: Arc<SqliteSink>,
}

impl Setup {
    fn new() -> Self {
        Self {
            store_dir: TempDir::new().expect("Failed to create store dir"),
            sink: Arc::new(SqliteSink::in_memory().expect("Failed to create sink")),
        }
    }

    fn loader(&self, jobs: Vec<Job>) -> Loader {
        let store = FsArtifactStore::new(
            StoreConfig::new(self.store_dir.path()).with_min_run_age(Duration::ZERO),
        );
        Loader::new(
            LoaderConfig::default().with_concurrency(2, 3),
            Arc::new(ConfigJobSource::new(jobs)),
            Arc::new(store),
            self.sink.clone(),
            create_uploader(LoadCategory::TestRuns, Arc::clone(&self.sink)),
        )
    }
}

#[tokio::test]
async fn test_load_and_resume() {
    let setup = Setup::new();
    let root = setup.store_dir.path();
    let job = "release-amd64";
    write_run(root, job, "6", &finished(job));
    write_run(root, job, "7", PENDING);
    write_run(root, job, "8", &finished(job));
    std::fs::create_dir_all(root.join("logs").join(job).join("9")).unwrap();

    let jobs = vec![Job::new(job).with_test_runs()];
    let report = setup
        .loader(jobs.clone())
        .run(&CancellationToken::new())
        .await
        .into_result()
        .expect("clean pass");

    assert_eq!(
        setup.sink.runs_for(job).unwrap(),
        vec![RunId::from("6"), RunId::from("8")]
    );
    assert_eq!(setup.sink.test_case_count(job).unwrap(), 4);
    assert_eq!(report.runs_committed(), 2);
    assert_eq!(
        setup.sink.latest_run_for(job).await.unwrap(),
        Some(RunId::from("8"))
    );

    // Run 7 finishes later, but the checkpoint is already past it.
    write_run(root, job, "7", &finished(job));
    write_run(root, job, "10", &finished(job));
    setup
        .loader(jobs)
        .run(&CancellationToken::new())
        .await
        .into_result()
        .expect("clean pass");

    assert_eq!(
        setup.sink.runs_for(job).unwrap(),
        vec![RunId::from("6"), RunId::from("8"), RunId::from("10")]
    );
}

#[tokio::test]
async fn test_invalid_artifact_is_reported() {
    let setup = Setup::new();
    let root = setup.store_dir.path();
    write_run(root, "e2e", "1", &finished("e2e"));
    write_run(root, "e2e", "2", "{truncated");
    write_run(root, "e2e", "3", &finished("e2e"));

    let err = setup
        .loader(vec![Job::new("e2e").with_test_runs()])
        .run(&CancellationToken::new())
        .await
        .into_result()
        .unwrap_err();

    assert_eq!(err.len(), 1);
    assert!(err.to_string().contains("jobrun/e2e/2: failed to fetch"));
    assert_eq!(
        setup.sink.runs_for("e2e").unwrap(),
        vec![RunId::from("1"), RunId::from("3")]
    );
}
