use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::ingest::RunId;

use super::{CommitRecord, Sink, SinkError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS job_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_name TEXT NOT NULL,
    run_id TEXT NOT NULL,
    state TEXT NOT NULL,
    start_time TEXT NOT NULL,
    end_time TEXT NOT NULL,
    duration_secs INTEGER NOT NULL,
    cluster TEXT,
    release_tag TEXT,
    url TEXT,
    inserted_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_job_runs_job_run ON job_runs(job_name, run_id);

CREATE TABLE IF NOT EXISTS test_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_name TEXT NOT NULL,
    run_id TEXT NOT NULL,
    test_name TEXT NOT NULL,
    status TEXT NOT NULL,
    duration_secs REAL NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_test_runs_job_run ON test_runs(job_name, run_id);

CREATE TABLE IF NOT EXISTS backend_disruption (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_name TEXT NOT NULL,
    run_id TEXT NOT NULL,
    backend TEXT NOT NULL,
    disruption_secs INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_backend_disruption_job_run ON backend_disruption(job_name, run_id);
"#;

/// Greatest run of a job under `RunId` ordering: textual ids after numeric
/// ones, numeric ids by value ignoring leading zeros, then by width.
const LATEST_RUN: &str = r#"
SELECT run_id FROM job_runs
WHERE job_name = ?1
ORDER BY
    CASE WHEN run_id <> '' AND run_id NOT GLOB '*[^0-9]*' THEN 0 ELSE 1 END DESC,
    CASE WHEN run_id <> '' AND run_id NOT GLOB '*[^0-9]*' THEN length(ltrim(run_id, '0')) END DESC,
    CASE WHEN run_id <> '' AND run_id NOT GLOB '*[^0-9]*' THEN ltrim(run_id, '0') END DESC,
    CASE WHEN run_id <> '' AND run_id NOT GLOB '*[^0-9]*' THEN length(run_id) END DESC,
    run_id DESC
LIMIT 1
"#;

/// SQLite-backed sink
///
/// No uniqueness constraint is enforced on `(job_name, run_id)`: writes are
/// at-least-once and duplicates are expected after an interrupted pass.
pub struct SqliteSink {
    conn: Mutex<Connection>,
}

impl SqliteSink {
    /// Open (or create) the database file and its tables
    pub fn new(path: &Path) -> Result<Self, SinkError> {
        Self::with_connection(Connection::open(path)?)
    }

    /// Create an in-memory sink (useful for testing)
    pub fn in_memory() -> Result<Self, SinkError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, SinkError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SinkError> {
        self.conn
            .lock()
            .map_err(|_| SinkError::Database("connection lock poisoned".to_string()))
    }

    /// Run ids recorded for a job, in insertion order
    pub fn runs_for(&self, job: &str) -> Result<Vec<RunId>, SinkError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT run_id FROM job_runs WHERE job_name = ? ORDER BY id")?;
        let runs = stmt
            .query_map(params![job], |row| row.get::<_, String>(0))?
            .map(|r| r.map(RunId::from))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    /// Insert one row per test case of the record
    pub fn insert_test_cases(&self, record: &CommitRecord) -> Result<usize, SinkError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO test_runs (job_name, run_id, test_name, status, duration_secs) VALUES (?, ?, ?, ?, ?)",
            )?;
            for case in &record.test_cases {
                stmt.execute(params![
                    record.job_name,
                    record.run_id.as_str(),
                    case.name,
                    case.status.as_str(),
                    case.duration_secs,
                ])?;
            }
        }
        tx.commit()?;
        Ok(record.test_cases.len())
    }

    /// Insert one row per disruption sample of the record
    pub fn insert_disruption(&self, record: &CommitRecord) -> Result<usize, SinkError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO backend_disruption (job_name, run_id, backend, disruption_secs) VALUES (?, ?, ?, ?)",
            )?;
            for sample in &record.disruption {
                let secs = i64::try_from(sample.disruption_secs)
                    .map_err(|e| SinkError::Serialization(e.to_string()))?;
                stmt.execute(params![
                    record.job_name,
                    record.run_id.as_str(),
                    sample.backend,
                    secs,
                ])?;
            }
        }
        tx.commit()?;
        Ok(record.disruption.len())
    }

    /// Number of rows in a content table for a job
    fn count_rows(&self, table: &str, job: &str) -> Result<usize, SinkError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE job_name = ?", table),
            params![job],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn test_case_count(&self, job: &str) -> Result<usize, SinkError> {
        self.count_rows("test_runs", job)
    }

    pub fn disruption_count(&self, job: &str) -> Result<usize, SinkError> {
        self.count_rows("backend_disruption", job)
    }
}

#[async_trait]
impl Sink for SqliteSink {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn put(&self, record: &CommitRecord) -> Result<(), SinkError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO job_runs (job_name, run_id, state, start_time, end_time, duration_secs, cluster, release_tag, url, inserted_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                record.job_name,
                record.run_id.as_str(),
                record.state.as_str(),
                record.start_time.to_rfc3339(),
                record.end_time.to_rfc3339(),
                record.duration_secs,
                record.cluster,
                record.release_tag,
                record.url,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn latest_run_for(&self, job: &str) -> Result<Option<RunId>, SinkError> {
        let conn = self.lock()?;
        let latest = conn
            .query_row(LATEST_RUN, params![job], |row| row.get::<_, String>(0))
            .optional()?;
        Ok(latest.map(RunId::from))
    }
}
