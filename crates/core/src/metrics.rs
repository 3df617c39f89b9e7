//! Prometheus metrics for the loader.
//!
//! This module provides metrics for:
//! - Jobs (passes, duration)
//! - Runs (committed, skipped, failed)
//! - Fetch stage (in-flight reads)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Job Metrics
// =============================================================================

/// Job duration in seconds.
pub static JOB_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("runloader_job_duration_seconds", "Duration of one job's load")
            .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 3600.0]),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Jobs skipped because they did not opt into the loaded category.
pub static JOBS_SKIPPED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "runloader_jobs_skipped_total",
        "Jobs not collected for the current category",
    )
    .unwrap()
});

// =============================================================================
// Run Metrics
// =============================================================================

/// Runs committed to the sink.
pub static RUNS_COMMITTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("runloader_runs_committed_total", "Total runs committed").unwrap()
});

/// Runs passed over without a commit.
pub static RUNS_SKIPPED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("runloader_runs_skipped_total", "Runs skipped without commit"),
        &["reason"], // "not_ready", "absent"
    )
    .unwrap()
});

/// Failures by pipeline stage.
pub static RUN_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("runloader_failures_total", "Failures by pipeline stage"),
        &["stage"],
    )
    .unwrap()
});

// =============================================================================
// Fetch Metrics
// =============================================================================

/// Artifact reads currently holding a fetch token.
pub static FETCHES_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "runloader_fetches_in_flight",
        "Artifact reads currently in progress",
    )
    .unwrap()
});

/// Get all loader metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Jobs
        Box::new(JOB_DURATION.clone()),
        Box::new(JOBS_SKIPPED.clone()),
        // Runs
        Box::new(RUNS_COMMITTED.clone()),
        Box::new(RUNS_SKIPPED.clone()),
        Box::new(RUN_FAILURES.clone()),
        // Fetch
        Box::new(FETCHES_IN_FLIGHT.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_register() {
        let registry = prometheus::Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }
        RUNS_SKIPPED.with_label_values(&["absent"]).inc();
        let names: Vec<_> = registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"runloader_runs_skipped_total".to_string()));
    }
}
