//! Fixed-size worker pool over a closed job queue.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::types::Job;

/// What the pool produced.
#[derive(Debug)]
pub struct PoolOutcome<T> {
    /// One entry per job that ran to completion, in completion order.
    pub results: Vec<T>,
    /// Jobs whose task panicked, with the panic message. A worker that
    /// died outside of any job is listed as `worker`.
    pub failures: Vec<(String, String)>,
    /// Jobs still queued when cancellation stopped the workers.
    pub abandoned: Vec<String>,
}

/// Runs jobs on a fixed number of workers.
///
/// The queue is filled up front and never grows. Each worker takes one job
/// at a time until the queue is empty; a job that panics is recorded and the
/// worker moves on. Cancellation stops workers from taking new jobs.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Processes every job with `work`, returning once all workers are done.
    ///
    /// `work` receives the worker index and the job.
    pub async fn run<F, Fut, T>(
        &self,
        jobs: Vec<Job>,
        cancel: &CancellationToken,
        work: F,
    ) -> PoolOutcome<T>
    where
        F: Fn(usize, Job) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let total = jobs.len();
        let queue = Arc::new(Mutex::new(VecDeque::from(jobs)));
        let results = Arc::new(Mutex::new(Vec::with_capacity(total)));
        let failures = Arc::new(Mutex::new(Vec::new()));
        let work = Arc::new(work);
        let mut workers = JoinSet::new();

        for idx in 0..self.workers.min(total) {
            let queue = Arc::clone(&queue);
            let results = Arc::clone(&results);
            let failures = Arc::clone(&failures);
            let work = Arc::clone(&work);
            let cancel = cancel.clone();

            workers.spawn(async move {
                while !cancel.is_cancelled() {
                    let next = {
                        let mut queue = queue.lock().unwrap_or_else(PoisonError::into_inner);
                        queue.pop_front().map(|job| (job, queue.len()))
                    };
                    let Some((job, remaining)) = next else {
                        break;
                    };

                    info!(
                        worker = idx,
                        job = %job.name,
                        remaining = %format!("{}/{}", remaining, total),
                        "pulled job from queue"
                    );
                    let name = job.name.clone();
                    let work = Arc::clone(&work);
                    match tokio::spawn(async move { (*work)(idx, job).await }).await {
                        Ok(result) => {
                            lock(&results).push(result);
                        }
                        Err(e) => {
                            warn!(worker = idx, job = %name, error = %e, "job task failed");
                            lock(&failures).push((name, e.to_string()));
                        }
                    }
                }

                info!(worker = idx, "worker complete");
            });
        }

        while let Some(done) = workers.join_next().await {
            if let Err(e) = done {
                warn!(error = %e, "worker task failed");
                lock(&failures).push(("worker".to_string(), e.to_string()));
            }
        }

        let mut outcome = PoolOutcome {
            results: std::mem::take(&mut *lock(&results)),
            failures: std::mem::take(&mut *lock(&failures)),
            abandoned: Vec::new(),
        };
        outcome.abandoned = queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .map(|job| job.name)
            .collect();
        outcome
    }
}

fn lock<T>(items: &Mutex<Vec<T>>) -> MutexGuard<'_, Vec<T>> {
    items.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn jobs(n: usize) -> Vec<Job> {
        (0..n).map(|i| Job::new(format!("job-{}", i))).collect()
    }

    #[tokio::test]
    async fn test_every_job_runs_once() {
        let outcome = WorkerPool::new(3)
            .run(jobs(10), &CancellationToken::new(), |_, job| async move {
                job.name
            })
            .await;

        let mut names = outcome.results;
        names.sort();
        let mut expected: Vec<_> = jobs(10).into_iter().map(|j| j.name).collect();
        expected.sort();
        assert_eq!(names, expected);
        assert!(outcome.failures.is_empty());
        assert!(outcome.abandoned.is_empty());
    }

    #[tokio::test]
    async fn test_at_most_m_jobs_at_once() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (a, p) = (Arc::clone(&active), Arc::clone(&peak));

        WorkerPool::new(2)
            .run(jobs(8), &CancellationToken::new(), move |_, _| {
                let (active, peak) = (Arc::clone(&a), Arc::clone(&p));
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                }
            })
            .await;

        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_panicking_job_does_not_stop_worker() {
        let outcome = WorkerPool::new(1)
            .run(jobs(3), &CancellationToken::new(), |_, job| async move {
                if job.name == "job-1" {
                    panic!("bad job");
                }
                job.name
            })
            .await;

        assert_eq!(outcome.results, vec!["job-0".to_string(), "job-2".to_string()]);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].0, "job-1");
    }

    #[tokio::test]
    async fn test_panic_building_job_future_is_recorded() {
        let outcome = WorkerPool::new(1)
            .run(jobs(3), &CancellationToken::new(), |_, job| {
                assert_ne!(job.name, "job-0", "refusing job");
                async move { job.name }
            })
            .await;

        assert_eq!(outcome.results, vec!["job-1".to_string(), "job-2".to_string()]);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].0, "job-0");
    }

    #[test]
    fn test_at_least_one_worker() {
        assert_eq!(WorkerPool::new(0).workers(), 1);
        assert_eq!(WorkerPool::new(7).workers(), 7);
    }

    #[tokio::test]
    async fn test_cancel_abandons_queued_jobs() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        let outcome = WorkerPool::new(1)
            .run(jobs(4), &cancel, move |_, job| {
                let trigger = trigger.clone();
                async move {
                    trigger.cancel();
                    job.name
                }
            })
            .await;

        assert_eq!(outcome.results, vec!["job-0".to_string()]);
        assert_eq!(outcome.abandoned.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_queue() {
        let outcome = WorkerPool::new(4)
            .run(Vec::new(), &CancellationToken::new(), |_, job| async move { job })
            .await;
        assert!(outcome.results.is_empty());
    }
}
