//! Priority scheduler with one dispatch loop per worker.
//!
//! Jobs wait in a queue ordered by `(priority desc, created_at asc)`. Each
//! worker has its own dispatch loop that scans the queue in that order for
//! the first job whose thread demand fits the worker's currently-free
//! threads. A job whose demand exceeds every worker's total capacity would
//! otherwise wait forever, so the first loop that observes it demotes it to
//! single-threaded and runs it anyway.
//!
//! Wakeups are broadcast: any of the loops may be the right one to take a
//! newly submitted job, depending on worker capacity, so every loop re-checks
//! the queue on each submit and on stop.

pub mod queue;

pub use queue::{PendingKey, PendingQueue};

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{JobMillError, Result};
use crate::job::Job;
use crate::worker::Worker;

/// How long a dispatch loop sleeps before re-checking the queue when no
/// wakeup arrives. Covers threads freed by completing jobs, which do not
/// broadcast.
const RECHECK_INTERVAL: Duration = Duration::from_millis(50);

/// State shared between the scheduler handle and its dispatch loops.
struct Inner {
    pending: Mutex<PendingQueue>,
    wakeup: Notify,
    max_capacity: usize,
    stop: CancellationToken,
}

pub struct Scheduler {
    inner: Arc<Inner>,
    workers: Vec<Arc<Worker>>,
    loops: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    /// The worker list is fixed after construction.
    pub fn new(workers: Vec<Arc<Worker>>) -> Self {
        let max_capacity = workers.iter().map(|w| w.num_threads).max().unwrap_or(0);
        Self {
            inner: Arc::new(Inner {
                pending: Mutex::new(PendingQueue::new()),
                wakeup: Notify::new(),
                max_capacity,
                stop: CancellationToken::new(),
            }),
            workers,
            loops: Mutex::new(Vec::new()),
        }
    }

    pub fn workers(&self) -> &[Arc<Worker>] {
        &self.workers
    }

    /// Queue a job for dispatch and wake every dispatch loop.
    ///
    /// Never blocks on workers. Rejected once the scheduler has been stopped.
    pub fn submit(&self, job: Arc<Job>) -> Result<()> {
        if self.inner.stop.is_cancelled() {
            return Err(JobMillError::SchedulerStopped);
        }
        self.inner.pending.lock().unwrap().push(job);
        self.inner.wakeup.notify_waiters();
        Ok(())
    }

    /// Spawn one dispatch loop per worker.
    pub fn run(&self) {
        let mut loops = self.loops.lock().unwrap();
        for worker in &self.workers {
            let inner = Arc::clone(&self.inner);
            let worker = Arc::clone(worker);
            loops.push(tokio::spawn(async move {
                inner.dispatch_loop(worker).await;
            }));
        }
    }

    /// Signal stop, wake every blocked loop, join them, then stop each
    /// worker. Idempotent.
    pub async fn stop(&self) {
        self.inner.stop.cancel();
        self.inner.wakeup.notify_waiters();

        let handles: Vec<_> = self.loops.lock().unwrap().drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Dispatch loop failed");
            }
        }

        for worker in &self.workers {
            worker.stop().await;
        }
        tracing::info!("Scheduler stopped");
    }

    /// Wait until the pending queue is empty, or `timeout` elapses.
    ///
    /// Intended for tests. Does not wait for running jobs to complete.
    pub async fn wait_all_jobs_done(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.inner.pending.lock().unwrap().is_empty() {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

impl Inner {
    async fn dispatch_loop(&self, worker: Arc<Worker>) {
        tracing::debug!(worker_id = %worker.id, "Dispatch loop started");
        loop {
            let (job, fallback) = loop {
                // Register for wakeups before testing the predicate so a
                // submit between the check and the await cannot be missed.
                let wakeup = self.wakeup.notified();
                if self.stop.is_cancelled() {
                    return;
                }
                if let Some(selection) = self.select_for(&worker) {
                    break selection;
                }
                tokio::select! {
                    _ = wakeup => {}
                    _ = tokio::time::sleep(RECHECK_INTERVAL) => {}
                    _ = self.stop.cancelled() => return,
                }
            };

            if fallback {
                tracing::warn!(
                    job_id = %job.id,
                    demand = job.thread_demand(),
                    max_capacity = self.max_capacity,
                    "No worker can satisfy thread demand; degrading to single-threaded"
                );
                job.set_thread_demand(1);
            }

            tracing::debug!(worker_id = %worker.id, job_id = %job.id, "Dispatching job");
            tokio::select! {
                submitted = worker.submit(Arc::clone(&job)) => {
                    if let Err(e) = submitted {
                        tracing::error!(worker_id = %worker.id, job_id = %job.id, error = %e, "Worker rejected job");
                        return;
                    }
                }
                _ = self.stop.cancelled() => return,
            }
        }
    }

    /// Pick the best pending job this worker can take right now, or None.
    ///
    /// First choice: the highest-priority job whose demand fits the worker's
    /// free-thread snapshot. The snapshot is advisory; the worker's own
    /// blocking permit acquisition is the authoritative gate. Failing that,
    /// if the head of the queue outdemands every worker's total capacity, it
    /// is selected for the single-thread fallback. The selected job is
    /// removed and its `started_at` stamped before the queue lock is
    /// released.
    fn select_for(&self, worker: &Worker) -> Option<(Arc<Job>, bool)> {
        let mut pending = self.pending.lock().unwrap();
        let free = worker.available_threads();

        let mut selected: Option<(PendingKey, bool)> = None;
        for (key, job) in pending.iter() {
            if job.thread_demand() <= free {
                selected = Some((*key, false));
                break;
            }
        }
        if selected.is_none() {
            if let Some((key, head)) = pending.first() {
                if head.thread_demand() > self.max_capacity {
                    selected = Some((*key, true));
                }
            }
        }

        let (key, fallback) = selected?;
        let job = pending.remove(&key)?;
        job.stamp_started();
        Some((job, fallback))
    }
}
