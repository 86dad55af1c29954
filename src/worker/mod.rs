//! Worker thread pool.
//!
//! A [`Worker`] owns `num_threads` execution slots and a bounded intake
//! channel fed by the scheduler. [`Worker::start`] spawns `num_threads`
//! executors that consume the intake until it is closed and drained.
//!
//! # Per-job protocol
//!
//! 1. Mark the job Running.
//! 2. Demand <= 1: run [`Job::execute`] on a blocking thread.
//! 3. Demand T >= 2: block until T permits are reserved from the pool
//!    semaphore; fan out T parallel [`Job::execute_chunk`] calls; join them
//!    all; the permits are released by drop on every exit path.
//! 4. Mark the job Completed (a no-op if execution already failed it).
//!
//! Single-threaded jobs do not touch the semaphore: the executor that
//! dequeued them is the thread they run on.

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};

use crate::config::DEFAULT_INTAKE_CAPACITY;
use crate::error::{JobMillError, Result};
use crate::job::Job;

#[derive(Debug)]
pub struct Worker {
    pub id: String,
    pub num_threads: usize,
    intake_tx: Mutex<Option<mpsc::Sender<Arc<Job>>>>,
    intake_rx: Mutex<Option<mpsc::Receiver<Arc<Job>>>>,
    threads: Arc<Semaphore>,
    executors: Mutex<Vec<JoinHandle<()>>>,
}

impl Worker {
    /// A worker with the default intake capacity of 100.
    pub fn new(id: impl Into<String>, num_threads: usize) -> Self {
        Self::with_intake_capacity(id, num_threads, DEFAULT_INTAKE_CAPACITY)
    }

    pub fn with_intake_capacity(
        id: impl Into<String>,
        num_threads: usize,
        intake_capacity: usize,
    ) -> Self {
        let (intake_tx, intake_rx) = mpsc::channel(intake_capacity);
        Self {
            id: id.into(),
            num_threads,
            intake_tx: Mutex::new(Some(intake_tx)),
            intake_rx: Mutex::new(Some(intake_rx)),
            threads: Arc::new(Semaphore::new(num_threads)),
            executors: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the executors. Each consumes jobs from the intake channel until
    /// it is closed and drained.
    pub fn start(&self) {
        let Some(intake_rx) = self.intake_rx.lock().unwrap().take() else {
            return; // already started
        };
        let intake_rx = Arc::new(tokio::sync::Mutex::new(intake_rx));

        let mut executors = self.executors.lock().unwrap();
        for slot in 0..self.num_threads {
            let worker_id = self.id.clone();
            let threads = Arc::clone(&self.threads);
            let intake_rx = Arc::clone(&intake_rx);
            executors.push(tokio::spawn(async move {
                loop {
                    let job = { intake_rx.lock().await.recv().await };
                    match job {
                        Some(job) => process_job(&worker_id, &threads, job).await,
                        None => break,
                    }
                }
                tracing::debug!(worker_id = %worker_id, slot, "Executor drained");
            }));
        }
    }

    /// Hand a job to this worker. Blocks while the intake channel is full;
    /// the scheduler is the only submitter.
    pub async fn submit(&self, job: Arc<Job>) -> Result<()> {
        let intake_tx = { self.intake_tx.lock().unwrap().clone() };
        let Some(intake_tx) = intake_tx else {
            return Err(JobMillError::WorkerStopped(self.id.clone()));
        };
        intake_tx
            .send(job)
            .await
            .map_err(|_| JobMillError::WorkerStopped(self.id.clone()))
    }

    /// Non-blocking snapshot of the free thread count.
    ///
    /// Advisory only: the scheduler may race with running jobs, and the
    /// blocking permit acquisition in job processing is the authoritative
    /// gate. Never treat this as a reservation.
    pub fn available_threads(&self) -> usize {
        self.threads.available_permits()
    }

    /// Close the intake channel and wait for every executor to finish its
    /// current job. Idempotent.
    pub async fn stop(&self) {
        self.intake_tx.lock().unwrap().take();

        let handles: Vec<_> = self.executors.lock().unwrap().drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(worker_id = %self.id, error = %e, "Executor task failed");
            }
        }
    }
}

async fn process_job(worker_id: &str, threads: &Arc<Semaphore>, job: Arc<Job>) {
    job.mark_running();
    let demand = job.thread_demand();
    tracing::debug!(worker_id, job_id = %job.id, demand, "Processing job");

    if demand <= 1 {
        let j = Arc::clone(&job);
        if let Err(e) = tokio::task::spawn_blocking(move || j.execute()).await {
            tracing::error!(worker_id, job_id = %job.id, error = %e, "Job execution panicked");
            job.fail();
        }
    } else {
        // Reserve the requested threads in one blocking acquisition. The
        // semaphore queue is FIFO, so a saturated worker grants this
        // reservation before later ones; taking permits piecemeal instead
        // could interleave with another chunked job and leave both holding
        // partial sets forever. The owned permits are dropped together after
        // the fan-out, so none can leak even when a chunk exits early.
        let permits = Arc::clone(threads)
            .acquire_many_owned(demand as u32)
            .await
            .expect("thread pool semaphore closed");

        let mut chunks = JoinSet::new();
        for index in 0..demand {
            let j = Arc::clone(&job);
            chunks.spawn_blocking(move || j.execute_chunk(index, demand));
        }
        while let Some(joined) = chunks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(worker_id, job_id = %job.id, error = %e, "Chunk execution panicked");
            }
        }
        drop(permits);
    }

    job.complete();
    tracing::info!(
        worker_id,
        job_id = %job.id,
        status = %job.status(),
        "Job finished"
    );
}
