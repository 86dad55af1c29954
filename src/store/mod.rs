//! Persistence mirror for terminal job state.
//!
//! The scheduler core never talks to storage. Instead, an observer task per
//! submitted job watches for the terminal transition and hands a snapshot
//! plus derived timing metrics to a [`JobStore`]. [`MemoryStore`] is the
//! in-process implementation; a real database sits behind the same trait.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::job::{Job, JobResult, JobStatus};

/// Snapshot of a job's state, taken at the terminal transition.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub id: String,
    pub kind: String,
    pub priority: i32,
    pub thread_demand: usize,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<JobResult>,
}

impl JobSnapshot {
    pub fn of(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            kind: job.kind.to_string(),
            priority: job.priority,
            thread_demand: job.thread_demand(),
            status: job.status(),
            created_at: job.created_at,
            started_at: job.started_at(),
            completed_at: job.completed_at(),
            result: job.result(),
        }
    }

    /// Timing metrics, available once both timestamps are stamped.
    ///
    /// `queue_time` runs from creation to dequeue, `execution_time` from
    /// dequeue to completion (intake-channel wait counts as execution), and
    /// `total_time` spans both. All in seconds.
    pub fn metrics(&self) -> Option<JobMetrics> {
        let started_at = self.started_at?;
        let completed_at = self.completed_at?;
        Some(JobMetrics {
            queue_time: (started_at - self.created_at).as_seconds_f64(),
            execution_time: (completed_at - started_at).as_seconds_f64(),
            total_time: (completed_at - self.created_at).as_seconds_f64(),
            worker_threads: self.thread_demand as f64,
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct JobMetrics {
    pub queue_time: f64,
    pub execution_time: f64,
    pub total_time: f64,
    pub worker_threads: f64,
}

/// One metric observation, mirroring a `(job_id, name, value)` metrics row.
#[derive(Debug, Clone, Serialize)]
pub struct MetricRow {
    pub job_id: String,
    pub metric_name: String,
    pub metric_value: f64,
}

/// Downstream persistence contract. Receives job snapshots on terminal
/// transitions; `upsert` must be idempotent.
pub trait JobStore: Send + Sync {
    fn upsert(&self, snapshot: JobSnapshot);
    fn record_metrics(&self, job_id: &str, metrics: JobMetrics);
    fn get(&self, id: &str) -> Option<JobSnapshot>;
    /// All persisted rows, newest first.
    fn all(&self) -> Vec<JobSnapshot>;
}

/// In-process store over plain maps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    jobs: RwLock<HashMap<String, JobSnapshot>>,
    metrics: RwLock<Vec<MetricRow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded metric rows, in insertion order.
    pub fn metric_rows(&self) -> Vec<MetricRow> {
        self.metrics.read().unwrap().clone()
    }
}

impl JobStore for MemoryStore {
    fn upsert(&self, snapshot: JobSnapshot) {
        self.jobs
            .write()
            .unwrap()
            .insert(snapshot.id.clone(), snapshot);
    }

    fn record_metrics(&self, job_id: &str, metrics: JobMetrics) {
        let rows = [
            ("queue_time", metrics.queue_time),
            ("execution_time", metrics.execution_time),
            ("total_time", metrics.total_time),
            ("worker_threads", metrics.worker_threads),
        ];
        let mut stored = self.metrics.write().unwrap();
        for (name, value) in rows {
            stored.push(MetricRow {
                job_id: job_id.to_string(),
                metric_name: name.to_string(),
                metric_value: value,
            });
        }
    }

    fn get(&self, id: &str) -> Option<JobSnapshot> {
        self.jobs.read().unwrap().get(id).cloned()
    }

    fn all(&self) -> Vec<JobSnapshot> {
        let mut rows: Vec<_> = self.jobs.read().unwrap().values().cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows
    }
}

/// Watch a submitted job and persist it once it reaches a terminal state.
///
/// Metrics are recorded before the snapshot row so a reader that sees the
/// row also sees its timings. Jobs that never terminate (scheduler shut down
/// first) leave the observer polling until the process exits.
pub fn mirror_when_terminal(job: Arc<Job>, store: Arc<dyn JobStore>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(50));
        loop {
            interval.tick().await;
            let status = job.status();
            if status.is_terminal() {
                let snapshot = JobSnapshot::of(&job);
                if let Some(metrics) = snapshot.metrics() {
                    store.record_metrics(&job.id, metrics);
                }
                store.upsert(snapshot);
                tracing::debug!(job_id = %job.id, status = %status, "Job mirrored to store");
                break;
            }
        }
    })
}
