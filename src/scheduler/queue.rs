use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::job::Job;

/// Total order for pending jobs: higher priority first, earlier submission
/// breaks priority ties, and a monotonic sequence number breaks exact
/// `created_at` ties so the order is stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PendingKey {
    priority: Reverse<i32>,
    created_at: DateTime<Utc>,
    seq: u64,
}

/// The scheduler's pending queue. All access is serialized by the scheduler's
/// own mutex; this structure just keeps the dispatch order.
#[derive(Debug, Default)]
pub struct PendingQueue {
    jobs: BTreeMap<PendingKey, Arc<Job>>,
    next_seq: u64,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, job: Arc<Job>) {
        let key = PendingKey {
            priority: Reverse(job.priority),
            created_at: job.created_at,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.jobs.insert(key, job);
    }

    /// Iterate pending jobs in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = (&PendingKey, &Arc<Job>)> {
        self.jobs.iter()
    }

    /// Head of the queue: the highest-priority, oldest pending job.
    pub fn first(&self) -> Option<(&PendingKey, &Arc<Job>)> {
        self.jobs.iter().next()
    }

    pub fn remove(&mut self, key: &PendingKey) -> Option<Arc<Job>> {
        self.jobs.remove(key)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
