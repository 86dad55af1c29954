//! Job model and execution.
//!
//! A [`Job`] is both the unit of scheduling and its own executor:
//! - **Single-threaded mode** (`thread_demand <= 1`): [`Job::execute`]
//!   dispatches on the kind, computes the result, and moves the job to a
//!   terminal state.
//! - **Chunked mode** (`thread_demand = T >= 2`): the worker invokes
//!   [`Job::execute_chunk`] on `T` threads in parallel; each chunk reduces a
//!   contiguous slice of the payload and folds its partial into the shared
//!   result under the job's own lock.
//!
//! State transitions are monotonic: Pending → Running → (Completed | Failed).
//! Once a job is terminal its result is frozen.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod registry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "Pending"),
            JobStatus::Running => write!(f, "Running"),
            JobStatus::Completed => write!(f, "Completed"),
            JobStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// The fixed set of job behaviors. Only [`JobKind::LargeArraySum`] honors
/// chunked execution; the other kinds complete once regardless of demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    AddNumbers,
    ReverseString,
    ResizeImage,
    LargeArraySum,
}

impl JobKind {
    /// Wire name used by the submission API.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::AddNumbers => "add_numbers",
            JobKind::ReverseString => "reverse_string",
            JobKind::ResizeImage => "resize_image",
            JobKind::LargeArraySum => "large_array_sum",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddNumbersPayload {
    pub x: i64,
    pub y: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReverseStringPayload {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResizeImagePayload {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LargeArraySumPayload {
    pub array: Vec<i64>,
}

/// Kind-specific immutable input. The payload variant and the job's kind tag
/// are separate fields on [`Job`]; execution checks that they agree and fails
/// the job when they do not.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Payload {
    AddNumbers(AddNumbersPayload),
    ReverseString(ReverseStringPayload),
    ResizeImage(ResizeImagePayload),
    LargeArraySum(LargeArraySumPayload),
}

/// Kind-specific output, written by the executor and frozen once the job is
/// terminal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JobResult {
    AddNumbers { sum: i64 },
    ReverseString { reversed: String },
    ResizeImage { url: String, width: u32, height: u32 },
    LargeArraySum { sum: i64 },
}

#[derive(Debug)]
struct JobState {
    status: JobStatus,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    result: Option<JobResult>,
}

/// The principal entity: value object, result object, and executor in one.
///
/// Owned by the scheduler while Pending, by exactly one worker while Running,
/// and only referenced by observers once terminal.
#[derive(Debug)]
pub struct Job {
    pub id: String,
    pub name: String,
    pub kind: JobKind,
    pub priority: i32,
    pub payload: Payload,
    pub created_at: DateTime<Utc>,
    thread_demand: AtomicUsize,
    state: Mutex<JobState>,
}

impl Job {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: JobKind,
        priority: i32,
        payload: Payload,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            priority,
            payload,
            created_at: Utc::now(),
            thread_demand: AtomicUsize::new(1),
            state: Mutex::new(JobState {
                status: JobStatus::Pending,
                started_at: None,
                completed_at: None,
                result: None,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap()
    }

    /// Number of threads the submitter wants this job fanned out across.
    ///
    /// Written once by the submitter and, for jobs no worker can ever satisfy,
    /// once more by the dispatch loop that demotes them to single-threaded.
    pub fn thread_demand(&self) -> usize {
        self.thread_demand.load(Ordering::Relaxed)
    }

    pub fn set_thread_demand(&self, demand: usize) {
        self.thread_demand.store(demand.max(1), Ordering::Relaxed);
    }

    pub fn status(&self) -> JobStatus {
        self.state().status
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.state().started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.state().completed_at
    }

    pub fn result(&self) -> Option<JobResult> {
        self.state().result.clone()
    }

    /// Stamp `started_at` if it has not been stamped yet. Called by the
    /// dispatch loop at dequeue; any wait in a worker's intake channel counts
    /// as execution time.
    pub fn stamp_started(&self) {
        let mut state = self.state();
        if state.started_at.is_none() {
            state.started_at = Some(Utc::now());
        }
    }

    /// Pending → Running. No effect on a job that already left Pending.
    pub fn mark_running(&self) {
        let mut state = self.state();
        if state.status == JobStatus::Pending {
            state.status = JobStatus::Running;
        }
    }

    /// Move the job to Completed and stamp `completed_at`. No effect once the
    /// job is terminal, so a worker finishing a chunked fan-out cannot
    /// overwrite a Failed transition recorded during execution.
    pub fn complete(&self) {
        let mut state = self.state();
        if state.status.is_terminal() {
            return;
        }
        state.status = JobStatus::Completed;
        state.completed_at = Some(Utc::now());
    }

    /// Terminal Failed transition carrying a zero-valued result of the kind's
    /// expected shape.
    pub fn fail(&self) {
        let mut state = self.state();
        if state.status.is_terminal() {
            return;
        }
        state.result = Some(self.zero_result());
        state.status = JobStatus::Failed;
        state.completed_at = Some(Utc::now());
    }

    fn zero_result(&self) -> JobResult {
        match self.kind {
            JobKind::AddNumbers => JobResult::AddNumbers { sum: 0 },
            JobKind::ReverseString => JobResult::ReverseString {
                reversed: String::new(),
            },
            JobKind::ResizeImage => JobResult::ResizeImage {
                url: String::new(),
                width: 0,
                height: 0,
            },
            JobKind::LargeArraySum => JobResult::LargeArraySum { sum: 0 },
        }
    }

    fn finish_with(&self, result: JobResult) {
        let mut state = self.state();
        if state.status.is_terminal() {
            return;
        }
        state.result = Some(result);
        state.status = JobStatus::Completed;
        state.completed_at = Some(Utc::now());
    }

    /// Run the whole job on the calling thread.
    ///
    /// Dispatches on the kind, writes the result, and moves the job to
    /// Completed. A payload that does not match the declared kind is a
    /// terminal Failed transition with a zero result.
    pub fn execute(&self) {
        match (self.kind, &self.payload) {
            (JobKind::AddNumbers, Payload::AddNumbers(p)) => {
                self.finish_with(JobResult::AddNumbers { sum: p.x + p.y });
            }
            (JobKind::ReverseString, Payload::ReverseString(p)) => {
                self.finish_with(JobResult::ReverseString {
                    reversed: p.text.chars().rev().collect(),
                });
            }
            (JobKind::ResizeImage, Payload::ResizeImage(p)) => {
                // No real image work; echo the target geometry.
                self.finish_with(JobResult::ResizeImage {
                    url: p.url.clone(),
                    width: p.width,
                    height: p.height,
                });
            }
            (JobKind::LargeArraySum, Payload::LargeArraySum(p)) => {
                self.finish_with(JobResult::LargeArraySum {
                    sum: p.array.iter().sum(),
                });
            }
            _ => {
                tracing::warn!(job_id = %self.id, kind = %self.kind, "Payload does not match job kind");
                self.fail();
            }
        }
    }

    /// Run chunk `index` of `total` on the calling thread.
    ///
    /// Array-reduction kinds sum the slice `[index*n/total, (index+1)*n/total)`
    /// and fold the partial into the shared result; with `total > n` the extra
    /// chunks get an empty range and contribute zero. Every other kind does
    /// its whole work in chunk 0 and ignores the rest, so it still completes
    /// exactly once.
    pub fn execute_chunk(&self, index: usize, total: usize) {
        match (self.kind, &self.payload) {
            (JobKind::LargeArraySum, Payload::LargeArraySum(p)) => {
                let n = p.array.len();
                let start = index * n / total;
                let end = (index + 1) * n / total;
                let partial: i64 = p.array[start..end].iter().sum();
                self.add_partial_sum(partial);
            }
            _ => {
                if index == 0 {
                    self.execute();
                }
            }
        }
    }

    /// Fold one chunk's partial into the shared sum under the job's lock.
    /// Safe for concurrent chunks of the same job; other jobs aggregate under
    /// their own locks.
    fn add_partial_sum(&self, partial: i64) {
        let mut state = self.state();
        if state.status.is_terminal() {
            return;
        }
        let current = match state.result {
            Some(JobResult::LargeArraySum { sum }) => sum,
            _ => 0,
        };
        state.result = Some(JobResult::LargeArraySum {
            sum: current + partial,
        });
    }
}
