//! Kind registry: validates submissions and constructs jobs.
//!
//! Unknown kinds and malformed payloads are rejected here, before a job ever
//! reaches the scheduler.

use serde_json::Value;

use crate::error::{JobMillError, Result};
use crate::job::{Job, JobKind, Payload};

/// Map a wire kind name to its tag.
pub fn kind_from_wire(kind: &str) -> Option<JobKind> {
    match kind {
        "add_numbers" => Some(JobKind::AddNumbers),
        "reverse_string" => Some(JobKind::ReverseString),
        "resize_image" => Some(JobKind::ResizeImage),
        "large_array_sum" => Some(JobKind::LargeArraySum),
        _ => None,
    }
}

/// Validate a submission and construct its job.
///
/// `thread_demand` must already have the configured default applied; values
/// below 1 are clamped by the job itself.
pub fn build_job(
    id: impl Into<String>,
    kind: &str,
    priority: i32,
    thread_demand: usize,
    payload: Value,
) -> Result<Job> {
    let tag = kind_from_wire(kind).ok_or_else(|| JobMillError::UnknownKind(kind.to_string()))?;
    let payload = parse_payload(tag, payload)?;
    let job = Job::new(id, tag.as_str(), tag, priority, payload);
    job.set_thread_demand(thread_demand);
    Ok(job)
}

fn parse_payload(kind: JobKind, value: Value) -> Result<Payload> {
    let invalid = |e: serde_json::Error| JobMillError::InvalidPayload {
        kind: kind.to_string(),
        reason: e.to_string(),
    };
    Ok(match kind {
        JobKind::AddNumbers => Payload::AddNumbers(serde_json::from_value(value).map_err(invalid)?),
        JobKind::ReverseString => {
            Payload::ReverseString(serde_json::from_value(value).map_err(invalid)?)
        }
        JobKind::ResizeImage => {
            Payload::ResizeImage(serde_json::from_value(value).map_err(invalid)?)
        }
        JobKind::LargeArraySum => {
            Payload::LargeArraySum(serde_json::from_value(value).map_err(invalid)?)
        }
    })
}
