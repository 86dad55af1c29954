use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobMillError {
    #[error("Unknown job kind: {0}")]
    UnknownKind(String),

    #[error("Invalid payload for kind {kind}: {reason}")]
    InvalidPayload { kind: String, reason: String },

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Scheduler is stopped")]
    SchedulerStopped,

    #[error("Worker {0} is stopped")]
    WorkerStopped(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, JobMillError>;
