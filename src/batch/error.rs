use thiserror::Error;

use crate::engine::EngineError;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("transcription job not found: {0}")]
    NotFound(String),
    #[error("transcription job {job_name} timed out; it may still be processing")]
    Timeout { job_name: String },
    #[error("transcription failed: {reason}")]
    JobFailed { reason: String },
    #[error("job submission failed: {0}")]
    Submit(#[from] EngineError),
    #[error("polling task for job {0} terminated unexpectedly")]
    PollerGone(String),
}
