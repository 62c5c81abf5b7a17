use thiserror::Error;

use crate::engine::EngineError;

#[derive(Debug, Error)]
pub enum StreamingError {
    #[error("session already active for connection {connection_id}")]
    AlreadyActive { connection_id: String },
    #[error("session {session_id} is not accepting frames")]
    InvalidState { session_id: String },
    #[error("recognition stream failed for session {session_id}: {message}")]
    DownstreamFailure { session_id: String, message: String },
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}
