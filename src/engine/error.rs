use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("connection failed: {message}")]
    Connection { message: String },
    #[error("recognition stream closed for session {session_id}")]
    StreamClosed { session_id: String },
    #[error("job submission failed: {message}")]
    Submit { message: String },
    #[error("job status query failed: {message}")]
    Poll { message: String },
    #[error("blob store operation failed: {message}")]
    Blob { message: String },
}
