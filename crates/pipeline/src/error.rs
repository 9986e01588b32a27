use slides_core::error::CoreError;
use slides_db::{BlobError, StoreError};

/// Why a submission was refused. No job record survives any of these.
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    /// Bad theme, settings or file. The caller must fix the input.
    #[error("{0}")]
    Validation(String),

    /// At capacity. The caller may retry the same submission later.
    #[error("Server is busy processing other jobs, please try again later")]
    Busy,

    #[error("failed to record job: {0}")]
    Store(#[from] StoreError),

    #[error("failed to stage upload: {0}")]
    Staging(#[from] BlobError),

    #[error("failed to hand off job: {0}")]
    Enqueue(String),
}

impl From<CoreError> for AdmissionError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Validation(msg) => AdmissionError::Validation(msg),
            CoreError::Unavailable(_) => AdmissionError::Busy,
            other => AdmissionError::Enqueue(other.to_string()),
        }
    }
}

/// Why a hand-off task was refused by the worker.
#[derive(Debug, thiserror::Error)]
pub enum AcceptError {
    #[error("worker is at capacity")]
    Busy,

    #[error("job not found: {0}")]
    NotFound(String),

    #[error("failed to read job: {0}")]
    Store(#[from] StoreError),
}
