use thiserror::Error;

#[derive(Debug, Error)]
pub enum OciError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("transient network error: {0}")]
    TransientNetwork(String),
    #[error("cancelled")]
    Cancelled,
    #[error("store corrupt: {0}")]
    Corrupt(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("internal error: {0}")]
    Internal(String),
    #[error(transparent)]
    Record(#[from] agdir_record::RecordError),
    #[error(transparent)]
    Common(#[from] agdir_common::CommonError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl OciError {
    /// Whether a retry loop (e.g. tag-retry, §4.2) should continue on this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OciError::TransientNetwork(_))
    }
}
