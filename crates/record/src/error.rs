use std::collections::BTreeMap;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("invalid input: {message}")]
    InvalidInput {
        message: String,
        details: BTreeMap<String, String>,
    },
    #[error("unsupported schema version: {version}")]
    UnsupportedAlgorithm { version: String },
    #[error("validation failed")]
    ValidationFailed { messages: Vec<String> },
    #[error("fatal configuration error: {message}")]
    FatalConfig { message: String },
    #[error(transparent)]
    Common(#[from] agdir_common::CommonError),
}

impl RecordError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        RecordError::InvalidInput {
            message: message.into(),
            details: BTreeMap::new(),
        }
    }
}
