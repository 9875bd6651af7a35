use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImporterError {
    #[error("invalid fetcher filter: {0}")]
    InvalidFilter(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid source response: {0}")]
    InvalidResponse(String),
    #[error("transform failed: {0}")]
    TransformFailed(String),
    #[error("client error: {0}")]
    Client(#[from] agdir_client::ClientError),
    #[error("sign error: {0}")]
    Sign(#[from] agdir_sign::SignError),
    #[error("cancelled")]
    Cancelled,
}
