use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("signing failed: {0}")]
    SigningFailed(String),
    #[error("verification failed: {0}")]
    VerificationFailed(String),
    #[error(transparent)]
    Oci(#[from] agdir_oci::OciError),
    #[error(transparent)]
    Record(#[from] agdir_record::RecordError),
}
