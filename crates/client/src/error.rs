use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Oci(#[from] agdir_oci::OciError),
    #[error(transparent)]
    Record(#[from] agdir_record::RecordError),
    #[error(transparent)]
    Sign(#[from] agdir_sign::SignError),
    #[error(transparent)]
    Stream(#[from] agdir_stream::StreamError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
