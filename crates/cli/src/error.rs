use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config error: {0}")]
    Config(#[from] agdir_config::ConfigError),
    #[error("record error: {0}")]
    Record(#[from] agdir_record::RecordError),
    #[error("oci error: {0}")]
    Oci(#[from] agdir_oci::OciError),
    #[error("client error: {0}")]
    Client(#[from] agdir_client::ClientError),
    #[error("sign error: {0}")]
    Sign(#[from] agdir_sign::SignError),
    #[error("importer error: {0}")]
    Importer(#[from] agdir_importer::ImporterError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
