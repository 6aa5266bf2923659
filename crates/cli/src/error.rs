use model::error::ReplicationError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse the configuration file as JSON: {0}")]
    ConfigDeserialize(#[from] serde_json::Error),

    #[error("failed to serialize output as JSON: {0}")]
    JsonSerialize(serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Replication(#[from] ReplicationError),

    #[error("shutdown requested")]
    ShutdownRequested,

    #[error("unexpected error: {0}")]
    Unexpected(String),
}
