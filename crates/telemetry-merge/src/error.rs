use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = MergeError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error(transparent)]
    Registry(#[from] device_registry::RegistryError),
    #[error("reading data file {}: {source}", path.display())]
    DataFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("writing output {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("writing merged row: {0}")]
    Write(#[source] std::io::Error),
    #[error("formatting run timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
    #[error("invalid config: {0}")]
    Config(String),
}
