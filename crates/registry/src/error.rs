use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Doclet error: {0}")]
    DocletError(#[from] harconist_doclets::DocletError),

    #[error("Invalid package descriptor {path}: {source}", path = .path.display())]
    PackageDescriptor {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Extraction task failed: {0}")]
    TaskFailed(String),
}
