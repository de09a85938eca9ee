use std::path::PathBuf;

use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{op} {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing store {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("serializing store: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A key holds a value of the wrong shape
    #[error("invalid value under '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("store lock poisoned")]
    Poisoned,
}
