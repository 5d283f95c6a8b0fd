use thiserror::Error;

/// Snapshot storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Key is unusable as a storage name (path traversal, control chars, etc.).
    #[error("invalid snapshot key: {0}")]
    InvalidKey(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A lock guarding the storage was poisoned by a panicking writer.
    #[error("storage lock poisoned")]
    Poisoned,
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
