use crate::StorageError;
use serde_json::{Map, Value};

/// Key-value medium holding one document snapshot per key.
pub trait SnapshotStorage: Send + Sync {
    /// Load the snapshot stored under `key`, or `None` if there is none.
    fn load(&self, key: &str) -> Result<Option<Map<String, Value>>, StorageError>;

    /// Replace the snapshot stored under `key`.
    fn save(&self, key: &str, snapshot: &Map<String, Value>) -> Result<(), StorageError>;

    /// Remove the snapshot under `key`. Removing a missing key succeeds.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}
