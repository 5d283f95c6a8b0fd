use crate::{SnapshotStorage, StorageError};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory storage for testing and local development.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, Map<String, Value>>>,
}

impl MemoryStorage {
    /// Create a new in-memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys that currently hold a snapshot, sorted.
    pub fn keys(&self) -> Result<Vec<String>, StorageError> {
        let entries = self.entries.read().map_err(|_| StorageError::Poisoned)?;
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

impl SnapshotStorage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<Map<String, Value>>, StorageError> {
        let entries = self.entries.read().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, snapshot: &Map<String, Value>) -> Result<(), StorageError> {
        let mut entries = self.entries.write().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), snapshot.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().map_err(|_| StorageError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn memory_storage_save_load_remove() {
        let storage = MemoryStorage::new();
        assert!(storage.load("form").unwrap().is_none());

        let snapshot = json!({"name": "Ann"}).as_object().cloned().unwrap();
        storage.save("form", &snapshot).unwrap();
        assert_eq!(storage.load("form").unwrap(), Some(snapshot));
        assert_eq!(storage.keys().unwrap(), vec!["form".to_string()]);

        storage.remove("form").unwrap();
        storage.remove("form").unwrap();
        assert!(storage.load("form").unwrap().is_none());
    }
}
