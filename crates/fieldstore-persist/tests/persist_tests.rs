use fieldstore::{FieldStore, Map, Value};
use fieldstore_persist::{
    hydrate, FileStorage, MemoryStorage, PersistConfig, Persister, SnapshotStorage, StorageError,
};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn map(v: Value) -> Map<String, Value> {
    v.as_object().cloned().unwrap_or_default()
}

/// Storage whose writes always fail.
struct ReadOnlyStorage;

impl SnapshotStorage for ReadOnlyStorage {
    fn load(&self, _key: &str) -> Result<Option<Map<String, Value>>, StorageError> {
        Ok(None)
    }

    fn save(&self, _key: &str, _snapshot: &Map<String, Value>) -> Result<(), StorageError> {
        Err(StorageError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only",
        )))
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Ok(())
    }
}

#[test]
fn file_storage_save_load_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let storage = FileStorage::new(temp_dir.path().join("snapshots"));

    let snapshot = map(json!({"user": {"name": "Ann"}, "todos": [1, 2]}));
    storage.save("profile", &snapshot).unwrap();
    assert!(temp_dir.path().join("snapshots/profile.json").exists());

    let loaded = storage.load("profile").unwrap().unwrap();
    assert_eq!(loaded, snapshot);
    assert_eq!(storage.keys().unwrap(), vec!["profile".to_string()]);
}

#[test]
fn file_storage_missing_and_remove() {
    let temp_dir = TempDir::new().unwrap();
    let storage = FileStorage::new(temp_dir.path());

    assert!(storage.load("absent").unwrap().is_none());
    storage.save("a", &map(json!({"x": 1}))).unwrap();
    storage.save("b", &map(json!({"x": 2}))).unwrap();
    storage.remove("a").unwrap();
    storage.remove("a").unwrap();
    assert_eq!(storage.keys().unwrap(), vec!["b".to_string()]);
}

#[test]
fn file_storage_concurrent_saves_of_one_key() {
    let temp_dir = TempDir::new().unwrap();
    let storage = Arc::new(FileStorage::new(temp_dir.path()));

    for round in 0..20 {
        let handles: Vec<_> = (0..4)
            .map(|writer| {
                let storage = Arc::clone(&storage);
                std::thread::spawn(move || {
                    storage.save("form", &map(json!({"round": round, "writer": writer})))
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        let saved = storage.load("form").unwrap().unwrap();
        assert_eq!(saved["round"], json!(round));
    }
    assert_eq!(storage.keys().unwrap(), vec!["form".to_string()]);
    let leftovers = std::fs::read_dir(temp_dir.path())
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .map(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
                .unwrap_or(false)
        })
        .count();
    assert_eq!(leftovers, 0);
}

#[test]
fn file_storage_rejects_traversal() {
    let temp_dir = TempDir::new().unwrap();
    let storage = FileStorage::new(temp_dir.path());
    let err = storage.save("../outside", &Map::new()).unwrap_err();
    assert!(matches!(err, StorageError::InvalidKey(_)));
}

#[test]
fn file_storage_reports_corrupt_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("broken.json"), "[1, 2").unwrap();
    let storage = FileStorage::new(temp_dir.path());
    assert!(matches!(
        storage.load("broken"),
        Err(StorageError::Serialization(_))
    ));
}

#[test]
fn hydrate_prefers_snapshot_over_fallback() {
    let storage = MemoryStorage::new();
    let fallback = map(json!({"email": ""}));
    assert_eq!(hydrate(&storage, "signup", fallback.clone()), fallback);

    storage.save("signup", &map(json!({"email": "a@b.c"}))).unwrap();
    let store = FieldStore::new(hydrate(&storage, "signup", fallback));
    assert_eq!(store.get_value("email"), Some(json!("a@b.c")));
    assert!(!store.is_modified());
}

#[test]
fn hydrate_falls_back_on_unreadable_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("signup.json"), "not json").unwrap();
    let storage = FileStorage::new(temp_dir.path());
    let fallback = map(json!({"email": ""}));
    assert_eq!(hydrate(&storage, "signup", fallback.clone()), fallback);
}

#[test]
fn persister_waits_for_debounce() {
    let storage = Arc::new(MemoryStorage::new());
    let store = FieldStore::new(map(json!({"name": "Ann"})));
    let persister = Persister::attach(
        &store,
        storage.clone(),
        PersistConfig::new("form").with_debounce_ms(50),
    );

    assert!(!persister.flush_if_due(Instant::now()).unwrap());

    store.set_value("name", "Bob");
    assert!(persister.is_dirty());
    assert!(!persister.flush_if_due(Instant::now()).unwrap());
    assert!(storage.load("form").unwrap().is_none());

    let later = Instant::now() + Duration::from_millis(50);
    assert!(persister.flush_if_due(later).unwrap());
    assert!(!persister.is_dirty());
    assert_eq!(
        storage.load("form").unwrap(),
        Some(map(json!({"name": "Bob"})))
    );

    assert!(!persister.flush_if_due(later).unwrap());
}

#[test]
fn persister_ignores_no_op_writes() {
    let storage = Arc::new(MemoryStorage::new());
    let store = FieldStore::new(map(json!({"name": "Ann"})));
    let persister = Persister::attach(&store, storage, PersistConfig::new("form"));
    store.set_value("name", "Ann");
    assert!(!persister.is_dirty());
}

#[test]
fn persister_to_file_and_back() {
    let temp_dir = TempDir::new().unwrap();
    let storage = Arc::new(FileStorage::new(temp_dir.path()));

    let store = FieldStore::default();
    let persister = Persister::attach(&store, storage.clone(), PersistConfig::new("todos"));
    store.set_value("todos", json!([{"title": "draft"}]));
    store.set_value("todos.0.title", "write tests");
    persister.flush().unwrap();
    persister.detach();

    let restored = FieldStore::new(hydrate(&*storage, "todos", Map::new()));
    assert_eq!(
        restored.get_value("todos"),
        Some(json!([{"title": "write tests"}]))
    );
}

#[test]
fn failed_save_is_returned_and_stays_dirty() {
    let store = FieldStore::default();
    let persister = Persister::attach(&store, Arc::new(ReadOnlyStorage), PersistConfig::new("f"));
    store.set_value("a", 1);

    assert!(matches!(persister.flush(), Err(StorageError::Io(_))));
    assert!(persister.is_dirty());
    assert_eq!(store.get_value("a"), Some(json!(1)));
}

#[test]
fn detach_stops_tracking() {
    let store = FieldStore::default();
    let persister = Persister::attach(&store, Arc::new(MemoryStorage::new()), PersistConfig::new("f"));
    let before = store.listener_count();
    persister.detach();
    assert_eq!(store.listener_count(), before - 1);
}
