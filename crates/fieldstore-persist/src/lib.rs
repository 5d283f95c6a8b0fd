//! Best-effort snapshot persistence for [`fieldstore`] stores.
//!
//! A store's document can be written to a [`SnapshotStorage`] after changes
//! settle, and read back as the initial document of a new store:
//!
//! ```
//! use fieldstore::{FieldStore, Map};
//! use fieldstore_persist::{hydrate, MemoryStorage, PersistConfig, Persister};
//! use std::sync::Arc;
//!
//! let storage = Arc::new(MemoryStorage::new());
//! let store = FieldStore::new(hydrate(&*storage, "signup", Map::new()));
//! let persister = Persister::attach(&store, storage.clone(), PersistConfig::new("signup"));
//!
//! store.set_value("email", "a@b.c");
//! persister.flush().unwrap();
//!
//! let restored = hydrate(&*storage, "signup", Map::new());
//! assert_eq!(restored["email"], "a@b.c");
//! ```
//!
//! Persistence never affects the store itself: failures are logged and
//! returned to the caller, and the in-memory document stays authoritative.

mod error;
mod file_storage;
mod memory_storage;
mod persister;
mod storage;

pub use error::StorageError;
pub use file_storage::FileStorage;
pub use memory_storage::MemoryStorage;
pub use persister::{hydrate, PersistConfig, Persister};
pub use storage::SnapshotStorage;
