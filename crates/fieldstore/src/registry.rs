//! Reference-counted registry of shared stores keyed by id.
//!
//! The registry is an ordinary value: callers create one and pass it to
//! whatever needs to share stores, rather than reaching for process state.

use crate::FieldStore;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use tracing::debug;

struct RegistryEntry {
    store: FieldStore,
    refs: usize,
}

/// Keyed store-of-stores with acquire/release lifecycle.
#[derive(Default)]
pub struct StoreRegistry {
    entries: RefCell<HashMap<String, RegistryEntry>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the store for `id`, creating it from `init` on first acquire.
    ///
    /// Every call must be paired with a [`release`](Self::release).
    pub fn acquire(&self, id: &str, init: impl FnOnce() -> Map<String, Value>) -> FieldStore {
        if let Some(entry) = self.entries.borrow_mut().get_mut(id) {
            entry.refs += 1;
            return entry.store.clone();
        }
        // No borrow is held while `init` runs; it may acquire other ids.
        let store = FieldStore::new(init());
        let mut entries = self.entries.borrow_mut();
        let entry = entries.entry(id.to_string()).or_insert_with(|| {
            debug!(id, "created shared store");
            RegistryEntry { store, refs: 0 }
        });
        entry.refs += 1;
        entry.store.clone()
    }

    /// Drop one reference to `id`. The last release destroys the store.
    ///
    /// Returns true if the store was destroyed.
    pub fn release(&self, id: &str) -> bool {
        let removed = {
            let mut entries = self.entries.borrow_mut();
            let Some(entry) = entries.get_mut(id) else {
                return false;
            };
            entry.refs = entry.refs.saturating_sub(1);
            if entry.refs > 0 {
                return false;
            }
            entries.remove(id)
        };
        match removed {
            Some(entry) => {
                entry.store.destroy();
                debug!(id, "destroyed shared store");
                true
            }
            None => false,
        }
    }

    /// Look up a store without taking a reference.
    pub fn get(&self, id: &str) -> Option<FieldStore> {
        self.entries.borrow().get(id).map(|e| e.store.clone())
    }

    pub fn ref_count(&self, id: &str) -> usize {
        self.entries.borrow().get(id).map_or(0, |e| e.refs)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl std::fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.borrow();
        let mut map = f.debug_map();
        for (id, entry) in entries.iter() {
            map.entry(id, &entry.refs);
        }
        map.finish()
    }
}
