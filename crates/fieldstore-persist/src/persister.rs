//! Debounced snapshot writer and store hydration.

use crate::{SnapshotStorage, StorageError};
use fieldstore::{FieldStore, Listener, Unsubscribe};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Where and how often a store is snapshotted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistConfig {
    /// Storage key the snapshot is saved under.
    pub key: String,
    /// Quiet period after the last change before a snapshot is due.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_debounce_ms() -> u64 {
    300
}

impl PersistConfig {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            debounce_ms: default_debounce_ms(),
        }
    }

    /// Parse a JSON configuration document.
    pub fn from_json_str(raw: &str) -> Result<Self, StorageError> {
        Ok(serde_json::from_str(raw)?)
    }

    #[must_use]
    pub fn with_debounce_ms(mut self, debounce_ms: u64) -> Self {
        self.debounce_ms = debounce_ms;
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Writes a store's document to storage once changes settle.
///
/// The persister does not own a timer. The host calls
/// [`flush_if_due`](Self::flush_if_due) from whatever tick it already has,
/// and [`flush`](Self::flush) when it needs the snapshot written now.
pub struct Persister {
    store: FieldStore,
    storage: Arc<dyn SnapshotStorage>,
    config: PersistConfig,
    last_change: Rc<Cell<Option<Instant>>>,
    subscription: Unsubscribe,
}

impl Persister {
    /// Start tracking changes to `store`.
    pub fn attach(
        store: &FieldStore,
        storage: Arc<dyn SnapshotStorage>,
        config: PersistConfig,
    ) -> Self {
        let last_change = Rc::new(Cell::new(None));
        let mark = Rc::clone(&last_change);
        let subscription =
            store.subscribe_global(Listener::new(move || mark.set(Some(Instant::now()))));
        debug!(key = %config.key, debounce_ms = config.debounce_ms, "attached persister");
        Self {
            store: store.clone(),
            storage,
            config,
            last_change,
            subscription,
        }
    }

    pub fn config(&self) -> &PersistConfig {
        &self.config
    }

    /// True when a change has not been saved yet.
    pub fn is_dirty(&self) -> bool {
        self.last_change.get().is_some()
    }

    /// Save if dirty and the debounce period has passed since the last change.
    ///
    /// Returns whether a snapshot was written.
    pub fn flush_if_due(&self, now: Instant) -> Result<bool, StorageError> {
        let Some(changed_at) = self.last_change.get() else {
            return Ok(false);
        };
        if now.saturating_duration_since(changed_at) < self.config.debounce() {
            return Ok(false);
        }
        self.flush()?;
        Ok(true)
    }

    /// Save the current document immediately.
    pub fn flush(&self) -> Result<(), StorageError> {
        let snapshot = self.store.get_values();
        match self.storage.save(&self.config.key, &snapshot) {
            Ok(()) => {
                self.last_change.set(None);
                debug!(key = %self.config.key, fields = snapshot.len(), "saved snapshot");
                Ok(())
            }
            Err(e) => {
                warn!(key = %self.config.key, error = %e, "failed to save snapshot");
                Err(e)
            }
        }
    }

    /// Stop tracking changes. Pending changes are not saved.
    pub fn detach(self) {
        self.subscription.unsubscribe();
        debug!(key = %self.config.key, "detached persister");
    }
}

impl std::fmt::Debug for Persister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persister")
            .field("config", &self.config)
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

/// Initial document for a store: the stored snapshot under `key` if it can
/// be read, otherwise `fallback`.
pub fn hydrate<S>(storage: &S, key: &str, fallback: Map<String, Value>) -> Map<String, Value>
where
    S: SnapshotStorage + ?Sized,
{
    match storage.load(key) {
        Ok(Some(snapshot)) => {
            debug!(key, fields = snapshot.len(), "hydrated from snapshot");
            snapshot
        }
        Ok(None) => fallback,
        Err(e) => {
            warn!(key, error = %e, "failed to load snapshot, using fallback");
            fallback
        }
    }
}
