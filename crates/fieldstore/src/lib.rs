//! Path-indexed reactive field store.
//!
//! `fieldstore` holds a document of top-level fields and lets many observers
//! subscribe to narrow slices of it: a whole field, a dot-notation path such
//! as `"user.profile.name"` or `"todos.3.completed"`, or the `.length` of an
//! array. Writes are diffed structurally, and only observers whose slice
//! actually changed are notified.
//!
//! # Core Concepts
//!
//! - **FieldStore**: the store handle (single-threaded, cheap to clone)
//! - **Listener**: identity-compared callback; one callback registered under
//!   several triggers runs once per notification pass
//! - **Unsubscribe**: idempotent handle returned by every subscription
//! - **set_batch**: many writes, one deduplicated notification pass
//! - **StoreRegistry**: reference-counted sharing of stores by id
//!
//! # Quick Start
//!
//! ```
//! use fieldstore::{FieldStore, Listener};
//! use serde_json::json;
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let store = FieldStore::default();
//!
//! let renders = Rc::new(Cell::new(0));
//! let r = Rc::clone(&renders);
//! let unsubscribe = store.subscribe("user.profile.name", Listener::new(move || r.set(r.get() + 1)));
//!
//! store.set_value("user.profile.name", "Jane");
//! assert_eq!(store.get_value("user.profile.name"), Some(json!("Jane")));
//! assert_eq!(renders.get(), 1);
//!
//! // Writing the same value again is a no-op.
//! store.set_value("user.profile.name", "Jane");
//! assert_eq!(renders.get(), 1);
//!
//! unsubscribe.unsubscribe();
//! ```

mod config;
mod error;
mod listener;
mod path;
mod registry;
mod resolve;
mod store;

pub use config::StoreConfig;
pub use error::{value_type_name, StoreError, StoreResult};
pub use listener::{Listener, ListenerSet, Unsubscribe};
pub use path::{Path, Seg, LENGTH_SEGMENT};
pub use registry::StoreRegistry;
pub use resolve::{delete_at_path, get_at_path, set_at_path, try_set_at_path, MAX_ARRAY_PADDING};
pub use store::FieldStore;

// Re-export serde_json types used throughout the public API.
pub use serde_json::{Map, Value};
