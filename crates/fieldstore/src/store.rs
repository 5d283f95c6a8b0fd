//! The path-indexed field store and its notification engine.
//!
//! A [`FieldStore`] keeps one entry per top-level field, a registry of
//! dot-path subscriptions, and a set of global listeners. Every write is
//! diffed against the committed value; only writes that change something
//! notify, and only the subscriptions whose observed slice changed are
//! called.
//!
//! # Notification rules
//!
//! For a committed write to `W` under root field `R`:
//!
//! 1. listeners on the field `R` always fire;
//! 2. a path subscription fires if it is exactly `W`;
//! 3. a `.length` subscription fires if its array changed array-ness or length,
//!    and never for same-length content edits;
//! 4. a descendant or ancestor of `W` fires if its resolved value differs
//!    between the old and new root value;
//! 5. global listeners always fire.
//!
//! Each callback runs at most once per pass, after the write is committed,
//! and no internal borrow is held while it runs.

use crate::listener::{FanOut, Listener, ListenerSet, Unsubscribe};
use crate::resolve::{
    delete_at_path, get_at_path, is_blank, length_shape, set_at_path, try_set_at_path,
};
use crate::{Path, StoreConfig, StoreError, StoreResult};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, trace, warn};

#[derive(Default)]
struct FieldEntry {
    /// `None` is an unset field.
    value: Option<Value>,
    listeners: ListenerSet,
}

struct PathEntry {
    path: Path,
    root: String,
    listeners: ListenerSet,
}

impl PathEntry {
    fn new(path: Path) -> Self {
        let root = path.first().map(ToString::to_string).unwrap_or_default();
        Self {
            path,
            root,
            listeners: ListenerSet::new(),
        }
    }
}

/// A committed change to one root field.
struct Change {
    root: String,
    /// Exact path the caller wrote or removed.
    written: Path,
    /// Path whose ancestors and descendants are diffed.
    scope: Path,
    old: Option<Value>,
    new: Option<Value>,
}

struct Inner {
    fields: BTreeMap<String, FieldEntry>,
    paths: BTreeMap<String, PathEntry>,
    global: ListenerSet,
    initial: Map<String, Value>,
    zero_config: bool,
    deferred: VecDeque<String>,
    config: StoreConfig,
}

impl Inner {
    fn new(initial: Map<String, Value>, config: StoreConfig) -> Self {
        let fields = initial
            .iter()
            .map(|(k, v)| {
                (
                    k.clone(),
                    FieldEntry {
                        value: Some(v.clone()),
                        listeners: ListenerSet::new(),
                    },
                )
            })
            .collect();
        let zero_config = config.zero_config.unwrap_or(initial.is_empty());
        Self {
            fields,
            paths: BTreeMap::new(),
            global: ListenerSet::new(),
            initial,
            zero_config,
            deferred: VecDeque::new(),
            config,
        }
    }

    fn root_value(&self, root: &str) -> Option<&Value> {
        self.fields.get(root).and_then(|e| e.value.as_ref())
    }

    fn resolve(&self, name: &str) -> Option<Value> {
        let (root, sub) = split_name(name);
        let doc = self.root_value(&root)?;
        if sub.is_empty() {
            return Some(doc.clone());
        }
        get_at_path(doc, &sub).map(|v| v.into_owned())
    }

    fn values(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|(k, e)| (k.clone(), e.value.clone().unwrap_or(Value::Null)))
            .collect()
    }

    /// Stage and commit a write. `Ok(None)` means the value was unchanged.
    fn apply_write(&mut self, name: &str, value: Value, strict: bool) -> StoreResult<Option<Change>> {
        let (root, sub) = split_name(name);
        let old = self.root_value(&root).cloned();
        let candidate = if sub.is_empty() {
            value
        } else {
            let base = old.clone().unwrap_or_else(|| Value::Object(Map::new()));
            if strict {
                try_set_at_path(&base, &sub, value)?
            } else {
                set_at_path(&base, &sub, value)
            }
        };

        if old.as_ref() == Some(&candidate) {
            trace!(path = name, "write left value unchanged");
            return Ok(None);
        }

        self.fields.entry(root.clone()).or_default().value = Some(candidate.clone());

        let written = Path::parse(name);
        let scope = if written.is_length() {
            written.parent().unwrap_or_default()
        } else {
            written.clone()
        };
        Ok(Some(Change {
            root,
            written,
            scope,
            old,
            new: Some(candidate),
        }))
    }

    /// Add every listener affected by `change` to `fan`, excluding globals.
    fn collect_affected(&self, change: &Change, fan: &mut FanOut) {
        if let Some(entry) = self.fields.get(&change.root) {
            fan.extend(entry.listeners.iter());
        }
        for entry in self.paths.values() {
            if entry.root == change.root && path_changed(&entry.path, change) {
                fan.extend(entry.listeners.iter());
            }
        }
    }

    fn collect_all(&self, fan: &mut FanOut) {
        for entry in self.fields.values() {
            fan.extend(entry.listeners.iter());
        }
        for entry in self.paths.values() {
            fan.extend(entry.listeners.iter());
        }
        fan.extend(self.global.iter());
    }

    /// Give `path` a `null` value if it currently resolves to nothing.
    ///
    /// Only missing keys are added: a path that runs through a scalar is
    /// left unresolved. The baseline receives the same default when that
    /// also only adds keys to it, so a pristine store stays unmodified.
    fn ensure_defined(&mut self, path: &Path) {
        if path.is_length() || path.len() < 2 {
            return;
        }
        let Some(root) = path.first().map(ToString::to_string) else {
            return;
        };
        let tail = path.tail();
        let current = self.root_value(&root);
        if current.is_some_and(|v| get_at_path(v, &tail).is_some()) {
            return;
        }
        if !seeds_additively(current, &tail, true) {
            trace!(path = %path, "subscribed path runs through a scalar, left unset");
            return;
        }
        let base = current
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        self.fields.entry(root.clone()).or_default().value =
            Some(set_at_path(&base, &tail, Value::Null));

        if !self.zero_config {
            let baseline = self.initial.get(&root);
            if !baseline.is_some_and(|v| get_at_path(v, &tail).is_some())
                && seeds_additively(baseline, &tail, false)
            {
                let baseline = baseline
                    .cloned()
                    .unwrap_or_else(|| Value::Object(Map::new()));
                self.initial
                    .insert(root, set_at_path(&baseline, &tail, Value::Null));
            }
        }
        trace!(path = %path, "initialized subscribed path to null");
    }

    fn catch_panics(&self) -> bool {
        self.config.catch_listener_panics
    }
}

/// Root field name and the path below it.
///
/// Empty dot-segments are dropped, so `".a"` and `"a"` name the same field.
/// A name with no segments at all is kept verbatim as the field name.
fn split_name(name: &str) -> (String, Path) {
    let path = Path::parse(name);
    match path.first() {
        Some(root) => (root.to_string(), path.tail()),
        None => (name.to_string(), Path::root()),
    }
}

/// True if writing at `tail` below `root` only adds keys: each step is
/// missing, an object, an in-bounds array element, or (when `through_null`)
/// a `null` that becomes an object.
fn seeds_additively(root: Option<&Value>, tail: &Path, through_null: bool) -> bool {
    let mut current = root;
    for seg in tail.segments() {
        current = match current {
            None => return true,
            Some(Value::Null) => return through_null,
            Some(Value::Object(obj)) => obj.get(&seg.object_key()),
            Some(Value::Array(arr)) => match seg.as_index() {
                Some(i) if i < arr.len() => arr.get(i),
                _ => return false,
            },
            Some(_) => return false,
        };
    }
    true
}

/// Decide whether a registered path observes a change to its root field.
fn path_changed(path: &Path, change: &Change) -> bool {
    if *path == change.written {
        return true;
    }
    let rel = path.tail();
    let old = change.old.as_ref();
    let new = change.new.as_ref();

    if path.is_length() {
        let target = rel.parent().unwrap_or_default();
        let before = old.and_then(|v| get_at_path(v, &target));
        let after = new.and_then(|v| get_at_path(v, &target));
        return length_shape(before.as_deref()) != length_shape(after.as_deref());
    }

    let related = path.is_descendant_of(&change.scope) || change.scope.is_descendant_of(path);
    if !related {
        return false;
    }
    let before = old.and_then(|v| get_at_path(v, &rel));
    let after = new.and_then(|v| get_at_path(v, &rel));
    before.as_deref() != after.as_deref()
}

/// Reset value for zero-config mode: strings empty, containers emptied, the rest `null`.
fn blank_like(value: &Value) -> Value {
    match value {
        Value::String(_) => Value::String(String::new()),
        Value::Object(obj) => Value::Object(obj.iter().map(|(k, v)| (k.clone(), blank_like(v))).collect()),
        Value::Array(_) => Value::Array(Vec::new()),
        Value::Null | Value::Bool(_) | Value::Number(_) => Value::Null,
    }
}

/// Reactive store of top-level fields addressed by dot-notation paths.
///
/// `FieldStore` is a cheap, single-threaded handle: clones share the same
/// document and listeners.
///
/// # Examples
///
/// ```
/// use fieldstore::{FieldStore, Listener};
/// use serde_json::json;
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let store = FieldStore::from_value(json!({"todos": [{"id": 1, "completed": false}]})).unwrap();
///
/// let fired = Rc::new(Cell::new(0));
/// let f = Rc::clone(&fired);
/// store.subscribe("todos.length", Listener::new(move || f.set(f.get() + 1)));
///
/// // Same length: the `.length` subscriber stays quiet.
/// store.set_value("todos.0.completed", true);
/// assert_eq!(fired.get(), 0);
///
/// store.set_value("todos", json!([{"id": 1, "completed": true}, {"id": 2, "completed": false}]));
/// assert_eq!(fired.get(), 1);
/// assert_eq!(store.get_value("todos.length"), Some(json!(2)));
/// ```
#[derive(Clone)]
pub struct FieldStore {
    inner: Rc<RefCell<Inner>>,
}

impl FieldStore {
    /// Create a store whose fields and baseline are `initial`.
    pub fn new(initial: Map<String, Value>) -> Self {
        Self::with_config(initial, StoreConfig::default())
    }

    pub fn with_config(initial: Map<String, Value>, config: StoreConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner::new(initial, config))),
        }
    }

    /// Create a store from a JSON object document.
    pub fn from_value(initial: Value) -> StoreResult<Self> {
        match initial {
            Value::Object(map) => Ok(Self::new(map)),
            other => Err(StoreError::type_mismatch(
                Path::root(),
                "object",
                crate::value_type_name(&other),
            )),
        }
    }

    // ===== Reads =====

    /// Current value at a field name or dot-path. `None` means undefined.
    pub fn get_value(&self, name: &str) -> Option<Value> {
        self.inner.borrow().resolve(name)
    }

    /// Every top-level field, with unset fields reported as `null`.
    pub fn get_values(&self) -> Map<String, Value> {
        self.inner.borrow().values()
    }

    /// True if `name` resolves to a defined value (including `null`).
    pub fn has_field(&self, name: &str) -> bool {
        self.get_value(name).is_some()
    }

    /// The baseline used by [`is_modified`](Self::is_modified) and [`reset`](Self::reset).
    pub fn initial_values(&self) -> Map<String, Value> {
        self.inner.borrow().initial.clone()
    }

    pub fn is_zero_config(&self) -> bool {
        self.inner.borrow().zero_config
    }

    // ===== Writes =====

    /// Write `value` at a field name or dot-path.
    ///
    /// Intermediate containers are created as needed. Returns false, and
    /// notifies nobody, when the stored value is structurally unchanged.
    pub fn set_value(&self, name: &str, value: impl Into<Value>) -> bool {
        match self.write(name, value.into(), false) {
            Ok(committed) => committed,
            Err(err) => {
                warn!(path = name, error = %err, "lenient write rejected");
                false
            }
        }
    }

    /// Like [`set_value`](Self::set_value), but honors
    /// [`StoreConfig::strict_paths`] and reports malformed paths as errors.
    pub fn try_set_value(&self, name: &str, value: impl Into<Value>) -> StoreResult<bool> {
        let strict = self.inner.borrow().config.strict_paths;
        self.write(name, value.into(), strict)
    }

    fn write(&self, name: &str, value: Value, strict: bool) -> StoreResult<bool> {
        let mut fan = FanOut::new();
        let catch = {
            let mut inner = self.inner.borrow_mut();
            let Some(change) = inner.apply_write(name, value, strict)? else {
                return Ok(false);
            };
            inner.collect_affected(&change, &mut fan);
            fan.extend(inner.global.iter());
            debug!(path = name, listeners = fan.len(), "committed field write");
            inner.catch_panics()
        };
        fan.run(catch);
        Ok(true)
    }

    /// Apply each entry of `partial` through [`set_value`](Self::set_value).
    pub fn set_values(&self, partial: Map<String, Value>) {
        for (name, value) in partial {
            self.set_value(&name, value);
        }
    }

    /// Apply several writes, then notify once.
    ///
    /// Each write is diffed on its own. Listeners affected by any committed
    /// write, plus the global listeners, run once after all writes are
    /// committed. Returns the number of writes that changed something.
    pub fn set_batch<K, V>(&self, updates: impl IntoIterator<Item = (K, V)>) -> usize
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        let updates: Vec<(K, V)> = updates.into_iter().collect();
        let mut fan = FanOut::new();
        let mut committed = 0;
        let catch = {
            let mut inner = self.inner.borrow_mut();
            for (name, value) in updates {
                let name = name.as_ref();
                match inner.apply_write(name, value.into(), false) {
                    Ok(Some(change)) => {
                        committed += 1;
                        inner.collect_affected(&change, &mut fan);
                    }
                    Ok(None) => {}
                    Err(err) => warn!(path = name, error = %err, "batch write rejected"),
                }
            }
            if committed == 0 {
                return 0;
            }
            fan.extend(inner.global.iter());
            debug!(committed, listeners = fan.len(), "committed batch");
            inner.catch_panics()
        };
        fan.run(catch);
        committed
    }

    /// Delete a field or nested value and notify.
    ///
    /// Removing an array element splices it out, so every subscription
    /// under that array is diffed. Returns false if nothing was there.
    pub fn remove_field(&self, name: &str) -> bool {
        let target = Path::parse(name);
        let Some(root) = target.first().map(ToString::to_string) else {
            return false;
        };
        let mut fan = FanOut::new();
        let catch = {
            let mut inner = self.inner.borrow_mut();
            let old = inner.root_value(&root).cloned();
            let (new, scope) = if target.len() == 1 {
                if old.is_none() {
                    return false;
                }
                (None, target.clone())
            } else {
                let Some(mut next) = old.clone() else {
                    return false;
                };
                if !delete_at_path(&mut next, &target.tail()) {
                    return false;
                }
                let parent = target.parent().unwrap_or_default();
                let spliced = !parent.is_empty()
                    && inner
                        .resolve(&parent.to_string())
                        .is_some_and(|v| v.is_array());
                (Some(next), if spliced { parent } else { target.clone() })
            };
            inner.fields.entry(root.clone()).or_default().value = new.clone();

            let change = Change {
                root,
                written: target,
                scope,
                old,
                new,
            };
            inner.collect_affected(&change, &mut fan);
            fan.extend(inner.global.iter());
            debug!(path = name, listeners = fan.len(), "removed field");
            inner.catch_panics()
        };
        fan.run(catch);
        true
    }

    // ===== Subscriptions =====

    /// Subscribe to a field name or dot-path.
    ///
    /// Subscribing to a dot-path that currently resolves to nothing sets it
    /// to `null` without notifying anyone. `.length` paths are left alone.
    pub fn subscribe(&self, name: &str, listener: Listener) -> Unsubscribe {
        let path = Path::parse(name);
        let weak = Rc::downgrade(&self.inner);
        let mut inner = self.inner.borrow_mut();

        if path.len() <= 1 {
            let root = if path.is_empty() {
                name.to_string()
            } else {
                path.to_string()
            };
            inner
                .fields
                .entry(root.clone())
                .or_default()
                .listeners
                .insert(listener.clone());
            trace!(field = %root, "subscribed to field");
            return Unsubscribe::new(move || {
                with_inner(&weak, |inner| {
                    if let Some(entry) = inner.fields.get_mut(&root) {
                        entry.listeners.remove(&listener);
                    }
                });
            });
        }

        inner.ensure_defined(&path);
        let key = path.to_string();
        inner
            .paths
            .entry(key.clone())
            .or_insert_with(|| PathEntry::new(path))
            .listeners
            .insert(listener.clone());
        trace!(path = %key, "subscribed to path");
        Unsubscribe::new(move || {
            with_inner(&weak, |inner| {
                let emptied = match inner.paths.get_mut(&key) {
                    Some(entry) => {
                        entry.listeners.remove(&listener);
                        entry.listeners.is_empty()
                    }
                    None => false,
                };
                if emptied {
                    inner.paths.remove(&key);
                    trace!(path = %key, "pruned empty path subscription");
                }
            });
        })
    }

    /// Subscribe to every committed change anywhere in the document.
    pub fn subscribe_global(&self, listener: Listener) -> Unsubscribe {
        self.inner.borrow_mut().global.insert(listener.clone());
        let weak = Rc::downgrade(&self.inner);
        Unsubscribe::new(move || {
            with_inner(&weak, |inner| {
                inner.global.remove(&listener);
            });
        })
    }

    /// Global subscription whose callback receives the full current document.
    pub fn subscribe_to_all(&self, callback: impl Fn(&Map<String, Value>) + 'static) -> Unsubscribe {
        let weak = Rc::downgrade(&self.inner);
        self.subscribe_global(Listener::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let values = inner.borrow().values();
            callback(&values);
        }))
    }

    /// Names of the dot-paths that currently have subscribers.
    pub fn subscribed_paths(&self) -> Vec<String> {
        self.inner.borrow().paths.keys().cloned().collect()
    }

    /// Total number of registrations across fields, paths and globals.
    pub fn listener_count(&self) -> usize {
        let inner = self.inner.borrow();
        inner.fields.values().map(|e| e.listeners.len()).sum::<usize>()
            + inner.paths.values().map(|e| e.listeners.len()).sum::<usize>()
            + inner.global.len()
    }

    // ===== Deferred refresh =====

    /// Schedule a forced re-notification of subscribers whose field name or
    /// path starts with `prefix`.
    ///
    /// Nothing runs until [`run_deferred`](Self::run_deferred) is called,
    /// which the owner does once the current call stack has unwound.
    pub fn refresh_fields(&self, prefix: &str) {
        self.inner.borrow_mut().deferred.push_back(prefix.to_string());
        trace!(prefix, "queued field refresh");
    }

    pub fn has_deferred(&self) -> bool {
        !self.inner.borrow().deferred.is_empty()
    }

    /// Run queued refreshes, including any queued while running.
    /// Returns the number of listener invocations.
    pub fn run_deferred(&self) -> usize {
        let mut invoked = 0;
        loop {
            let mut fan = FanOut::new();
            let catch = {
                let mut inner = self.inner.borrow_mut();
                let Some(prefix) = inner.deferred.pop_front() else {
                    break;
                };
                for (name, entry) in &inner.fields {
                    if name.starts_with(&prefix) {
                        fan.extend(entry.listeners.iter());
                    }
                }
                for (name, entry) in &inner.paths {
                    if name.starts_with(&prefix) {
                        fan.extend(entry.listeners.iter());
                    }
                }
                debug!(prefix = %prefix, listeners = fan.len(), "running field refresh");
                inner.catch_panics()
            };
            invoked += fan.run(catch);
        }
        invoked
    }

    // ===== Baseline and lifecycle =====

    /// Whether the document differs from its baseline.
    ///
    /// In zero-config mode there is no meaningful baseline, so the store is
    /// modified as soon as any field holds a non-blank value.
    pub fn is_modified(&self) -> bool {
        let inner = self.inner.borrow();
        if inner.zero_config {
            return inner
                .fields
                .values()
                .any(|e| e.value.as_ref().is_some_and(|v| !is_blank(v)));
        }
        let field_differs = inner.fields.iter().any(|(name, entry)| {
            let current = entry.value.as_ref().unwrap_or(&Value::Null);
            let baseline = inner.initial.get(name).unwrap_or(&Value::Null);
            current != baseline
        });
        field_differs
            || inner
                .initial
                .iter()
                .any(|(name, v)| !inner.fields.contains_key(name) && !v.is_null())
    }

    /// Restore the baseline and notify every listener unconditionally.
    pub fn reset(&self) {
        let mut fan = FanOut::new();
        let catch = {
            let mut inner = self.inner.borrow_mut();
            if inner.zero_config {
                for entry in inner.fields.values_mut() {
                    entry.value = entry.value.as_ref().map(blank_like);
                }
                let paths: Vec<Path> = inner.paths.values().map(|e| e.path.clone()).collect();
                for path in &paths {
                    inner.ensure_defined(path);
                }
            } else {
                let initial = inner.initial.clone();
                for (name, entry) in inner.fields.iter_mut() {
                    entry.value = initial.get(name).cloned();
                }
                for (name, value) in initial {
                    inner.fields.entry(name).or_default().value = Some(value);
                }
            }
            inner.collect_all(&mut fan);
            debug!(listeners = fan.len(), zero_config = inner.zero_config, "reset store");
            inner.catch_panics()
        };
        fan.run(catch);
    }

    /// Replace the baseline, fill unset fields from it, and notify everyone.
    ///
    /// Registered listeners are kept.
    pub fn set_initial_values(&self, baseline: Map<String, Value>) {
        let mut fan = FanOut::new();
        let catch = {
            let mut inner = self.inner.borrow_mut();
            inner.zero_config = inner.config.zero_config.unwrap_or(baseline.is_empty());
            for (name, value) in &baseline {
                let entry = inner.fields.entry(name.clone()).or_default();
                if entry.value.is_none() {
                    entry.value = Some(value.clone());
                }
            }
            inner.initial = baseline;
            inner.collect_all(&mut fan);
            debug!(listeners = fan.len(), "re-armed baseline");
            inner.catch_panics()
        };
        fan.run(catch);
    }

    /// Drop every field, subscription, baseline value and queued refresh.
    ///
    /// Values already handed out are unaffected. Outstanding [`Unsubscribe`]
    /// handles become no-ops.
    pub fn destroy(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.fields.clear();
        inner.paths.clear();
        inner.global.clear();
        inner.deferred.clear();
        inner.initial.clear();
        inner.zero_config = inner.config.zero_config.unwrap_or(true);
        debug!("destroyed field store");
    }
}

fn with_inner(weak: &Weak<RefCell<Inner>>, f: impl FnOnce(&mut Inner)) {
    if let Some(inner) = weak.upgrade() {
        f(&mut inner.borrow_mut());
    }
}

impl Default for FieldStore {
    fn default() -> Self {
        Self::new(Map::new())
    }
}

impl fmt::Debug for FieldStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("FieldStore")
            .field("fields", &inner.fields.len())
            .field("paths", &inner.paths.len())
            .field("global", &inner.global.len())
            .field("zero_config", &inner.zero_config)
            .finish()
    }
}
