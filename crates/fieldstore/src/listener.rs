//! Listener handles, identity-keyed listener sets, and fan-out execution.
//!
//! A [`Listener`] is a shared zero-argument callback. Two listeners are equal
//! when they share the same callback allocation, so a callback registered
//! under several triggers is called once per fan-out.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

/// A shared, identity-compared change callback.
#[derive(Clone)]
pub struct Listener(Rc<dyn Fn()>);

impl Listener {
    pub fn new(f: impl Fn() + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Invoke the callback.
    #[inline]
    pub fn call(&self) {
        (self.0)()
    }

    #[inline]
    fn addr(&self) -> *const () {
        Rc::as_ptr(&self.0) as *const ()
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for Listener {}

impl std::hash::Hash for Listener {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Listener").field(&self.addr()).finish()
    }
}

/// Insertion-ordered set of listeners keyed by identity.
#[derive(Clone, Debug, Default)]
pub struct ListenerSet {
    items: Vec<Listener>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener. Returns false if it was already present.
    pub fn insert(&mut self, listener: Listener) -> bool {
        if self.items.contains(&listener) {
            return false;
        }
        self.items.push(listener);
        true
    }

    /// Remove a listener. Returns false if it was not present.
    pub fn remove(&mut self, listener: &Listener) -> bool {
        let before = self.items.len();
        self.items.retain(|l| l != listener);
        self.items.len() != before
    }

    pub fn contains(&self, listener: &Listener) -> bool {
        self.items.contains(listener)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Listener> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// Idempotent unsubscribe handle returned by every subscription.
///
/// Calling [`Unsubscribe::unsubscribe`] more than once is harmless. Dropping
/// the handle leaves the subscription in place.
pub struct Unsubscribe {
    action: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl Unsubscribe {
    pub(crate) fn new(action: impl FnOnce() + 'static) -> Self {
        Self {
            action: RefCell::new(Some(Box::new(action))),
        }
    }

    /// Remove the subscription. Subsequent calls do nothing.
    pub fn unsubscribe(&self) {
        let action = self.action.borrow_mut().take();
        if let Some(action) = action {
            action();
        }
    }

    /// True until [`unsubscribe`](Self::unsubscribe) has been called once.
    pub fn is_active(&self) -> bool {
        self.action.borrow().is_some()
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Deduplicated, ordered batch of listeners collected for one notification pass.
///
/// Listeners are snapshotted at collection time, so subscribing or
/// unsubscribing from inside a callback never disturbs the running pass.
#[derive(Default)]
pub(crate) struct FanOut {
    seen: HashSet<Listener>,
    queue: Vec<Listener>,
}

impl FanOut {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, listener: &Listener) {
        if self.seen.insert(listener.clone()) {
            self.queue.push(listener.clone());
        }
    }

    pub(crate) fn extend<'a>(&mut self, listeners: impl IntoIterator<Item = &'a Listener>) {
        for listener in listeners {
            self.push(listener);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }

    /// Call every collected listener in order and return how many ran.
    ///
    /// With `catch_panics`, a panicking listener is logged and the pass
    /// continues with the next one.
    pub(crate) fn run(self, catch_panics: bool) -> usize {
        let total = self.queue.len();
        for (position, listener) in self.queue.into_iter().enumerate() {
            if !catch_panics {
                listener.call();
                continue;
            }
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener.call())) {
                tracing::error!(
                    position,
                    total,
                    panic = %panic_message(payload.as_ref()),
                    "field listener panicked during notification"
                );
            }
        }
        total
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
