//! Tests for which subscribers a write notifies.
//!
//! These tests verify that:
//! 1. Unchanged writes notify nobody
//! 2. Exact, ancestor and descendant paths fire only when their slice changes
//! 3. `.length` subscribers fire on length or array-ness changes only
//! 4. Whole-array replacement notifies only the indices that differ

use fieldstore::{FieldStore, Listener, Map, Value};
use serde_json::json;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn counter() -> (Rc<Cell<usize>>, Listener) {
    let hits = Rc::new(Cell::new(0));
    let h = Rc::clone(&hits);
    (hits, Listener::new(move || h.set(h.get() + 1)))
}

fn store(doc: Value) -> FieldStore {
    FieldStore::from_value(doc).unwrap()
}

// ============================================================================
// No-op stability
// ============================================================================

#[test]
fn test_rewriting_current_value_triggers_nothing() {
    let s = store(json!({
        "user": {"profile": {"name": "Ann", "tags": ["a", "b"]}},
        "todos": [{"id": 1, "completed": false}],
        "count": 3
    }));
    let (hits, l) = counter();
    for path in ["user", "user.profile", "user.profile.name", "todos", "todos.0.completed", "count"] {
        s.subscribe(path, l.clone());
    }
    s.subscribe("todos.length", l.clone());
    s.subscribe_global(l);
    hits.set(0);

    for path in [
        "user",
        "user.profile.name",
        "user.profile.tags",
        "todos",
        "todos.0",
        "todos.length",
        "count",
    ] {
        let current = s.get_value(path).unwrap();
        assert!(!s.set_value(path, current), "{path} should be a no-op");
    }
    assert_eq!(hits.get(), 0);
}

// ============================================================================
// Exact-path notification
// ============================================================================

#[test]
fn test_exact_path_fires_once_and_sibling_stays_quiet() {
    let s = FieldStore::default();
    let (c_hits, c) = counter();
    let (d_hits, d) = counter();
    s.subscribe("a.b.c", c);
    s.subscribe("a.b.d", d);

    assert!(s.set_value("a.b.c", 1));
    assert_eq!(c_hits.get(), 1);
    assert_eq!(d_hits.get(), 0);
}

#[test]
fn test_deep_write_on_empty_document_creates_parents() {
    let s = FieldStore::default();
    assert!(s.set_value("user.profile.name", "Jane"));
    assert_eq!(s.get_value("user.profile.name"), Some(json!("Jane")));
    assert_eq!(s.get_value("user"), Some(json!({"profile": {"name": "Jane"}})));
}

#[test]
fn test_field_listener_fires_for_nested_write() {
    let s = store(json!({"user": {"name": "Ann"}}));
    let (hits, l) = counter();
    s.subscribe("user", l);
    s.set_value("user.name", "Bob");
    assert_eq!(hits.get(), 1);
}

#[test]
fn test_descendant_fires_when_parent_replaced() {
    let s = store(json!({"user": {"name": "Ann", "age": 30}}));
    let (name_hits, name) = counter();
    let (age_hits, age) = counter();
    s.subscribe("user.name", name);
    s.subscribe("user.age", age);

    s.set_value("user", json!({"name": "Bob", "age": 30}));
    assert_eq!(name_hits.get(), 1);
    assert_eq!(age_hits.get(), 0);
}

#[test]
fn test_unrelated_root_never_fires() {
    let s = store(json!({"a": {"x": 1}, "b": {"x": 1}}));
    let (hits, l) = counter();
    s.subscribe("b.x", l.clone());
    s.subscribe("b", l);
    s.set_value("a.x", 2);
    assert_eq!(hits.get(), 0);
}

#[test]
fn test_leading_dot_names_the_same_field() {
    let s = FieldStore::default();
    let (hits, l) = counter();
    s.subscribe(".a", l);
    assert!(s.set_value(".a", 1));
    assert_eq!(hits.get(), 1);
    assert_eq!(s.get_value("a"), Some(json!(1)));
    assert_eq!(s.get_value(".a"), Some(json!(1)));
    assert!(!s.set_value("a", 1));
}

#[test]
fn test_huge_array_index_is_ignored() {
    let s = store(json!({"list": [1]}));
    let (hits, l) = counter();
    s.subscribe_global(l);

    assert!(!s.set_value("list.18446744073709551615", 2));
    assert!(!s.set_value("list.4000000000", 2));
    assert!(!s.set_value("list.length", 1_000_000_000_000u64));
    s.subscribe("list.4000000000.x", Listener::new(|| {}));

    assert_eq!(s.get_value("list"), Some(json!([1])));
    assert_eq!(hits.get(), 0);
}

// ============================================================================
// Length-only semantics
// ============================================================================

#[test]
fn test_length_listener_fires_on_append_only() {
    let s = store(json!({"todos": [{"id": 1, "completed": false}]}));
    let (len_hits, len) = counter();
    let (done_hits, done) = counter();
    s.subscribe("todos.length", len);
    s.subscribe("todos.0.completed", done);

    s.set_value("todos.0.completed", true);
    assert_eq!(len_hits.get(), 0);
    assert_eq!(done_hits.get(), 1);

    let mut todos = s.get_value("todos").unwrap();
    todos
        .as_array_mut()
        .unwrap()
        .push(json!({"id": 2, "completed": false}));
    s.set_value("todos", todos);
    assert_eq!(len_hits.get(), 1);
    assert_eq!(done_hits.get(), 1);
    assert_eq!(s.get_value("todos.length"), Some(json!(2)));
}

#[test]
fn test_length_listener_fires_on_array_ness_flip() {
    let s = store(json!({"items": null}));
    let (hits, l) = counter();
    s.subscribe("items.length", l);

    s.set_value("items", json!([]));
    assert_eq!(hits.get(), 1);

    s.set_value("items", json!({}));
    assert_eq!(hits.get(), 2);
}

#[test]
fn test_nested_length_listener() {
    let s = store(json!({"todos": [{"tags": ["x"]}]}));
    let (hits, l) = counter();
    s.subscribe("todos.0.tags.length", l);

    s.set_value("todos.0.tags.0", "y");
    assert_eq!(hits.get(), 0);
    s.set_value("todos.0.tags.1", "z");
    assert_eq!(hits.get(), 1);
}

#[test]
fn test_appending_by_index_path_fires_length() {
    let s = store(json!({"todos": [{"id": 1}]}));
    let (hits, l) = counter();
    s.subscribe("todos.length", l);
    s.set_value("todos.1", json!({"id": 2}));
    assert_eq!(hits.get(), 1);
    assert_eq!(s.get_value("todos.length"), Some(json!(2)));
}

// ============================================================================
// Whole-array replacement diffing
// ============================================================================

#[test]
fn test_whole_array_replacement_notifies_changed_indices_only() {
    let items: Vec<Value> = (0..5).map(|i| json!({"label": format!("item {i}")})).collect();
    let s = store(json!({ "items": items }));

    let counts: Vec<(Rc<Cell<usize>>, Listener)> = (0..5).map(|_| counter()).collect();
    for (i, (_, l)) in counts.iter().enumerate() {
        s.subscribe(&format!("items.{i}.label"), l.clone());
    }

    let mut next = s.get_value("items").unwrap();
    next[3]["label"] = json!("changed");
    s.set_value("items", next);

    let fired: Vec<usize> = counts.iter().map(|(h, _)| h.get()).collect();
    assert_eq!(fired, vec![0, 0, 0, 1, 0]);
}

#[test]
fn test_shrinking_array_notifies_removed_indices() {
    let s = store(json!({"rows": [1, 2, 3]}));
    let (kept_hits, kept) = counter();
    let (gone_hits, gone) = counter();
    s.subscribe("rows.0", kept);
    s.subscribe("rows.2", gone);

    s.set_value("rows", json!([1, 2]));
    assert_eq!(kept_hits.get(), 0);
    assert_eq!(gone_hits.get(), 1);
}

// ============================================================================
// Ordering and re-entrancy
// ============================================================================

#[test]
fn test_field_then_path_then_global_order() {
    let s = store(json!({"a": {"b": 1}}));
    let log = Rc::new(RefCell::new(Vec::new()));
    let tag = |name: &'static str| {
        let log = Rc::clone(&log);
        Listener::new(move || log.borrow_mut().push(name))
    };
    s.subscribe_global(tag("global"));
    s.subscribe("a.b", tag("path"));
    s.subscribe("a", tag("field"));

    s.set_value("a.b", 2);
    assert_eq!(*log.borrow(), vec!["field", "path", "global"]);
}

#[test]
fn test_listener_observes_committed_value() {
    let s = store(json!({"a": {"b": 1}}));
    let observed = Rc::new(RefCell::new(None));
    let reader = s.clone();
    let out = Rc::clone(&observed);
    s.subscribe(
        "a.b",
        Listener::new(move || *out.borrow_mut() = reader.get_value("a.b")),
    );
    s.set_value("a.b", 9);
    assert_eq!(*observed.borrow(), Some(json!(9)));
}

#[test]
fn test_listener_may_write_back_into_store() {
    let s = store(json!({"celsius": 0, "fahrenheit": 32}));
    let writer = s.clone();
    s.subscribe(
        "celsius",
        Listener::new(move || {
            let c = writer.get_value("celsius").and_then(|v| v.as_f64()).unwrap_or(0.0);
            writer.set_value("fahrenheit", c * 9.0 / 5.0 + 32.0);
        }),
    );
    s.set_value("celsius", 100);
    assert_eq!(s.get_value("fahrenheit"), Some(json!(212.0)));
}

#[test]
fn test_unsubscribe_during_fanout_keeps_pass_intact() {
    let s = store(json!({"x": 0}));
    let (second_hits, second) = counter();
    let slot: Rc<RefCell<Option<fieldstore::Unsubscribe>>> = Rc::new(RefCell::new(None));
    let slot_ref = Rc::clone(&slot);
    s.subscribe(
        "x",
        Listener::new(move || {
            if let Some(unsub) = slot_ref.borrow().as_ref() {
                unsub.unsubscribe();
            }
        }),
    );
    *slot.borrow_mut() = Some(s.subscribe("x", second));

    s.set_value("x", 1);
    assert_eq!(second_hits.get(), 1, "snapshot taken before the pass");
    s.set_value("x", 2);
    assert_eq!(second_hits.get(), 1);
}

// ============================================================================
// Global and whole-document subscribers
// ============================================================================

#[test]
fn test_subscribe_to_all_receives_document() {
    let s = store(json!({"a": 1}));
    let seen: Rc<RefCell<Vec<Map<String, Value>>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let unsub = s.subscribe_to_all(move |doc| sink.borrow_mut().push(doc.clone()));

    s.set_value("b", 2);
    unsub.unsubscribe();
    s.set_value("c", 3);

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(Value::Object(seen[0].clone()), json!({"a": 1, "b": 2}));
}

#[test]
fn test_panicking_listener_does_not_stop_others() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let s = store(json!({"x": 0}));
    let (hits, l) = counter();
    s.subscribe("x", Listener::new(|| panic!("listener failure")));
    s.subscribe_global(l);
    assert!(s.set_value("x", 1));
    assert_eq!(hits.get(), 1);
    assert_eq!(s.get_value("x"), Some(json!(1)));
}
