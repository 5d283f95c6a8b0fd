//! Path resolution against JSON values.
//!
//! Reads walk the value segment by segment and stop at the first missing or
//! non-container step. Writes clone the container they are given and assign
//! into the clone, creating intermediate objects where the path runs through
//! a missing, `null` or scalar value.

use crate::error::{value_type_name, StoreError, StoreResult};
use crate::path::LENGTH_SEGMENT;
use crate::{Path, Seg};
use serde_json::{Map, Value};
use std::borrow::Cow;

/// Resolve `path` inside `doc`.
///
/// Returns `None` when any step is absent. The `length` pseudo-field resolves
/// to the element count of an array or the UTF-16 length of a string, so the
/// result is borrowed for real values and owned for computed lengths.
///
/// ```
/// use fieldstore::{get_at_path, Path};
/// use serde_json::json;
///
/// let doc = json!({"todos": [{"done": false}, {"done": true}]});
/// assert_eq!(get_at_path(&doc, &Path::parse("todos.1.done")).unwrap().into_owned(), json!(true));
/// assert_eq!(get_at_path(&doc, &Path::parse("todos.length")).unwrap().into_owned(), json!(2));
/// assert!(get_at_path(&doc, &Path::parse("todos.5.done")).is_none());
/// ```
pub fn get_at_path<'a>(doc: &'a Value, path: &Path) -> Option<Cow<'a, Value>> {
    let segments = path.segments();
    let mut current = doc;
    for (depth, seg) in segments.iter().enumerate() {
        let is_last = depth + 1 == segments.len();
        current = match (current, seg) {
            (Value::Object(obj), seg) => obj.get(&seg.object_key())?,
            (Value::Array(arr), Seg::Index(i)) => arr.get(*i)?,
            (Value::Array(arr), Seg::Key(k)) if k == LENGTH_SEGMENT && is_last => {
                return Some(Cow::Owned(Value::from(arr.len())));
            }
            (Value::String(s), Seg::Key(k)) if k == LENGTH_SEGMENT && is_last => {
                return Some(Cow::Owned(Value::from(s.encode_utf16().count())));
            }
            _ => return None,
        };
    }
    Some(Cow::Borrowed(current))
}

/// Return a copy of `doc` with `value` written at `path`.
///
/// Never fails: missing, `null` and scalar intermediates are replaced by
/// fresh objects, and array writes past the end pad with `null` (up to
/// [`MAX_ARRAY_PADDING`] slots; writes further out are dropped). The input
/// is left untouched.
///
/// ```
/// use fieldstore::{set_at_path, Path};
/// use serde_json::json;
///
/// let doc = json!({"user": "legacy"});
/// let next = set_at_path(&doc, &Path::parse("user.profile.name"), json!("Jane"));
/// assert_eq!(next, json!({"user": {"profile": {"name": "Jane"}}}));
/// assert_eq!(doc, json!({"user": "legacy"}));
/// ```
pub fn set_at_path(doc: &Value, path: &Path, value: Value) -> Value {
    let mut result = doc.clone();
    // Lenient writes have no error path.
    let _ = write(&mut result, path, 0, value, false);
    result
}

/// Strict counterpart of [`set_at_path`].
///
/// Missing and `null` intermediates are still created, but a path that runs
/// through a scalar, uses a non-index key on an array, or skips past the end
/// of an array is rejected.
pub fn try_set_at_path(doc: &Value, path: &Path, value: Value) -> StoreResult<Value> {
    let mut result = doc.clone();
    write(&mut result, path, 0, value, true)?;
    Ok(result)
}

/// Most `null` slots a lenient write may add past the end of an array.
///
/// Writes that would pad further are ignored.
pub const MAX_ARRAY_PADDING: usize = 10_000;

fn prefix(path: &Path, depth: usize) -> Path {
    path.segments()[..=depth].iter().cloned().collect()
}

fn write(
    current: &mut Value,
    full_path: &Path,
    depth: usize,
    value: Value,
    strict: bool,
) -> StoreResult<()> {
    let Some(seg) = full_path.segments().get(depth) else {
        *current = value;
        return Ok(());
    };
    let is_last = depth + 1 == full_path.len();

    match current {
        Value::Object(obj) => {
            let child = obj.entry(seg.object_key()).or_insert(Value::Null);
            write(child, full_path, depth + 1, value, strict)
        }
        Value::Array(arr) => match seg {
            Seg::Index(i) => {
                let i = *i;
                if i > arr.len() {
                    if strict {
                        return Err(StoreError::index_out_of_bounds(
                            prefix(full_path, depth),
                            i,
                            arr.len(),
                        ));
                    }
                    if i - arr.len() > MAX_ARRAY_PADDING {
                        tracing::trace!(path = %full_path, index = i, len = arr.len(), "ignoring write far past end of array");
                        return Ok(());
                    }
                }
                if i >= arr.len() {
                    arr.resize(i + 1, Value::Null);
                }
                write(&mut arr[i], full_path, depth + 1, value, strict)
            }
            Seg::Key(k) if k == LENGTH_SEGMENT && is_last => {
                let Some(len) = value.as_u64() else {
                    if strict {
                        return Err(StoreError::type_mismatch(
                            prefix(full_path, depth),
                            "number",
                            value_type_name(&value),
                        ));
                    }
                    return Ok(());
                };
                let len = usize::try_from(len).unwrap_or(usize::MAX);
                if len.saturating_sub(arr.len()) > MAX_ARRAY_PADDING {
                    if strict {
                        return Err(StoreError::index_out_of_bounds(
                            prefix(full_path, depth),
                            len,
                            arr.len(),
                        ));
                    }
                    tracing::trace!(path = %full_path, requested = len, len = arr.len(), "ignoring length far past end of array");
                    return Ok(());
                }
                arr.resize(len, Value::Null);
                Ok(())
            }
            Seg::Key(k) => {
                if strict {
                    return Err(StoreError::type_mismatch(
                        prefix(full_path, depth),
                        "object",
                        "array",
                    ));
                }
                tracing::trace!(path = %full_path, key = %k, "ignoring named key write into array");
                Ok(())
            }
        },
        Value::Null => {
            *current = Value::Object(Map::new());
            write(current, full_path, depth, value, strict)
        }
        other => {
            if strict {
                let at = if depth == 0 {
                    Path::root()
                } else {
                    prefix(full_path, depth - 1)
                };
                return Err(StoreError::type_mismatch(at, "object", value_type_name(other)));
            }
            *other = Value::Object(Map::new());
            write(other, full_path, depth, value, strict)
        }
    }
}

/// Remove the value at `path` in place. Returns true if something was removed.
///
/// Array elements are spliced out, shifting later elements down.
pub fn delete_at_path(doc: &mut Value, path: &Path) -> bool {
    delete_segments(doc, path.segments())
}

fn delete_segments(current: &mut Value, segments: &[Seg]) -> bool {
    match segments {
        [] => false,
        [seg] => match current {
            Value::Object(obj) => obj.remove(&seg.object_key()).is_some(),
            Value::Array(arr) => match seg.as_index() {
                Some(i) if i < arr.len() => {
                    arr.remove(i);
                    true
                }
                _ => false,
            },
            _ => false,
        },
        [seg, rest @ ..] => {
            let child = match current {
                Value::Object(obj) => obj.get_mut(&seg.object_key()),
                Value::Array(arr) => seg.as_index().and_then(|i| arr.get_mut(i)),
                _ => None,
            };
            child.is_some_and(|child| delete_segments(child, rest))
        }
    }
}

/// Array-ness and length of a resolved value, as observed by `.length` subscribers.
#[inline]
pub(crate) fn length_shape(value: Option<&Value>) -> (bool, usize) {
    match value {
        Some(Value::Array(arr)) => (true, arr.len()),
        _ => (false, 0),
    }
}

/// True for values a zero-config form treats as untouched.
pub(crate) fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(arr) => arr.iter().all(is_blank),
        Value::Object(obj) => obj.values().all(is_blank),
        Value::Bool(_) | Value::Number(_) => false,
    }
}
