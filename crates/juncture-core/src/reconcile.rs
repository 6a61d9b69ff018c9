//! Reconciliation of live documents against a default schema

use serde_json::{Map, Value};
use tracing::warn;

/// A state document: string keys to arbitrary JSON values
pub type Document = Map<String, Value>;

/// Fill in every key of `defaults` missing from `live`, recursively.
///
/// - Keys absent from `live` get a copy of the default value.
/// - Where the default is a non-null object, the live value is reconciled
///   against it in turn.
/// - Live scalars and arrays are kept as they are.
/// - Keys only present in `live` are preserved.
///
/// A live value that is not an object where the default is one cannot
/// carry the default's keys, so it is replaced by the default.
pub fn reconcile(mut live: Document, defaults: &Document) -> Document {
    for (key, default) in defaults {
        match (live.get_mut(key), default) {
            (None, _) => {
                live.insert(key.clone(), default.clone());
            }
            (Some(Value::Object(current)), Value::Object(nested)) => {
                let taken = std::mem::take(current);
                *current = reconcile(taken, nested);
            }
            (Some(current), Value::Object(_)) => {
                warn!(key = %key, found = kind_of(current), "State value has wrong shape, using default");
                *current = default.clone();
            }
            (Some(_), _) => {}
        }
    }
    live
}

/// Shallow merge: every top-level key of `patch` replaces the same key in `doc`
pub fn shallow_merge(doc: &mut Document, patch: Document) {
    for (key, value) in patch {
        doc.insert(key, value);
    }
}

/// Short name of a JSON value's kind, for logs and errors
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
