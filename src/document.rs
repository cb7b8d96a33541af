//! Reserved document fields and accessors.
//!
//! Documents are dynamic [`serde_json::Value`] trees. The engine is
//! format-agnostic about payload contents except for the small set of
//! reserved fields defined here.

use serde_json::Value;

/// Composite key of a document inside a pack. Present only in source files.
pub const KEY: &str = "_key";

/// Opaque document identifier.
pub const ID: &str = "_id";

/// Optional human label.
pub const NAME: &str = "name";

/// Optional reference to the owning Folder document by `_id`.
pub const FOLDER: &str = "folder";

/// Optional metadata record carrying the volatile fields.
pub const STATS: &str = "_stats";

/// `_stats` fields excluded from change detection in omit-volatile mode.
pub const VOLATILE_FIELDS: &[&str] = &[
    "createdTime",
    "modifiedTime",
    "lastModifiedBy",
    "systemVersion",
    "coreVersion",
];

/// The document's `_id`, if it is a string.
#[must_use]
pub fn id(doc: &Value) -> Option<&str> {
    doc.get(ID).and_then(Value::as_str)
}

/// The document's `_key`, if it is a string.
#[must_use]
pub fn key(doc: &Value) -> Option<&str> {
    doc.get(KEY).and_then(Value::as_str)
}

/// The document's `name`, if it is a non-empty string.
#[must_use]
pub fn name(doc: &Value) -> Option<&str> {
    doc.get(NAME).and_then(Value::as_str).filter(|n| !n.is_empty())
}

/// The document's `folder` reference, if it is a string.
#[must_use]
pub fn folder(doc: &Value) -> Option<&str> {
    doc.get(FOLDER).and_then(Value::as_str)
}

/// Remove `_key` from the document and return it, keeping field order.
pub fn take_key(doc: &mut Value) -> Option<String> {
    let removed = doc.as_object_mut()?.shift_remove(KEY)?;
    match removed {
        Value::String(key) => Some(key),
        _ => None,
    }
}

/// Set `_key` on the document. No-op for non-object values.
pub fn set_key(doc: &mut Value, key: String) {
    if let Some(obj) = doc.as_object_mut() {
        obj.insert(KEY.to_string(), Value::String(key));
    }
}
