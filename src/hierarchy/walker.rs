//! Generic traversal over the embedded-collection tree.
//!
//! [`apply`] visits a document and everything beneath it, depth-first
//! pre-order, threading an inherited context value down the recursion.
//! [`map`] rewrites the direct embedded-collection slots of one document.
//! Between them they are the single point where embedded documents are
//! flattened to `_id` references or resolved back to full subdocuments.

use serde_json::Value;

use super::{Arity, embedded_collections};
use crate::error::Result;

/// Apply `f` to `doc` and every embedded document beneath it.
///
/// `f` receives the document, its collection name, and the context inherited
/// from its parent; the context it returns is handed to the document's
/// children. Array order is preserved; missing and null single-arity slots
/// are skipped.
///
/// # Errors
/// Propagates the first error returned by `f`.
pub fn apply<C, F>(doc: &mut Value, collection: &str, ctx: &C, f: &mut F) -> Result<()>
where
    F: FnMut(&mut Value, &str, &C) -> Result<C>,
{
    let next = f(doc, collection, ctx)?;
    for (embedded, arity) in embedded_collections(collection) {
        let Some(slot) = doc.get_mut(*embedded) else {
            continue;
        };
        match arity {
            Arity::Array => {
                if let Some(entries) = slot.as_array_mut() {
                    for entry in entries {
                        apply(entry, embedded, &next, f)?;
                    }
                }
            }
            Arity::Single => {
                if !slot.is_null() {
                    apply(slot, embedded, &next, f)?;
                }
            }
        }
    }
    Ok(())
}

/// Replace each embedded-collection slot of `doc` by mapping `f` over it.
///
/// `f` receives the embedded collection name and the current value. Array
/// slots map element-wise and default to an empty array when missing or
/// malformed; single slots default to null. The slot is always written
/// back, so packed values carry every embedded collection explicitly.
///
/// # Errors
/// Propagates the first error returned by `f`.
pub fn map<F>(doc: &mut Value, collection: &str, f: &mut F) -> Result<()>
where
    F: FnMut(&str, Value) -> Result<Value>,
{
    for (embedded, arity) in embedded_collections(collection) {
        let slot = doc.get_mut(*embedded).map(Value::take);
        let mapped = match arity {
            Arity::Array => {
                let mut out = Vec::new();
                if let Some(Value::Array(entries)) = slot {
                    for entry in entries {
                        out.push(f(embedded, entry)?);
                    }
                }
                Value::Array(out)
            }
            Arity::Single => match slot {
                Some(value) if !value.is_null() => f(embedded, value)?,
                _ => Value::Null,
            },
        };
        if let Some(obj) = doc.as_object_mut() {
            obj.insert((*embedded).to_string(), mapped);
        }
    }
    Ok(())
}
