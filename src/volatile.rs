//! Change gate that ignores volatile `_stats` metadata.
//!
//! Before replacing a checked-in source file, the gate overlays the
//! existing file's volatile fields onto the freshly extracted entry and
//! deep-compares. When only volatile metadata changed, the file on disk is
//! kept byte-for-byte.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::error::Result;
use crate::hierarchy::walker;
use crate::naming::SourceKind;
use crate::{document, serializer};

/// Outcome of the gate for one extracted entry.
pub enum GateDecision {
    /// Write the freshly extracted entry.
    Write,
    /// Keep the existing file; its raw bytes are returned.
    Keep(Vec<u8>),
}

/// Decide whether an extracted entry should replace the file at
/// `existing_path`.
///
/// Any read, parse, or traversal failure falls through to writing the
/// candidate.
#[must_use]
pub fn check(candidate: &Value, collection: &str, existing_path: &Path) -> GateDecision {
    match evaluate(candidate, collection, existing_path) {
        Ok(Some(bytes)) => GateDecision::Keep(bytes),
        Ok(None) | Err(_) => GateDecision::Write,
    }
}

fn evaluate(candidate: &Value, collection: &str, existing_path: &Path) -> Result<Option<Vec<u8>>> {
    let kind = SourceKind::classify(existing_path);
    if kind == SourceKind::Skip {
        return Ok(None);
    }
    let bytes = fs::read(existing_path)?;
    let text = String::from_utf8_lossy(&bytes);
    let existing = serializer::parse_document(&text, kind)?;

    if candidate.get(document::STATS).is_none() || existing.get(document::STATS).is_none() {
        return Ok(None);
    }

    // Volatile values of the existing tree, keyed by walk path. Matching on
    // the collection/_id chain instead of `_key` lets the gate cover
    // expanded adventure files, whose documents carry no keys.
    let mut existing_volatile: HashMap<String, Vec<(String, Value)>> = HashMap::new();
    let mut existing_walk = existing.clone();
    walker::apply(&mut existing_walk, collection, &String::new(), &mut |d, coll, path| {
        let here = walk_path(path, coll, d);
        if let Some(stats) = d.get(document::STATS).and_then(Value::as_object) {
            let fields: Vec<(String, Value)> = document::VOLATILE_FIELDS
                .iter()
                .filter_map(|f| stats.get(*f).map(|v| ((*f).to_string(), v.clone())))
                .collect();
            if !fields.is_empty() {
                existing_volatile.insert(here.clone(), fields);
            }
        }
        Ok(here)
    })?;

    // Overlay them onto a clone of the candidate, embedded documents too
    let mut overlaid = candidate.clone();
    walker::apply(&mut overlaid, collection, &String::new(), &mut |d, coll, path| {
        let here = walk_path(path, coll, d);
        if let Some(fields) = existing_volatile.get(&here)
            && let Some(stats) = d.get_mut(document::STATS).and_then(Value::as_object_mut)
        {
            for (field, value) in fields {
                stats.insert(field.clone(), value.clone());
            }
        }
        Ok(here)
    })?;

    Ok((overlaid == existing).then_some(bytes))
}

fn walk_path(parent: &str, collection: &str, doc: &Value) -> String {
    format!(
        "{parent}/{collection}:{}",
        document::id(doc).unwrap_or_default()
    )
}
