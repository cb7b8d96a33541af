//! Composite key codec.
//!
//! Every pack entry lives under a key of the form `!<sublevel>!<id>`.
//! The sublevel is the dot-joined path of collection names from the pack
//! root down to the document; the id is the dot-joined path of ancestor
//! `_id` values. Primary documents therefore sort before their embedded
//! documents, because an embedded sublevel always contains a `.`.

use crate::error::{Error, Result};

/// Join non-empty parts with `.`.
#[must_use]
pub fn join_parts(parts: &[&str]) -> String {
    parts
        .iter()
        .copied()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

/// Encode a composite key from sublevel and id part lists.
#[must_use]
pub fn encode(sublevels: &[&str], ids: &[&str]) -> String {
    format!("!{}!{}", join_parts(sublevels), join_parts(ids))
}

/// Split a composite key into its raw `(sublevel, id)` halves.
///
/// Only the first two `!` characters delimit; an id containing `!` is
/// returned intact.
///
/// # Errors
/// Returns [`Error::MalformedKey`] if the key does not have the
/// `!sublevel!id` shape.
pub fn split(key: &str) -> Result<(&str, &str)> {
    key.strip_prefix('!')
        .and_then(|rest| rest.split_once('!'))
        .filter(|(sublevel, _)| !sublevel.is_empty())
        .ok_or_else(|| Error::MalformedKey {
            key: key.to_string(),
        })
}

/// Decode a composite key into sublevel and id part lists.
///
/// # Errors
/// Returns [`Error::MalformedKey`] if the key does not have the
/// `!sublevel!id` shape.
pub fn decode(key: &str) -> Result<(Vec<&str>, Vec<&str>)> {
    let (sublevel, id) = split(key)?;
    Ok((sublevel.split('.').collect(), id.split('.').collect()))
}

/// The root collection of a key, i.e. the first sublevel part.
///
/// # Errors
/// Returns [`Error::MalformedKey`] if the key does not decode.
pub fn root_collection(key: &str) -> Result<&str> {
    let (sublevel, _) = split(key)?;
    Ok(sublevel.split('.').next().unwrap_or(sublevel))
}

/// Whether the key addresses an embedded document rather than a primary one.
#[must_use]
pub fn is_embedded(key: &str) -> bool {
    matches!(split(key), Ok((sublevel, _)) if sublevel.contains('.'))
}
