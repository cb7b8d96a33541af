//! Source-file naming policy.
//!
//! Derived filenames must stay safe and stable across platforms and
//! check-ins: ASCII letters, digits, underscores, and the Cyrillic range
//! survive; everything else becomes `_`.

use std::path::Path;

use serde_json::Value;

use crate::document;

/// Classification of a source path by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// `.yml` or `.yaml`
    Yaml,
    /// `.json`
    Json,
    /// Anything else; the scanner ignores these.
    Skip,
}

impl SourceKind {
    /// Classify a path by its extension.
    #[must_use]
    pub fn classify<P: AsRef<Path>>(path: P) -> Self {
        match path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("yml" | "yaml") => SourceKind::Yaml,
            Some("json") => SourceKind::Json,
            _ => SourceKind::Skip,
        }
    }
}

/// The source extension for the requested serialization mode.
#[must_use]
pub fn extension(yaml: bool) -> &'static str {
    if yaml { "yml" } else { "json" }
}

/// Replace every character outside `[A-Za-z0-9А-я]` with `_`.
#[must_use]
pub fn safe_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || ('\u{0410}'..='\u{044F}').contains(&c) {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// The filename stem for a document: `<safeName>_<id>` when the document
/// has a non-empty name, otherwise the id hint alone.
#[must_use]
pub fn derive_stem(doc: &Value, id_hint: &str) -> String {
    match (document::name(doc), document::id(doc)) {
        (Some(name), Some(id)) => format!("{}_{id}", safe_filename(name)),
        _ => id_hint.to_string(),
    }
}

/// The full derived filename for a document.
#[must_use]
pub fn derive_filename(doc: &Value, id_hint: &str, ext: &str) -> String {
    format!("{}.{ext}", derive_stem(doc, id_hint))
}
