//! Document serialization to and from JSON or YAML source files.

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use serde_json::ser::PrettyFormatter;

use crate::error::{Error, Result};
use crate::naming::SourceKind;

/// JSON output settings.
#[derive(Debug, Clone)]
pub struct JsonOptions {
    /// Number of spaces per indent level.
    pub indent: usize,
}

impl Default for JsonOptions {
    fn default() -> Self {
        Self { indent: 2 }
    }
}

/// YAML output settings.
#[derive(Debug, Clone, Default)]
pub struct YamlOptions {
    /// Emit a leading `---` document marker.
    pub explicit_start: bool,
}

/// Parse a document from source text.
///
/// # Errors
/// Returns [`Error::Json`] or [`Error::Yaml`] if the text is malformed.
pub fn parse_document(content: &str, kind: SourceKind) -> Result<Value> {
    match kind {
        SourceKind::Yaml => Ok(serde_yaml::from_str(content)?),
        _ => Ok(serde_json::from_str(content)?),
    }
}

/// Read a document from disk, parsing by extension.
///
/// # Errors
/// Returns [`Error::UnsupportedExtension`] for extensions that are neither
/// JSON nor YAML, and a parse error if the contents are malformed.
pub fn read_document<P: AsRef<Path>>(path: P) -> Result<Value> {
    let path = path.as_ref();
    let kind = SourceKind::classify(path);
    if kind == SourceKind::Skip {
        return Err(Error::UnsupportedExtension {
            path: path.to_path_buf(),
        });
    }
    let content = fs::read_to_string(path)?;
    parse_document(&content, kind)
}

/// Serialize a document to source text.
///
/// JSON output uses the configured indent and ends with a newline. YAML
/// output optionally carries a `---` document marker.
///
/// # Errors
/// Returns an error if serialization fails.
pub fn serialize_document(
    doc: &Value,
    yaml: bool,
    yaml_options: &YamlOptions,
    json_options: &JsonOptions,
) -> Result<String> {
    if yaml {
        let body = serde_yaml::to_string(doc)?;
        let mut out = if yaml_options.explicit_start {
            format!("---\n{body}")
        } else {
            body
        };
        if !out.ends_with('\n') {
            out.push('\n');
        }
        return Ok(out);
    }

    let indent = " ".repeat(json_options.indent);
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(indent.as_bytes());
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    doc.serialize(&mut ser)?;
    buf.push(b'\n');
    // Serializer output is valid UTF-8 by construction
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Write a document to disk, creating parent directories as needed.
///
/// # Errors
/// Returns an error if serialization or file writing fails.
pub fn write_document<P: AsRef<Path>>(
    doc: &Value,
    path: P,
    yaml: bool,
    yaml_options: &YamlOptions,
    json_options: &JsonOptions,
) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = serialize_document(doc, yaml, yaml_options, json_options)?;
    fs::write(path, content)?;
    Ok(())
}

/// Write raw bytes to disk, creating parent directories as needed.
///
/// Used when the volatile-diff gate decides an existing file should survive
/// byte-for-byte.
///
/// # Errors
/// Returns an error if file writing fails.
pub fn write_raw<P: AsRef<Path>>(bytes: &[u8], path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)?;
    Ok(())
}
