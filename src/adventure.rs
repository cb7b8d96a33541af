//! Adventure expansion and reconstruction.
//!
//! An Adventure bundles other primary documents inline. In expanded source
//! form each bundled document lives in its own file and the adventure's
//! arrays hold the file paths instead, relative to the adventure's own
//! file.

use std::path::Path;

use serde_json::Value;

use crate::error::Result;
use crate::hierarchy::{ADVENTURE_COLLECTIONS, type_for_collection};
use crate::{document, folders, naming, serializer};

/// One bundled document split out of an adventure.
#[derive(Debug, Clone)]
pub struct AdventurePart {
    /// The adventure-embedded collection the document came from.
    pub collection: &'static str,
    /// Path recorded in the adventure, relative to the adventure's file.
    pub path: String,
    /// The document itself. It carries no `_key`: only the adventure owns a
    /// pack entry, so a later compile skips these files and inlines them
    /// through [`reconstruct_adventure`] instead.
    pub doc: Value,
}

/// Split an adventure's embedded collections into their own documents.
///
/// Each inline array is replaced by an array of relative path strings.
/// With `grouped` set, bundled documents are laid out under per-type
/// subfolders, honoring the folder documents the adventure itself carries;
/// otherwise every file sits beside the adventure. String entries already
/// present are kept verbatim.
///
/// # Errors
/// Propagates folder-name transformer failures.
pub fn split_adventure(
    doc: &mut Value,
    ext: &str,
    grouped: bool,
    transform_folder_name: Option<&dyn Fn(&Value) -> Option<String>>,
) -> Result<Vec<AdventurePart>> {
    let folder_map = if grouped {
        let folder_docs = doc
            .get("folders")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        folders::build_folder_map(&folder_docs, true, transform_folder_name)?
    } else {
        Default::default()
    };

    let mut parts = Vec::new();
    for &collection in ADVENTURE_COLLECTIONS {
        let Some(entries) = doc.get_mut(collection).and_then(Value::as_array_mut) else {
            continue;
        };
        for entry in entries.iter_mut() {
            if entry.is_string() {
                continue;
            }
            let part = entry.clone();
            let id = document::id(&part).unwrap_or_default().to_string();
            let filename = naming::derive_filename(&part, &id, ext);
            let path = if !grouped {
                filename
            } else if collection == "folders" {
                folder_map
                    .get(id.as_str())
                    .map_or(filename, |node| format!("{}/_Folder.{ext}", node.path))
            } else {
                let group = document::folder(&part)
                    .and_then(|f| folder_map.get(f))
                    .map(|node| node.path.clone())
                    .unwrap_or_else(|| {
                        type_for_collection(collection)
                            .unwrap_or(collection)
                            .to_string()
                    });
                format!("{group}/{filename}")
            };
            *entry = Value::String(path.clone());
            parts.push(AdventurePart {
                collection,
                path,
                doc: part,
            });
        }
    }
    Ok(parts)
}

/// Inline the string-referenced files of an adventure source document.
///
/// For every string entry in an adventure-embedded collection, the file at
/// that path relative to `base_dir` is read and its parsed document
/// substituted back into the array. The file's `_key` is dropped so it
/// never reaches a pack value.
///
/// # Errors
/// Returns an error if a referenced file cannot be read or parsed.
pub fn reconstruct_adventure(doc: &mut Value, base_dir: &Path) -> Result<()> {
    for &collection in ADVENTURE_COLLECTIONS {
        let Some(entries) = doc.get_mut(collection).and_then(Value::as_array_mut) else {
            continue;
        };
        for entry in entries.iter_mut() {
            if let Value::String(rel) = entry {
                let mut sub = serializer::read_document(base_dir.join(rel.as_str()))?;
                let _ = document::take_key(&mut sub);
                *entry = sub;
            }
        }
    }
    Ok(())
}
