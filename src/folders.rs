//! Folder-tree projection for directory-mode extraction.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::Result;
use crate::{document, naming};

/// Projection of one Folder document.
#[derive(Debug, Clone)]
pub struct FolderNode {
    /// Directory name derived for the folder.
    pub name: String,
    /// Parent folder `_id`, if any.
    pub parent: Option<String>,
    /// Document type the folder holds.
    pub kind: Option<String>,
    /// Path from the root parent down to this folder.
    pub path: String,
}

/// Build the folder-id → descriptor map for a set of Folder documents.
///
/// `transform` overrides the derived directory name. With `group_by_type`
/// the folder's document type is prepended to its path (used by adventure
/// expansion). Folders with a missing parent act as roots; a parent cycle
/// is broken at the revisited folder.
///
/// # Errors
/// Currently infallible; the signature leaves room for transformer errors.
pub fn build_folder_map(
    folder_docs: &[Value],
    group_by_type: bool,
    transform: Option<&dyn Fn(&Value) -> Option<String>>,
) -> Result<HashMap<String, FolderNode>> {
    let mut nodes: HashMap<String, FolderNode> = HashMap::new();
    for doc in folder_docs {
        let Some(id) = document::id(doc) else {
            continue;
        };
        let name = transform
            .and_then(|t| t(doc))
            .unwrap_or_else(|| naming::derive_stem(doc, id));
        nodes.insert(
            id.to_string(),
            FolderNode {
                name,
                parent: document::folder(doc).map(str::to_owned),
                kind: doc.get("type").and_then(Value::as_str).map(str::to_owned),
                path: String::new(),
            },
        );
    }

    let ids: Vec<String> = nodes.keys().cloned().collect();
    let mut cache: HashMap<String, String> = HashMap::new();
    for id in &ids {
        let path = resolve_path(id, &nodes, &mut cache, &mut Vec::new(), group_by_type);
        if let Some(node) = nodes.get_mut(id) {
            node.path = path;
        }
    }
    Ok(nodes)
}

fn resolve_path(
    id: &str,
    nodes: &HashMap<String, FolderNode>,
    cache: &mut HashMap<String, String>,
    trail: &mut Vec<String>,
    group_by_type: bool,
) -> String {
    if let Some(path) = cache.get(id) {
        return path.clone();
    }
    let Some(node) = nodes.get(id) else {
        return String::new();
    };
    let rooted = match node.kind.as_deref() {
        Some(kind) if group_by_type => format!("{kind}/{}", node.name),
        _ => node.name.clone(),
    };
    let path = match node.parent.as_deref() {
        // A parent that loops back or does not exist makes this a root
        Some(parent) if nodes.contains_key(parent) && !trail.iter().any(|t| t == id) => {
            trail.push(id.to_string());
            let parent_path = resolve_path(parent, nodes, cache, trail, group_by_type);
            trail.pop();
            format!("{parent_path}/{}", node.name)
        }
        _ => rooted,
    };
    cache.insert(id.to_string(), path.clone());
    path
}
