//! Source-tree scanning.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::Result;
use crate::naming::SourceKind;

/// Enumerate the JSON or YAML source files under `root`.
///
/// `yaml` selects which classification to collect; `recursive` descends
/// into subdirectories. Results arrive in readdir order; the compile
/// operation is order-independent by contract.
///
/// # Errors
/// Returns [`crate::Error::WalkDir`] if the traversal fails.
pub fn find_source_files<P: AsRef<Path>>(
    root: P,
    yaml: bool,
    recursive: bool,
) -> Result<Vec<PathBuf>> {
    let wanted = if yaml { SourceKind::Yaml } else { SourceKind::Json };
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).max_depth(max_depth) {
        let entry = entry?;
        if entry.file_type().is_file() && SourceKind::classify(entry.path()) == wanted {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
