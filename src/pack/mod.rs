//! Pack build and teardown operations.

mod compile;
mod extract;

pub use compile::{CompileOptions, compile_pack};
pub use extract::{ExtractOptions, extract_pack};

use std::path::Path;

use serde_json::Value;

use crate::error::Result;
use crate::keys;
use crate::store::{LogStore, SortedStore};

/// Entry transformer applied to every primary document.
///
/// Runs after hierarchy packing/unpacking and may mutate the document in
/// place. Returning `Ok(false)` drops the entry from the operation.
pub type EntryTransform<'a> = &'a (dyn Fn(&mut Value) -> Result<bool>);

/// Name transformer: produce a file or folder name for a document, or
/// `None` to fall back to the default naming policy.
pub type NameTransform<'a> = &'a (dyn Fn(&Value) -> Option<String>);

/// Options for [`repair_pack`].
#[derive(Debug, Clone, Default)]
pub struct RepairOptions {
    /// Log progress for each step.
    pub log: bool,
}

/// Run the backing store's recovery routine over a pack.
///
/// A `.db` pack reloads its datafile and compacts it; a sorted-store pack
/// runs the backend's recovery with paranoid checks. Neither compile nor
/// extract invokes this.
///
/// # Errors
/// Returns an error if the pack cannot be opened or rewritten.
pub fn repair_pack<P: AsRef<Path>>(src: P, options: &RepairOptions) -> Result<()> {
    let src = src.as_ref();
    if src.extension().is_some_and(|e| e == "db") {
        if options.log {
            tracing::info!("compacting log store {}", src.display());
        }
        let mut store = LogStore::open(src, false)?;
        store.compact()?;
        store.close()
    } else {
        if options.log {
            tracing::info!("repairing sorted store {}", src.display());
        }
        SortedStore::repair(src)
    }
}

/// Sublevel and id prefixes accumulated while walking a document tree.
#[derive(Clone, Default)]
pub(crate) struct KeyPrefix {
    pub sublevel: String,
    pub id: String,
}

impl KeyPrefix {
    /// Extend the prefixes by one level and produce that level's key.
    pub(crate) fn descend(&self, collection: &str, id: &str) -> (Self, String) {
        let sublevel = keys::join_parts(&[&self.sublevel, collection]);
        let id_path = keys::join_parts(&[&self.id, id]);
        let key = format!("!{sublevel}!{id_path}");
        (
            Self {
                sublevel,
                id: id_path,
            },
            key,
        )
    }
}
