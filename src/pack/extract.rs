//! Pack teardown: pack → source tree.
//!
//! All outputs are written to a per-invocation staging directory under the
//! platform temp root and only published to `dest` once the whole pack has
//! been unpacked, so a failed extraction never disturbs the checked-in
//! tree.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::thread;
use std::time::Duration;

use serde_json::Value;
use walkdir::WalkDir;

use super::{EntryTransform, KeyPrefix, NameTransform};
use crate::error::{Error, Result};
use crate::folders::{self, FolderNode};
use crate::hierarchy::{self, walker};
use crate::serializer::{JsonOptions, YamlOptions};
use crate::store::{LogStore, SortedStore};
use crate::volatile::{self, GateDecision};
use crate::{adventure, document, keys, naming, serializer};

/// Attempts made to clear the destination when `clean` is set.
const CLEAN_ATTEMPTS: usize = 10;

/// Options for [`extract_pack`].
#[derive(Clone, Default)]
pub struct ExtractOptions<'a> {
    /// Read a log store (`.db` file) instead of a sorted store.
    pub nedb: bool,
    /// Write YAML sources instead of JSON.
    pub yaml: bool,
    /// YAML output settings.
    pub yaml_options: YamlOptions,
    /// JSON output settings.
    pub json_options: JsonOptions,
    /// Log each extracted entry.
    pub log: bool,
    /// Primary document type of a log-store pack (e.g. `Actor`).
    pub document_type: Option<String>,
    /// Primary collection of a log-store pack (e.g. `actors`); wins over
    /// `document_type`.
    pub collection: Option<String>,
    /// Remove everything in `dest` before publishing.
    pub clean: bool,
    /// Project the pack's Folder documents into a directory tree.
    pub folders: bool,
    /// Split Adventure documents into one file per bundled document.
    pub expand_adventures: bool,
    /// Keep existing files whose only differences are volatile `_stats`
    /// fields.
    pub omit_volatile: bool,
    /// Per-entry transformer; return `Ok(false)` to skip an entry.
    pub transform_entry: Option<EntryTransform<'a>>,
    /// Override for derived file names.
    pub transform_name: Option<NameTransform<'a>>,
    /// Override for derived folder names.
    pub transform_folder_name: Option<NameTransform<'a>>,
}

impl<'a> ExtractOptions<'a> {
    /// Create default options: sorted store, JSON, flat layout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the log-store backend flag.
    #[must_use]
    pub fn with_nedb(mut self, nedb: bool) -> Self {
        self.nedb = nedb;
        self
    }

    /// Set the YAML output flag.
    #[must_use]
    pub fn with_yaml(mut self, yaml: bool) -> Self {
        self.yaml = yaml;
        self
    }

    /// Set the YAML output settings.
    #[must_use]
    pub fn with_yaml_options(mut self, yaml_options: YamlOptions) -> Self {
        self.yaml_options = yaml_options;
        self
    }

    /// Set the JSON output settings.
    #[must_use]
    pub fn with_json_options(mut self, json_options: JsonOptions) -> Self {
        self.json_options = json_options;
        self
    }

    /// Set the per-entry logging flag.
    #[must_use]
    pub fn with_log(mut self, log: bool) -> Self {
        self.log = log;
        self
    }

    /// Set the primary document type for a log-store pack.
    #[must_use]
    pub fn with_document_type<S: Into<String>>(mut self, document_type: S) -> Self {
        self.document_type = Some(document_type.into());
        self
    }

    /// Set the primary collection for a log-store pack.
    #[must_use]
    pub fn with_collection<S: Into<String>>(mut self, collection: S) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Set the clean-destination flag.
    #[must_use]
    pub fn with_clean(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }

    /// Set the folder-tree projection flag.
    #[must_use]
    pub fn with_folders(mut self, folders: bool) -> Self {
        self.folders = folders;
        self
    }

    /// Set the adventure-expansion flag.
    #[must_use]
    pub fn with_expand_adventures(mut self, expand: bool) -> Self {
        self.expand_adventures = expand;
        self
    }

    /// Set the omit-volatile flag.
    #[must_use]
    pub fn with_omit_volatile(mut self, omit: bool) -> Self {
        self.omit_volatile = omit;
        self
    }

    /// Set the entry transformer.
    #[must_use]
    pub fn with_transform_entry(mut self, transform: EntryTransform<'a>) -> Self {
        self.transform_entry = Some(transform);
        self
    }

    /// Set the file-name transformer.
    #[must_use]
    pub fn with_transform_name(mut self, transform: NameTransform<'a>) -> Self {
        self.transform_name = Some(transform);
        self
    }

    /// Set the folder-name transformer.
    #[must_use]
    pub fn with_transform_folder_name(mut self, transform: NameTransform<'a>) -> Self {
        self.transform_folder_name = Some(transform);
        self
    }
}

/// Extract a pack into a directory of source files.
///
/// # Errors
///
/// Returns [`Error::BadTarget`] if the log-store flag is set and `src`
/// does not end in `.db`, and [`Error::MissingType`] if a log-store
/// extraction cannot resolve its primary collection. On any failure the
/// staging directory is removed and `dest` is left in its pre-operation
/// state.
pub fn extract_pack<P: AsRef<Path>>(src: P, dest: P, options: &ExtractOptions) -> Result<()> {
    let src = src.as_ref();
    let dest = dest.as_ref();
    if options.nedb && src.extension().is_none_or(|e| e != "db") {
        return Err(Error::BadTarget {
            path: src.to_path_buf(),
        });
    }
    let collection = if options.nedb {
        Some(resolve_collection(options)?)
    } else {
        None
    };

    // Stage everything; dest is only touched after a full unpack
    let staging = tempfile::Builder::new().prefix("vttpack-").tempdir()?;
    fs::create_dir_all(dest)?;
    if let Some(collection) = collection {
        extract_log_store(src, staging.path(), dest, &collection, options)?;
    } else {
        extract_sorted_store(src, staging.path(), dest, options)?;
    }

    if options.clean {
        remove_dir_all_retry(dest, CLEAN_ATTEMPTS)?;
    }
    copy_tree(staging.path(), dest)?;
    staging.close()?;
    Ok(())
}

fn resolve_collection(options: &ExtractOptions) -> Result<String> {
    if let Some(collection) = &options.collection {
        return Ok(collection.clone());
    }
    match &options.document_type {
        Some(document_type) => hierarchy::collection_for_type(document_type)
            .map(str::to_owned)
            .ok_or_else(|| Error::UnknownDocumentType {
                document_type: document_type.clone(),
            }),
        None => Err(Error::MissingType),
    }
}

/// Assign `_key` at every level of a document tree.
fn assign_keys(doc: &mut Value, collection: &str) -> Result<()> {
    walker::apply(doc, collection, &KeyPrefix::default(), &mut |d: &mut Value, coll, ctx| {
        let id = document::id(d).unwrap_or_default().to_string();
        let (next, key) = ctx.descend(coll, &id);
        document::set_key(d, key);
        Ok(next)
    })
}

/// Gate and serialize one entry into the staging tree.
fn write_entry(
    doc: &Value,
    collection: &str,
    rel: &str,
    staging: &Path,
    dest: &Path,
    options: &ExtractOptions,
) -> Result<()> {
    let out = staging.join(rel);
    if options.omit_volatile
        && let GateDecision::Keep(bytes) = volatile::check(doc, collection, &dest.join(rel))
    {
        return serializer::write_raw(&bytes, &out);
    }
    serializer::write_document(
        doc,
        &out,
        options.yaml,
        &options.yaml_options,
        &options.json_options,
    )
}

fn extract_log_store(
    pack: &Path,
    staging: &Path,
    dest: &Path,
    collection: &str,
    options: &ExtractOptions,
) -> Result<()> {
    let store = LogStore::open(pack, false)?;
    let ext = naming::extension(options.yaml);
    let mut written = 0usize;
    for mut doc in store.find_all() {
        assign_keys(&mut doc, collection)?;
        if let Some(transform) = options.transform_entry
            && !transform(&mut doc)?
        {
            continue;
        }
        let name = match options.transform_name.and_then(|t| t(&doc)) {
            Some(name) => name,
            None => naming::derive_filename(&doc, document::id(&doc).unwrap_or_default(), ext),
        };
        if options.log {
            tracing::info!("writing {name}");
        }
        write_entry(&doc, collection, &name, staging, dest, options)?;
        written += 1;
    }
    tracing::info!("extracted {written} documents from {}", pack.display());
    store.close()
}

fn extract_sorted_store(
    pack: &Path,
    staging: &Path,
    dest: &Path,
    options: &ExtractOptions,
) -> Result<()> {
    let mut store = SortedStore::open(pack, false)?;
    let ext = naming::extension(options.yaml);

    let folder_map = if options.folders {
        let folder_keys: Vec<String> = store
            .keys()?
            .into_iter()
            .filter(|k| k.starts_with("!folders!"))
            .collect();
        let folder_docs: Vec<Value> = store.get_many(&folder_keys)?.into_iter().flatten().collect();
        folders::build_folder_map(&folder_docs, false, options.transform_folder_name)?
    } else {
        HashMap::new()
    };

    let mut written = 0usize;
    for (key, mut doc) in store.entries()? {
        // Embedded entries are stitched into their parents below
        if keys::is_embedded(&key) {
            continue;
        }
        let collection = keys::root_collection(&key)?.to_string();
        unpack_doc(&mut store, &mut doc, &collection)?;
        if let Some(transform) = options.transform_entry
            && !transform(&mut doc)?
        {
            continue;
        }

        if options.expand_adventures && key.starts_with("!adventures") {
            extract_adventure(&mut doc, &key, &folder_map, staging, dest, options)?;
            written += 1;
            continue;
        }

        let (_, id) = keys::split(&key)?;
        let (name, prefix_with_folder) = match options.transform_name.and_then(|t| t(&doc)) {
            Some(name) => (name, true),
            None => match folder_map.get(id) {
                // A Folder document becomes the marker file of its own directory
                Some(node) => (format!("{}/_Folder.{ext}", node.path), false),
                None => (naming::derive_filename(&doc, &key, ext), true),
            },
        };
        let rel = match document::folder(&doc).and_then(|f| folder_map.get(f)) {
            Some(parent) if prefix_with_folder => format!("{}/{name}", parent.path),
            _ => name,
        };
        if options.log {
            tracing::info!("writing {rel}");
        }
        write_entry(&doc, &collection, &rel, staging, dest, options)?;
        written += 1;
    }
    tracing::info!("extracted {written} documents from {}", pack.display());
    store.close()
}

/// Reassign keys and resolve embedded `_id` references back into full
/// subdocuments.
fn unpack_doc(store: &mut SortedStore, doc: &mut Value, collection: &str) -> Result<()> {
    walker::apply(doc, collection, &KeyPrefix::default(), &mut |d: &mut Value, coll, ctx| {
        let id = document::id(d).unwrap_or_default().to_string();
        let (next, key) = ctx.descend(coll, &id);
        document::set_key(d, key);
        let sublevel = next.sublevel.clone();
        let id_path = next.id.clone();
        walker::map(d, coll, &mut |embedded_collection, entry| match entry {
            Value::String(embedded_id) => {
                let embedded_key = format!("!{sublevel}.{embedded_collection}!{id_path}.{embedded_id}");
                store
                    .get(&embedded_key)?
                    .ok_or_else(|| Error::MissingEmbedded { key: embedded_key })
            }
            inline => Ok(inline),
        })?;
        Ok(next)
    })
}

fn extract_adventure(
    doc: &mut Value,
    key: &str,
    folder_map: &HashMap<String, FolderNode>,
    staging: &Path,
    dest: &Path,
    options: &ExtractOptions,
) -> Result<()> {
    let ext = naming::extension(options.yaml);
    if options.folders {
        // The grouped path is the parent of the adventure directory
        let stem = naming::derive_stem(doc, key);
        let dir = match document::folder(doc).and_then(|f| folder_map.get(f)) {
            Some(owner) => format!("{}/{stem}", owner.path),
            None => stem,
        };
        let parts = adventure::split_adventure(doc, ext, true, options.transform_folder_name)?;
        if options.log {
            tracing::info!("expanding adventure into {dir}/");
        }
        write_entry(
            doc,
            "adventures",
            &format!("{dir}/_Adventure.{ext}"),
            staging,
            dest,
            options,
        )?;
        for part in parts {
            write_entry(
                &part.doc,
                part.collection,
                &format!("{dir}/{}", part.path),
                staging,
                dest,
                options,
            )?;
        }
    } else {
        let name = match options.transform_name.and_then(|t| t(doc)) {
            Some(name) => name,
            None => naming::derive_filename(doc, key, ext),
        };
        let parts = adventure::split_adventure(doc, ext, false, None)?;
        if options.log {
            tracing::info!("expanding adventure {name}");
        }
        write_entry(doc, "adventures", &name, staging, dest, options)?;
        for part in parts {
            write_entry(&part.doc, part.collection, &part.path, staging, dest, options)?;
        }
    }
    Ok(())
}

/// Remove a directory tree, tolerating platform-level handle release
/// delays with a bounded retry.
fn remove_dir_all_retry(path: &Path, attempts: usize) -> Result<()> {
    for attempt in 1..=attempts {
        match fs::remove_dir_all(path) {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
            Err(err) if attempt == attempts => return Err(err.into()),
            Err(err) => {
                tracing::warn!(
                    "failed to remove {} (attempt {attempt}): {err}",
                    path.display()
                );
                thread::sleep(Duration::from_millis(50));
            }
        }
    }
    Ok(())
}

/// Copy the staged tree into the destination, creating directories as
/// needed and overwriting files in place.
fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    for entry in WalkDir::new(from) {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| Error::WalkDir(e.to_string()))?;
        let target = to.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
