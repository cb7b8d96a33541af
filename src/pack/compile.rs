//! Pack build: source tree → pack.

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde_json::Value;

use super::{EntryTransform, KeyPrefix};
use crate::error::{Error, Result};
use crate::hierarchy::walker;
use crate::store::{Batch, LogStore, SortedStore};
use crate::{adventure, document, keys, scan, serializer};

/// Options for [`compile_pack`].
#[derive(Clone, Default)]
pub struct CompileOptions<'a> {
    /// Build a log store (`.db` file) instead of a sorted store.
    pub nedb: bool,
    /// Read YAML sources instead of JSON.
    pub yaml: bool,
    /// Descend into subdirectories of the source tree.
    pub recursive: bool,
    /// Log each packed entry.
    pub log: bool,
    /// Per-entry transformer; return `Ok(false)` to skip an entry.
    pub transform_entry: Option<EntryTransform<'a>>,
}

impl<'a> CompileOptions<'a> {
    /// Create default options: sorted store, JSON, non-recursive.
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

    /// Set the YAML source flag.
    #[must_use]
    pub fn with_yaml(mut self, yaml: bool) -> Self {
        self.yaml = yaml;
        self
    }

    /// Set the recursive scan flag.
    #[must_use]
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Set the per-entry logging flag.
    #[must_use]
    pub fn with_log(mut self, log: bool) -> Self {
        self.log = log;
        self
    }

    /// Set the entry transformer.
    #[must_use]
    pub fn with_transform_entry(mut self, transform: EntryTransform<'a>) -> Self {
        self.transform_entry = Some(transform);
        self
    }
}

/// Compile a directory of source files into a pack.
///
/// # Errors
///
/// Returns [`Error::BadTarget`] if the log-store flag is set and `dest`
/// does not end in `.db`.
/// Returns [`Error::DuplicateKey`] if two source entries share a `_key`;
/// nothing is written in that case.
/// Parse failures are logged with the offending filename and propagated.
pub fn compile_pack<P: AsRef<Path>>(src: P, dest: P, options: &CompileOptions) -> Result<()> {
    let src = src.as_ref();
    let dest = dest.as_ref();
    if options.nedb && dest.extension().is_none_or(|e| e != "db") {
        return Err(Error::BadTarget {
            path: dest.to_path_buf(),
        });
    }

    let files = scan::find_source_files(src, options.yaml, options.recursive)?;
    tracing::debug!("found {} source files in {}", files.len(), src.display());
    let docs = read_sources(&files)?;

    if options.nedb {
        compile_log_store(dest, docs, options)
    } else {
        compile_sorted_store(dest, docs, options)
    }
}

/// Read and parse every source file, in parallel.
fn read_sources(files: &[PathBuf]) -> Result<Vec<(PathBuf, Value)>> {
    files
        .par_iter()
        .map(|path| match serializer::read_document(path) {
            Ok(doc) => Ok((path.clone(), doc)),
            Err(err) => {
                tracing::error!("failed to parse {}", path.display());
                Err(err)
            }
        })
        .collect()
}

/// Take the entry's own `_key`, falling back to the walk path.
fn take_entry_key(doc: &mut Value, ctx: &KeyPrefix, collection: &str) -> Result<(KeyPrefix, String)> {
    let id = document::id(doc).unwrap_or_default().to_string();
    let (next, derived) = ctx.descend(collection, &id);
    match document::take_key(doc) {
        Some(key) => Ok((next, key)),
        None if !id.is_empty() => Ok((next, derived)),
        None => Err(Error::MalformedKey { key: derived }),
    }
}

fn compile_sorted_store(
    pack: &Path,
    docs: Vec<(PathBuf, Value)>,
    options: &CompileOptions,
) -> Result<()> {
    fs::create_dir_all(pack)?;
    let mut store = SortedStore::open(pack, true)?;
    let mut batch = Batch::new();
    let mut seen: HashSet<String> = HashSet::new();

    for (path, mut doc) in docs {
        let Some(key) = document::key(&doc).map(str::to_owned) else {
            tracing::debug!("skipping {}: no _key field", path.display());
            continue;
        };
        if key.starts_with("!adventures") {
            let base = path.parent().unwrap_or_else(|| Path::new(""));
            adventure::reconstruct_adventure(&mut doc, base)?;
        }
        if let Some(transform) = options.transform_entry
            && !transform(&mut doc)?
        {
            continue;
        }
        let collection = keys::root_collection(&key)?.to_string();
        walker::apply(&mut doc, &collection, &KeyPrefix::default(), &mut |d,
                                                                          coll,
                                                                          ctx| {
            let (next, entry_key) = take_entry_key(d, ctx, coll)?;
            if !seen.insert(entry_key.clone()) {
                return Err(Error::DuplicateKey { key: entry_key });
            }
            // Pack value: embedded collections become bare _id references
            let mut value = d.clone();
            walker::map(&mut value, coll, &mut |_, embedded| {
                Ok(embedded.get(document::ID).cloned().unwrap_or(Value::Null))
            })?;
            batch.put(&entry_key, &value)?;
            Ok(next)
        })?;
        if options.log {
            tracing::info!("packed {}", document::id(&doc).unwrap_or(&key));
        }
    }

    // Entries no longer present in the source tree are dropped
    for key in store.keys()? {
        if !seen.contains(&key) {
            batch.delete(&key);
        }
    }
    store.write(batch)?;
    store.compact()?;
    tracing::info!("packed {} entries into {}", seen.len(), pack.display());
    store.close()
}

fn compile_log_store(
    pack: &Path,
    docs: Vec<(PathBuf, Value)>,
    options: &CompileOptions,
) -> Result<()> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut ready = Vec::new();

    for (path, mut doc) in docs {
        let Some(key) = document::key(&doc).map(str::to_owned) else {
            tracing::debug!("skipping {}: no _key field", path.display());
            continue;
        };
        if key.starts_with("!adventures") {
            let base = path.parent().unwrap_or_else(|| Path::new(""));
            adventure::reconstruct_adventure(&mut doc, base)?;
        }
        if key.starts_with("!folders") {
            tracing::debug!(
                "skipping {}: log stores do not support folders",
                path.display()
            );
            continue;
        }
        if let Some(transform) = options.transform_entry
            && !transform(&mut doc)?
        {
            continue;
        }
        // Strip keys at every level; embedded documents stay inline
        let collection = keys::root_collection(&key)?.to_string();
        walker::apply(&mut doc, &collection, &KeyPrefix::default(), &mut |d,
                                                                          coll,
                                                                          ctx| {
            let (next, entry_key) = take_entry_key(d, ctx, coll)?;
            if !seen.insert(entry_key.clone()) {
                return Err(Error::DuplicateKey { key: entry_key });
            }
            Ok(next)
        })?;
        if options.log {
            tracing::info!("packed {}", document::id(&doc).unwrap_or(&key));
        }
        ready.push(doc);
    }

    // Every source validated; only now replace the destination datafile
    match fs::remove_file(pack) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }
    let mut store = LogStore::open(pack, true)?;
    store.set_autocompaction(false);
    for doc in ready {
        store.insert(doc)?;
    }
    store.compact()?;
    tracing::info!("packed {} entries into {}", store.len(), pack.display());
    store.close()
}
