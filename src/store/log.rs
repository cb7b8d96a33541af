//! Append-only single-file pack backend.
//!
//! One JSON record per line, keyed by `_id`, with embedded subdocuments
//! kept inline. Updates append a fresh line; removals append a
//! `{"$$deleted":true,"_id":…}` tombstone; on load, later lines win.
//! Compaction rewrites the datafile with exactly one line per live
//! document via a temp-file-and-rename, so a crash never loses the old
//! datafile.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use rand::Rng;
use rand::distributions::Alphanumeric;
use serde_json::{Value, json};

use crate::document;
use crate::error::{Error, Result};

/// Stale lines tolerated before an automatic rewrite.
const AUTOCOMPACT_THRESHOLD: usize = 64;

/// Handle to an open log store.
pub struct LogStore {
    path: PathBuf,
    file: File,
    docs: Vec<(String, Value)>,
    stale: usize,
    autocompact: bool,
}

impl LogStore {
    /// Open a log store datafile, loading any existing records.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if the file is missing and `create` is off,
    /// [`Error::Json`] on a malformed line, and [`Error::MalformedRecord`]
    /// on a line that is not a JSON object.
    pub fn open<P: AsRef<Path>>(path: P, create: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut docs: Vec<(String, Value)> = Vec::new();
        let mut lines = 0usize;

        match File::open(&path) {
            Ok(existing) => {
                for line in BufReader::new(existing).lines() {
                    let line = line?;
                    if line.trim().is_empty() {
                        continue;
                    }
                    lines += 1;
                    let record: Value = serde_json::from_str(&line)?;
                    if !record.is_object() {
                        return Err(Error::MalformedRecord { path });
                    }
                    if record.get("$$indexCreated").is_some() {
                        continue;
                    }
                    let id = document::id(&record).unwrap_or_default().to_string();
                    if record.get("$$deleted").is_some() {
                        docs.retain(|(existing_id, _)| *existing_id != id);
                        continue;
                    }
                    match docs.iter_mut().find(|(existing_id, _)| *existing_id == id) {
                        Some(slot) => slot.1 = record,
                        None => docs.push((id, record)),
                    }
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound && create => {}
            Err(err) => return Err(err.into()),
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let stale = lines.saturating_sub(docs.len());
        Ok(Self {
            path,
            file,
            docs,
            stale,
            autocompact: true,
        })
    }

    /// All live documents in datafile order.
    #[must_use]
    pub fn find_all(&self) -> Vec<Value> {
        self.docs.iter().map(|(_, doc)| doc.clone()).collect()
    }

    /// Number of live documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Whether the store holds no live documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Insert a document, assigning a fresh `_id` if it lacks one.
    ///
    /// A record with an already-present `_id` replaces the earlier one,
    /// matching the datafile replay rule.
    ///
    /// # Errors
    /// Returns [`Error::MalformedRecord`] for non-object documents and
    /// [`Error::Io`] if the append fails.
    pub fn insert(&mut self, mut doc: Value) -> Result<()> {
        let Some(obj) = doc.as_object_mut() else {
            return Err(Error::MalformedRecord {
                path: self.path.clone(),
            });
        };
        let id = match obj.get(document::ID).and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => {
                let id = generate_id();
                obj.insert(document::ID.to_string(), Value::String(id.clone()));
                id
            }
        };
        self.append_line(&doc)?;
        match self.docs.iter_mut().find(|(existing, _)| *existing == id) {
            Some(slot) => {
                slot.1 = doc;
                self.stale += 1;
            }
            None => self.docs.push((id, doc)),
        }
        self.maybe_autocompact()
    }

    /// Remove every document matching the predicate. Returns the count.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if a tombstone append fails.
    pub fn remove<F: Fn(&Value) -> bool>(&mut self, predicate: F) -> Result<usize> {
        let doomed: Vec<String> = self
            .docs
            .iter()
            .filter(|(_, doc)| predicate(doc))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &doomed {
            self.append_line(&json!({"$$deleted": true, "_id": id}))?;
        }
        self.docs.retain(|(id, _)| !doomed.contains(id));
        // Each removal leaves the original line plus its tombstone behind
        self.stale += doomed.len() * 2;
        self.maybe_autocompact()?;
        Ok(doomed.len())
    }

    /// Toggle threshold-based automatic compaction.
    pub fn set_autocompaction(&mut self, enabled: bool) {
        self.autocompact = enabled;
    }

    /// Rewrite the datafile with one line per live document.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if the rewrite or rename fails.
    pub fn compact(&mut self) -> Result<()> {
        let temp = temp_path(&self.path);
        {
            let mut out = File::create(&temp)?;
            for (_, doc) in &self.docs {
                out.write_all(serde_json::to_string(doc)?.as_bytes())?;
                out.write_all(b"\n")?;
            }
            out.sync_all()?;
        }
        fs::rename(&temp, &self.path)?;
        self.file = OpenOptions::new().append(true).open(&self.path)?;
        self.stale = 0;
        Ok(())
    }

    /// Flush and release the store.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if the final sync fails.
    pub fn close(self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    fn append_line(&mut self, record: &Value) -> Result<()> {
        self.file.write_all(serde_json::to_string(record)?.as_bytes())?;
        self.file.write_all(b"\n")?;
        Ok(())
    }

    fn maybe_autocompact(&mut self) -> Result<()> {
        if self.autocompact && self.stale >= AUTOCOMPACT_THRESHOLD {
            self.compact()?;
        }
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{name}~"))
}

fn generate_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}
