//! Ordered key/value pack backend.
//!
//! A directory in the LevelDB wire format the host consumes: string keys in
//! composite-key order, JSON values. The sibling `LOCK` file is the
//! advisory lock probed by [`crate::lock::is_locked`].

use std::path::Path;

use rusty_leveldb::{DB, LdbIterator, Options, WriteBatch};
use serde_json::Value;

use crate::error::{Error, Result};

/// A set of put/delete operations applied atomically by
/// [`SortedStore::write`].
pub struct Batch {
    inner: WriteBatch,
    len: usize,
}

impl Batch {
    /// Create an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: WriteBatch::new(),
            len: 0,
        }
    }

    /// Queue a put of `value` under `key`.
    ///
    /// # Errors
    /// Returns [`Error::Json`] if the value cannot be serialized.
    pub fn put(&mut self, key: &str, value: &Value) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.inner.put(key.as_bytes(), &bytes);
        self.len += 1;
        Ok(())
    }

    /// Queue a deletion of `key`.
    pub fn delete(&mut self, key: &str) {
        self.inner.delete(key.as_bytes());
        self.len += 1;
    }

    /// Number of queued operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the batch holds no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for Batch {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to an open sorted store.
pub struct SortedStore {
    db: DB,
}

impl SortedStore {
    /// Open the store directory.
    ///
    /// `create` toggles create-if-missing; extraction opens with it off so a
    /// missing pack surfaces as an error instead of an empty directory.
    ///
    /// # Errors
    /// Returns [`Error::Store`] if the backend cannot open the directory.
    pub fn open<P: AsRef<Path>>(path: P, create: bool) -> Result<Self> {
        let mut opt = Options::default();
        opt.create_if_missing = create;
        let db = DB::open(path.as_ref(), opt)?;
        Ok(Self { db })
    }

    /// Point lookup of a single key.
    ///
    /// # Errors
    /// Returns [`Error::Json`] if the stored value is not valid JSON.
    pub fn get(&mut self, key: &str) -> Result<Option<Value>> {
        match self.db.get(key.as_bytes()) {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Look up several keys at once, preserving order.
    ///
    /// # Errors
    /// Returns [`Error::Json`] if a stored value is not valid JSON.
    pub fn get_many(&mut self, keys: &[String]) -> Result<Vec<Option<Value>>> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    /// All `(key, value)` pairs in key order.
    ///
    /// # Errors
    /// Returns [`Error::Store`] on iteration failure and [`Error::Json`] on
    /// malformed values.
    pub fn entries(&mut self) -> Result<Vec<(String, Value)>> {
        let mut iter = self.db.new_iter()?;
        let mut out = Vec::new();
        while let Some((key, value)) = iter.next() {
            let key = String::from_utf8(key).map_err(|e| Error::Store(e.to_string()))?;
            out.push((key, serde_json::from_slice(&value)?));
        }
        Ok(out)
    }

    /// All keys in key order.
    ///
    /// # Errors
    /// Returns [`Error::Store`] on iteration failure.
    pub fn keys(&mut self) -> Result<Vec<String>> {
        let mut iter = self.db.new_iter()?;
        let mut out = Vec::new();
        while let Some((key, _)) = iter.next() {
            out.push(String::from_utf8(key).map_err(|e| Error::Store(e.to_string()))?);
        }
        Ok(out)
    }

    /// Apply a batch of puts and deletes atomically.
    ///
    /// # Errors
    /// Returns [`Error::Store`] if the backend rejects the write.
    pub fn write(&mut self, batch: Batch) -> Result<()> {
        self.db.write(batch.inner, true)?;
        Ok(())
    }

    /// Compact the full key range so the write log settles into tables.
    ///
    /// Takes the smallest key from a fresh forward iterator and the largest
    /// from a tail sweep, then range-compacts the inclusive interval. A
    /// store with no entries is left untouched.
    ///
    /// # Errors
    /// Returns [`Error::Store`] if iteration or compaction fails.
    pub fn compact(&mut self) -> Result<()> {
        let Some(first) = self.first_key()? else {
            return Ok(());
        };
        let Some(last) = self.last_key()? else {
            return Ok(());
        };
        self.db.compact_range(&first, &last)?;
        Ok(())
    }

    /// Run the backend's recovery routine over a store directory.
    ///
    /// Opening replays the write-ahead log with paranoid checks on;
    /// compacting rewrites the tables.
    ///
    /// # Errors
    /// Returns [`Error::Store`] if recovery fails.
    pub fn repair<P: AsRef<Path>>(path: P) -> Result<()> {
        let mut opt = Options::default();
        opt.create_if_missing = false;
        opt.paranoid_checks = true;
        let db = DB::open(path.as_ref(), opt)?;
        let mut store = Self { db };
        store.compact()?;
        store.close()
    }

    /// Flush and release the store.
    ///
    /// # Errors
    /// Returns [`Error::Store`] if the flush fails.
    pub fn close(mut self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    fn first_key(&mut self) -> Result<Option<Vec<u8>>> {
        let mut iter = self.db.new_iter()?;
        Ok(iter.next().map(|(key, _)| key))
    }

    // The backend's iterators cannot seek to the tail directly, so sweep
    // forward and keep the final key.
    fn last_key(&mut self) -> Result<Option<Vec<u8>>> {
        let mut iter = self.db.new_iter()?;
        let mut last = None;
        while let Some((key, _)) = iter.next() {
            last = Some(key);
        }
        Ok(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_batch_write_and_ordered_iteration() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SortedStore::open(dir.path().join("pack"), true).unwrap();

        let mut batch = Batch::new();
        batch.put("!actors!bbb", &json!({"_id": "bbb"})).unwrap();
        batch.put("!actors!aaa", &json!({"_id": "aaa"})).unwrap();
        batch
            .put("!actors.items!aaa.i1", &json!({"_id": "i1"}))
            .unwrap();
        assert_eq!(batch.len(), 3);
        store.write(batch).unwrap();

        let entries = store.entries().unwrap();
        let keys: Vec<_> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["!actors!aaa", "!actors.items!aaa.i1", "!actors!bbb"]);

        assert_eq!(
            store.get("!actors!aaa").unwrap(),
            Some(json!({"_id": "aaa"}))
        );
        assert_eq!(store.get("!actors!zzz").unwrap(), None);

        let found = store
            .get_many(&["!actors!bbb".to_string(), "!actors!zzz".to_string()])
            .unwrap();
        assert_eq!(found, vec![Some(json!({"_id": "bbb"})), None]);

        store.compact().unwrap();
        store.close().unwrap();
    }

    #[test]
    fn test_deletes_apply_with_puts() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SortedStore::open(dir.path().join("pack"), true).unwrap();

        let mut batch = Batch::new();
        batch.put("!items!one", &json!({"_id": "one"})).unwrap();
        store.write(batch).unwrap();

        let mut batch = Batch::new();
        batch.put("!items!two", &json!({"_id": "two"})).unwrap();
        batch.delete("!items!one");
        store.write(batch).unwrap();

        assert_eq!(store.keys().unwrap(), vec!["!items!two".to_string()]);
    }

    #[test]
    fn test_open_without_create_fails_on_missing_pack() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SortedStore::open(dir.path().join("absent"), false).is_err());
    }

    #[test]
    fn test_compact_on_empty_store_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SortedStore::open(dir.path().join("pack"), true).unwrap();
        store.compact().unwrap();
        store.close().unwrap();
    }
}
