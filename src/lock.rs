//! Advisory pack-lock probe.

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::Result;

/// Test whether another process holds `path` open for writing.
///
/// Attempts a write-open: success or a missing file mean unlocked; a busy
/// error means locked.
///
/// # Errors
/// Propagates any other IO error.
pub fn is_locked<P: AsRef<Path>>(path: P) -> Result<bool> {
    match OpenOptions::new().write(true).open(path.as_ref()) {
        Ok(file) => {
            drop(file);
            Ok(false)
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) if err.kind() == ErrorKind::ResourceBusy => Ok(true),
        Err(err) => Err(err.into()),
    }
}
