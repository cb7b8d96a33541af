//! Pack storage backends.
//!
//! Two on-disk formats carry compendium packs: an ordered key/value store
//! (a directory, LevelDB wire format) and an append-only single-file
//! document store (newline-delimited JSON).

mod log;
mod sorted;

pub use log::LogStore;
pub use sorted::{Batch, SortedStore};
