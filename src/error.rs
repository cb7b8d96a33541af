//! Error types for `VttPack`

use std::path::PathBuf;

use thiserror::Error;

/// The error type for `VttPack` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory traversal error.
    #[error("directory walk error: {0}")]
    WalkDir(String),

    // ==================== Pack Target Errors ====================
    /// A log-store operation was pointed at a path without a `.db` extension.
    #[error("log store packs require a .db extension: {path}")]
    BadTarget {
        /// The offending pack path.
        path: PathBuf,
    },

    /// A log-store extraction could not resolve its primary collection.
    #[error("cannot determine the primary collection; pass a document type or collection name")]
    MissingType,

    /// An unrecognized document type was passed to a log-store extraction.
    #[error("unknown document type: {document_type}")]
    UnknownDocumentType {
        /// The document type that has no collection mapping.
        document_type: String,
    },

    // ==================== Key Errors ====================
    /// Two source entries carried the same composite key during a compile.
    #[error("an entry with key \"{key}\" was already packed")]
    DuplicateKey {
        /// The composite key seen twice.
        key: String,
    },

    /// A composite key did not have the `!sublevel!id` shape.
    #[error("malformed composite key: {key}")]
    MalformedKey {
        /// The string that failed to decode.
        key: String,
    },

    /// An embedded-document entry referenced by its parent was not in the pack.
    #[error("missing embedded entry: {key}")]
    MissingEmbedded {
        /// The composite key that was looked up.
        key: String,
    },

    // ==================== Serialization Errors ====================
    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing or serialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A source file had an extension the serializer cannot parse.
    #[error("unsupported source extension: {path}")]
    UnsupportedExtension {
        /// The path with the unrecognized extension.
        path: PathBuf,
    },

    // ==================== Store Errors ====================
    /// Error reported by the sorted-store backend.
    #[error("sorted store error: {0}")]
    Store(String),

    /// A log-store record was not a JSON object.
    #[error("log store record is not an object in {path}")]
    MalformedRecord {
        /// The datafile containing the record.
        path: PathBuf,
    },
}

// Add conversion from walkdir::Error
impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        Error::WalkDir(err.to_string())
    }
}

// Add conversion from the sorted-store backend's status type
impl From<rusty_leveldb::Status> for Error {
    fn from(err: rusty_leveldb::Status) -> Self {
        Error::Store(err.to_string())
    }
}

/// A specialized Result type for `VttPack` operations.
pub type Result<T> = std::result::Result<T, Error>;
