//! Error types for table store access.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while listing, fetching or persisting tables.
#[derive(Debug, Error)]
pub enum StoreError {
    // === Lookup Errors ===
    /// The requested table is not in the store.
    #[error("table not found: {identifier}")]
    NotFound { identifier: String },

    /// The output format is not one the store can write.
    #[error("unsupported output format '{format}'")]
    UnsupportedFormat { format: String },

    // === File System Errors ===
    /// Store directory not found.
    #[error("directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    /// Failed to read directory entries.
    #[error("failed to read directory {path}: {source}")]
    DirectoryRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write or move an output file.
    #[error("failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // === Codec Errors ===
    /// Failed to parse CSV with Polars.
    #[error("failed to parse CSV {path}: {message}")]
    CsvParse { path: PathBuf, message: String },

    /// Failed to serialize a frame.
    #[error("failed to write CSV {path}: {message}")]
    CsvWrite { path: PathBuf, message: String },
}

/// Result type for table store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
