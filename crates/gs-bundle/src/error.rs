//! Error types for archive operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during archive operations.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// I/O error tied to a specific source file
    #[error("failed to read {}: {source}", path.display())]
    SourceFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// ZIP archive error
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Checksum verification failed
    #[error("checksum mismatch for '{path}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    /// Missing required file in archive
    #[error("missing required file: {0}")]
    MissingFile(String),

    /// Unknown or unsupported archive version
    #[error("unsupported archive version: {version} (supported: {supported})")]
    UnsupportedVersion { version: String, supported: String },

    /// Corrupted manifest
    #[error("corrupted manifest: {0}")]
    CorruptedManifest(String),

    /// File not found in archive
    #[error("file not found in archive: {0}")]
    FileNotFound(String),

    /// The same archive path was added twice
    #[error("duplicate archive entry: {0}")]
    DuplicateEntry(String),

    /// Archive is empty
    #[error("archive has no content to write")]
    EmptyArchive,
}

/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;
