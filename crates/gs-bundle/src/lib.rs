//! Submission archive writer/reader for grading sessions.
//!
//! An export packages a student's work for hand-in as a ZIP archive containing:
//! - `manifest.json`: Metadata and file listing with SHA-256 checksums
//! - the notebook file
//! - the rendered PDF (optional)
//! - the session audit log (when present)
//! - the configuration artifact (when present)
//! - any extra files the student asked to include
//!
//! # Example
//!
//! ```no_run
//! use gs_bundle::{ArchiveReader, ArchiveWriter, FileKind};
//! use std::path::Path;
//!
//! let mut writer = ArchiveWriter::new("hw01.ipynb");
//! writer.add_path("hw01.ipynb", Path::new("hw01.ipynb"), FileKind::Notebook).unwrap();
//! writer.write(Path::new("hw01.zip")).unwrap();
//!
//! let mut reader = ArchiveReader::open(Path::new("hw01.zip")).unwrap();
//! assert!(reader.verify_all().is_empty());
//! ```

pub mod error;
pub mod manifest;
pub mod reader;
pub mod writer;

pub use error::{ArchiveError, Result};
pub use manifest::{ArchiveManifest, FileEntry, ARCHIVE_SCHEMA_VERSION, MANIFEST_FILE_NAME};
pub use reader::ArchiveReader;
pub use writer::{ArchiveWriter, FileKind};
