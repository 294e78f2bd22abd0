//! Archive manifest types and serialization.
//!
//! The manifest is the source of truth for an archive's contents:
//! - Archive metadata (version, timestamp, notebook name)
//! - File listing with SHA-256 checksums and roles

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::writer::FileKind;

/// Current archive schema version.
pub const ARCHIVE_SCHEMA_VERSION: &str = "1.0.0";

/// Manifest file name within the archive.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Archive manifest containing metadata and file checksums.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveManifest {
    /// Archive format version.
    pub archive_version: String,

    /// When the archive was created.
    pub created_at: DateTime<Utc>,

    /// Archive path of the notebook this export was built from.
    pub notebook: String,

    /// Files included in the archive with checksums.
    pub files: Vec<FileEntry>,

    /// Assignment identifier, when the session is configured for one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment_id: Option<String>,

    /// Tool version that created this archive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_version: Option<String>,
}

impl ArchiveManifest {
    /// Create a new manifest for a notebook export.
    pub fn new(notebook: impl Into<String>) -> Self {
        Self {
            archive_version: ARCHIVE_SCHEMA_VERSION.to_string(),
            created_at: Utc::now(),
            notebook: notebook.into(),
            files: Vec::new(),
            assignment_id: None,
            tool_version: None,
        }
    }

    pub fn with_assignment_id(mut self, assignment_id: impl Into<String>) -> Self {
        self.assignment_id = Some(assignment_id.into());
        self
    }

    pub fn with_tool_version(mut self, version: impl Into<String>) -> Self {
        self.tool_version = Some(version.into());
        self
    }

    /// Add a file entry to the manifest.
    pub fn add_file(&mut self, entry: FileEntry) {
        self.files.push(entry);
    }

    /// Get total size of all files in bytes.
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.bytes).sum()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Find a file by archive path.
    pub fn find_file(&self, path: &str) -> Option<&FileEntry> {
        self.files.iter().find(|f| f.path == path)
    }

    /// Files with the given role.
    pub fn files_of_kind(&self, kind: FileKind) -> impl Iterator<Item = &FileEntry> {
        self.files.iter().filter(move |f| f.kind == kind)
    }

    /// Validate the manifest structure.
    pub fn validate(&self) -> crate::Result<()> {
        if self.archive_version != ARCHIVE_SCHEMA_VERSION {
            return Err(crate::ArchiveError::UnsupportedVersion {
                version: self.archive_version.clone(),
                supported: ARCHIVE_SCHEMA_VERSION.to_string(),
            });
        }

        if self.notebook.is_empty() {
            return Err(crate::ArchiveError::CorruptedManifest(
                "notebook is empty".to_string(),
            ));
        }

        for file in &self.files {
            if file.path.is_empty() {
                return Err(crate::ArchiveError::CorruptedManifest(
                    "file entry has empty path".to_string(),
                ));
            }
            if file.sha256.len() != 64 {
                return Err(crate::ArchiveError::CorruptedManifest(format!(
                    "file '{}' has invalid checksum length",
                    file.path
                )));
            }
        }

        Ok(())
    }

    /// Sort files for deterministic ordering.
    pub fn sort_files(&mut self) {
        self.files.sort_by(|a, b| a.path.cmp(&b.path));
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// File entry in the manifest with checksum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path within the archive (relative).
    pub path: String,

    /// SHA-256 checksum (64 hex characters).
    pub sha256: String,

    /// Size in bytes.
    pub bytes: u64,

    /// Role of the file in the submission.
    pub kind: FileKind,
}

impl FileEntry {
    pub fn new(path: impl Into<String>, sha256: impl Into<String>, bytes: u64, kind: FileKind) -> Self {
        Self {
            path: path.into(),
            sha256: sha256.into(),
            bytes,
            kind,
        }
    }

    /// Compute SHA-256 checksum of data.
    pub fn compute_checksum(data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }

    /// Verify the checksum against data.
    pub fn verify(&self, data: &[u8]) -> bool {
        Self::compute_checksum(data) == self.sha256
    }
}
