//! Archive writer for submission exports.
//!
//! Creates ZIP archives with a manifest and checksums.

use crate::{ArchiveError, ArchiveManifest, FileEntry, Result, MANIFEST_FILE_NAME};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Cursor, Seek, Write};
use std::path::Path;
use tracing::{debug, info};
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

/// Role of a file inside a submission archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Notebook,
    Pdf,
    AuditLog,
    Config,
    /// Additional files requested by the student.
    Extra,
}

/// Builder for submission archives.
pub struct ArchiveWriter {
    manifest: ArchiveManifest,
    files: Vec<(String, Vec<u8>)>,
}

impl ArchiveWriter {
    /// Create a new writer for the notebook stored at archive path `notebook`.
    pub fn new(notebook: impl Into<String>) -> Self {
        Self {
            manifest: ArchiveManifest::new(notebook),
            files: Vec::new(),
        }
    }

    pub fn with_assignment_id(mut self, assignment_id: impl Into<String>) -> Self {
        self.manifest = self.manifest.with_assignment_id(assignment_id);
        self
    }

    pub fn with_tool_version(mut self, version: impl Into<String>) -> Self {
        self.manifest = self.manifest.with_tool_version(version);
        self
    }

    /// Add in-memory content with automatic checksum.
    pub fn add_file(&mut self, path: impl Into<String>, data: Vec<u8>, kind: FileKind) -> Result<()> {
        let path = path.into();
        if path == MANIFEST_FILE_NAME || self.manifest.find_file(&path).is_some() {
            return Err(ArchiveError::DuplicateEntry(path));
        }

        let checksum = FileEntry::compute_checksum(&data);
        let bytes = data.len() as u64;

        debug!(path = %path, bytes, kind = ?kind, "Added file to archive");

        self.manifest.add_file(FileEntry::new(&path, checksum, bytes, kind));
        self.files.push((path, data));
        Ok(())
    }

    /// Read `source` from disk and store it under `archive_path`.
    pub fn add_path(
        &mut self,
        archive_path: impl Into<String>,
        source: &Path,
        kind: FileKind,
    ) -> Result<()> {
        let data = std::fs::read(source).map_err(|e| ArchiveError::SourceFile {
            path: source.to_path_buf(),
            source: e,
        })?;
        self.add_file(archive_path, data, kind)
    }

    pub fn manifest(&self) -> &ArchiveManifest {
        &self.manifest
    }

    /// Get total size in bytes before compression.
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|(_, data)| data.len() as u64).sum()
    }

    /// Get file count (not including manifest).
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Write the archive to a file.
    pub fn write(mut self, path: &Path) -> Result<ArchiveManifest> {
        let file = File::create(path)?;
        self.write_archive(file)?;

        info!(
            path = %path.display(),
            files = self.files.len(),
            bytes = self.total_bytes(),
            "Archive written"
        );

        Ok(self.manifest)
    }

    /// Write the archive to a byte vector (for in-memory use).
    pub fn write_to_vec(mut self) -> Result<(Vec<u8>, ArchiveManifest)> {
        let mut buffer = Cursor::new(Vec::new());
        self.write_archive(&mut buffer)?;
        let bytes = buffer.into_inner();

        info!(
            files = self.files.len(),
            compressed_bytes = bytes.len(),
            uncompressed_bytes = self.total_bytes(),
            "Archive written to memory"
        );

        Ok((bytes, self.manifest))
    }

    fn write_archive<W: Write + Seek>(&mut self, sink: W) -> Result<()> {
        if self.files.is_empty() {
            return Err(ArchiveError::EmptyArchive);
        }

        // Sort files for deterministic ordering
        self.manifest.sort_files();
        self.files.sort_by(|a, b| a.0.cmp(&b.0));

        let manifest_json = self.manifest.to_json()?;

        let mut zip = ZipWriter::new(sink);
        let options: FileOptions<'_, ()> = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);

        zip.start_file(MANIFEST_FILE_NAME, options)?;
        zip.write_all(manifest_json.as_bytes())?;

        for (file_path, data) in &self.files {
            zip.start_file(file_path.as_str(), options)?;
            zip.write_all(data)?;
        }

        zip.finish()?;
        Ok(())
    }
}
