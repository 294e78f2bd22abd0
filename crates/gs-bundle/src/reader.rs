//! Archive reader for opening and verifying submission exports.

use crate::{ArchiveError, ArchiveManifest, FileEntry, Result, ARCHIVE_SCHEMA_VERSION, MANIFEST_FILE_NAME};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use tracing::{debug, info, warn};
use zip::ZipArchive;

/// Reader for submission archives with verification.
pub struct ArchiveReader<R: Read + Seek> {
    manifest: ArchiveManifest,
    archive: ZipArchive<R>,
    verified: HashMap<String, bool>,
}

impl ArchiveReader<File> {
    /// Open an archive from a file path.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }
}

impl ArchiveReader<Cursor<Vec<u8>>> {
    /// Open an archive from bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_reader(Cursor::new(bytes))
    }
}

impl<R: Read + Seek> ArchiveReader<R> {
    /// Create a reader from any Read + Seek source.
    pub fn from_reader(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let manifest = Self::read_manifest(&mut archive)?;
        manifest.validate()?;

        info!(
            notebook = %manifest.notebook,
            files = manifest.file_count(),
            "Archive opened"
        );

        Ok(Self {
            manifest,
            archive,
            verified: HashMap::new(),
        })
    }

    fn read_manifest(archive: &mut ZipArchive<R>) -> Result<ArchiveManifest> {
        let mut manifest_file = archive
            .by_name(MANIFEST_FILE_NAME)
            .map_err(|_| ArchiveError::MissingFile(MANIFEST_FILE_NAME.to_string()))?;

        let mut json = String::new();
        manifest_file.read_to_string(&mut json)?;

        let manifest = ArchiveManifest::from_json(&json)?;

        if manifest.archive_version != ARCHIVE_SCHEMA_VERSION {
            warn!(
                archive_version = %manifest.archive_version,
                supported = %ARCHIVE_SCHEMA_VERSION,
                "Archive version mismatch"
            );
        }

        Ok(manifest)
    }

    pub fn manifest(&self) -> &ArchiveManifest {
        &self.manifest
    }

    /// List all files in the archive (excluding the manifest).
    pub fn files(&self) -> &[FileEntry] {
        &self.manifest.files
    }

    pub fn has_file(&self, path: &str) -> bool {
        self.manifest.find_file(path).is_some()
    }

    /// Read a file without verification.
    pub fn read_raw(&mut self, path: &str) -> Result<Vec<u8>> {
        let mut file = self
            .archive
            .by_name(path)
            .map_err(|_| ArchiveError::FileNotFound(path.to_string()))?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        debug!(path, bytes = data.len(), "Read file from archive (unverified)");

        Ok(data)
    }

    /// Read a file with checksum verification against the manifest.
    pub fn read_verified(&mut self, path: &str) -> Result<Vec<u8>> {
        let entry = self
            .manifest
            .find_file(path)
            .ok_or_else(|| ArchiveError::FileNotFound(path.to_string()))?
            .clone();

        let data = self.read_raw(path)?;

        let actual = FileEntry::compute_checksum(&data);
        if actual != entry.sha256 {
            return Err(ArchiveError::ChecksumMismatch {
                path: path.to_string(),
                expected: entry.sha256,
                actual,
            });
        }

        self.verified.insert(path.to_string(), true);
        Ok(data)
    }

    pub fn is_verified(&self, path: &str) -> bool {
        self.verified.get(path).copied().unwrap_or(false)
    }

    /// Verify all files in the archive.
    ///
    /// Returns list of paths that failed verification.
    pub fn verify_all(&mut self) -> Vec<String> {
        let paths: Vec<String> = self.manifest.files.iter().map(|f| f.path.clone()).collect();

        let mut failures = Vec::new();
        for path in paths {
            if let Err(e) = self.read_verified(&path) {
                warn!(path = %path, error = %e, "Verification failed");
                failures.push(path);
            }
        }

        failures
    }

    /// Read and parse a JSON file.
    pub fn read_json<T: serde::de::DeserializeOwned>(&mut self, path: &str) -> Result<T> {
        let data = self.read_verified(path)?;
        Ok(serde_json::from_slice(&data)?)
    }
}
