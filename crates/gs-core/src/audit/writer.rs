//! Audit log writer with hash chain support.
//!
//! The writer maintains the hash chain across process restarts and across
//! other writers appending to the same file: before every append it checks
//! whether the file changed underneath it and, if so, re-reads the tail hash.
//!
//! Lines that are not audit entries (a write cut short, content from another
//! tool) are skipped with a warning and the chain continues from the last
//! readable entry. [`verify_log`](super::verify_log) reports them.

use super::entry::AuditEntry;
use super::scan::scan_log;
use super::{audit_log_path, AuditError};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};
use tracing::{debug, warn};

/// The special hash used for the first entry in a new log file.
pub const GENESIS_HASH: &str = "genesis";

/// The audit log writer.
pub struct AuditLog {
    /// Path to the audit log file.
    path: PathBuf,
    /// Hash of the last entry written (for chaining).
    last_hash: String,
    /// Number of entries in the file.
    entry_count: u64,
    /// File length after our last append; a mismatch means another writer ran.
    known_len: u64,
    /// False when the file ends mid-line; the next append starts a fresh line.
    terminated: bool,
    writer: Option<BufWriter<File>>,
}

struct ChainTail {
    last_hash: String,
    entry_count: u64,
    terminated: bool,
}

impl AuditLog {
    /// Open an existing audit log or prepare to create one at `path`.
    ///
    /// The file itself is created lazily on the first append.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AuditError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| AuditError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let tail = Self::read_chain_tail(&path)?;
        let known_len = file_len(&path)?;

        debug!(
            path = %path.display(),
            entries = tail.entry_count,
            "Audit log opened"
        );

        Ok(AuditLog {
            path,
            last_hash: tail.last_hash,
            entry_count: tail.entry_count,
            known_len,
            terminated: tail.terminated,
            writer: None,
        })
    }

    /// Open the audit log kept in `work_dir`.
    pub fn open_in(work_dir: &Path) -> Result<Self, AuditError> {
        Self::open(audit_log_path(work_dir))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the number of entries in the log file.
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Get the hash of the last entry (for verification).
    pub fn last_hash(&self) -> &str {
        &self.last_hash
    }

    /// Chain, hash and append an entry. Returns the new entry hash.
    ///
    /// Entries carrying a non-finite grade are rejected: JSON has no
    /// representation for them and the line would not read back.
    pub fn write_entry(&mut self, mut entry: AuditEntry) -> Result<String, AuditError> {
        if let Some(result) = entry.results.iter().find(|r| !r.grade.is_finite()) {
            return Err(AuditError::InvalidEntry(format!(
                "grade for {} is not a finite number",
                result.question
            )));
        }
        self.resync_if_changed()?;

        entry.prev_hash = self.last_hash.clone();
        entry
            .compute_hash()
            .map_err(|e| AuditError::Serialization { source: e })?;
        let line = entry
            .to_jsonl()
            .map_err(|e| AuditError::Serialization { source: e })?;

        let path = self.path.clone();
        let separator = if self.terminated { "" } else { "\n" };
        let writer = self.ensure_writer_open()?;
        writeln!(writer, "{separator}{line}")
            .and_then(|_| writer.flush())
            .map_err(|e| AuditError::Io { path, source: e })?;

        self.last_hash = entry.hash().to_string();
        self.entry_count += 1;
        self.terminated = true;
        self.known_len = file_len(&self.path)?;

        debug!(
            event_type = %entry.event_type,
            success = entry.success,
            entries = self.entry_count,
            "Audit entry appended"
        );

        Ok(self.last_hash.clone())
    }

    /// Flush any buffered writes.
    pub fn flush(&mut self) -> Result<(), AuditError> {
        if let Some(ref mut writer) = self.writer {
            writer.flush().map_err(|e| AuditError::Io {
                path: self.path.clone(),
                source: e,
            })?;
        }
        Ok(())
    }

    /// Close the writer (called automatically on drop, but can be called explicitly).
    pub fn close(&mut self) {
        if let Some(ref mut writer) = self.writer {
            let _ = writer.flush();
        }
        self.writer = None;
    }

    fn resync_if_changed(&mut self) -> Result<(), AuditError> {
        let len = file_len(&self.path)?;
        if len == self.known_len {
            return Ok(());
        }

        warn!(
            path = %self.path.display(),
            expected_len = self.known_len,
            actual_len = len,
            "Audit log changed by another writer; re-reading chain tail"
        );

        self.writer = None;
        let tail = Self::read_chain_tail(&self.path)?;
        self.last_hash = tail.last_hash;
        self.entry_count = tail.entry_count;
        self.terminated = tail.terminated;
        self.known_len = len;
        Ok(())
    }

    fn ensure_writer_open(&mut self) -> Result<&mut BufWriter<File>, AuditError> {
        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)
                    .map_err(|e| AuditError::Io {
                        path: self.path.clone(),
                        source: e,
                    })?;
                BufWriter::new(file)
            }
        };
        Ok(self.writer.insert(writer))
    }

    /// Hash and count of the readable entries, skipping damaged lines.
    fn read_chain_tail(path: &Path) -> Result<ChainTail, AuditError> {
        let scan = scan_log(path)?;
        let mut tail = ChainTail {
            last_hash: GENESIS_HASH.to_string(),
            entry_count: 0,
            terminated: scan.terminated,
        };

        for scanned in scan.lines {
            match scanned.entry {
                Ok(entry) => {
                    if let Some(hash) = entry.entry_hash {
                        tail.last_hash = hash;
                    }
                    tail.entry_count += 1;
                }
                Err(e) => warn!(
                    path = %path.display(),
                    line = scanned.line,
                    error = %e,
                    "Skipping unreadable audit log line"
                ),
            }
        }

        Ok(tail)
    }
}

impl Drop for AuditLog {
    fn drop(&mut self) {
        self.close();
    }
}

/// Canonical path of the log file. The parent directory is created so it can
/// be canonicalized before the file exists.
fn registry_key(path: &Path) -> Result<PathBuf, AuditError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let io_err = |source| AuditError::Io {
        path: parent.to_path_buf(),
        source,
    };
    std::fs::create_dir_all(parent).map_err(io_err)?;
    let dir = std::fs::canonicalize(parent).map_err(io_err)?;
    Ok(match path.file_name() {
        Some(name) => dir.join(name),
        None => dir,
    })
}

fn file_len(path: &Path) -> Result<u64, AuditError> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(AuditError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Cloneable handle that serializes appends to one [`AuditLog`].
#[derive(Clone)]
pub struct SharedAuditLog {
    inner: Arc<Mutex<AuditLog>>,
    path: PathBuf,
}

impl SharedAuditLog {
    pub fn new(log: AuditLog) -> Self {
        let path = log.path().to_path_buf();
        SharedAuditLog {
            inner: Arc::new(Mutex::new(log)),
            path,
        }
    }

    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AuditError> {
        AuditLog::open(path).map(Self::new)
    }

    pub fn open_in(work_dir: &Path) -> Result<Self, AuditError> {
        AuditLog::open_in(work_dir).map(Self::new)
    }

    /// The process-wide handle for the log at `path`, opened on first use.
    ///
    /// Every caller naming the same file gets the same lock, so appends from
    /// concurrent sessions in one process never interleave. The handle is
    /// released once the last clone is dropped.
    pub fn for_path(path: impl Into<PathBuf>) -> Result<Self, AuditError> {
        static REGISTRY: OnceLock<Mutex<HashMap<PathBuf, Weak<Mutex<AuditLog>>>>> =
            OnceLock::new();

        let key = registry_key(&path.into())?;
        let mut registry = REGISTRY
            .get_or_init(|| Mutex::new(HashMap::new()))
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(inner) = registry.get(&key).and_then(Weak::upgrade) {
            return Ok(SharedAuditLog { inner, path: key });
        }

        registry.retain(|_, log| log.strong_count() > 0);
        let shared = Self::open(&key)?;
        registry.insert(key, Arc::downgrade(&shared.inner));
        Ok(shared)
    }

    /// Whether both handles serialize through the same lock.
    pub fn shares_lock_with(&self, other: &SharedAuditLog) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an entry under the lock. Returns the new entry hash.
    pub fn append(&self, entry: AuditEntry) -> Result<String, AuditError> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write_entry(entry)
    }

    pub fn flush(&self) -> Result<(), AuditError> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()
    }

    pub fn entry_count(&self) -> u64 {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry_count()
    }
}

impl std::fmt::Debug for SharedAuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedAuditLog")
            .field("path", &self.path)
            .finish()
    }
}
