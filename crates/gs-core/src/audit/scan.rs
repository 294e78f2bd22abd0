//! Line-level reading of an audit log file.

use super::entry::AuditEntry;
use super::AuditError;
use std::path::Path;

/// One non-blank line of the log.
pub(super) struct ScannedLine {
    /// 1-indexed line number.
    pub line: usize,
    /// The parsed entry, or why the line is not one.
    pub entry: Result<AuditEntry, serde_json::Error>,
}

pub(super) struct LogScan {
    pub lines: Vec<ScannedLine>,
    /// Whether the file is empty or ends with a newline. A cut-off final
    /// write leaves this false.
    pub terminated: bool,
}

/// Read every line of `path`. A missing file scans as empty.
///
/// Lines are parsed from raw bytes, so foreign or binary content shows up
/// as unreadable lines instead of failing the whole read.
pub(super) fn scan_log(path: &Path) -> Result<LogScan, AuditError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(LogScan {
                lines: Vec::new(),
                terminated: true,
            })
        }
        Err(e) => {
            return Err(AuditError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    let terminated = bytes.last().map_or(true, |b| *b == b'\n');
    let lines = bytes
        .split(|b| *b == b'\n')
        .enumerate()
        .filter(|(_, raw)| !raw.trim_ascii().is_empty())
        .map(|(idx, raw)| ScannedLine {
            line: idx + 1,
            entry: serde_json::from_slice(raw),
        })
        .collect();

    Ok(LogScan { lines, terminated })
}
