//! Tamper-evident audit trail for grading sessions.
//!
//! Every session operation appends exactly one terminal record to a JSONL
//! log kept in the session's working directory. Entries are hash-chained:
//! each carries the SHA-256 of its predecessor, so edits, reordering and
//! deletions inside the file are detectable with [`verify_log`].
//!
//! # Design
//!
//! - **Format**: JSON Lines, one entry per line, appended and flushed per write
//! - **Hash chain**: `prev_hash` links to the previous entry; the first entry uses `genesis`
//! - **Sharing**: sessions on one file share a [`SharedAuditLog::for_path`] handle so appends serialize
//! - **Damage**: unreadable lines are skipped when resuming the chain and reported by [`verify_log`]
//! - **Operations**: [`OperationSpan`] guarantees a terminal record on every exit path
//!
//! # Usage
//!
//! ```ignore
//! use gs_core::audit::{AuditContext, AuditEventType, OperationSpan, SharedAuditLog};
//!
//! let log = SharedAuditLog::open_in(work_dir)?;
//! let ctx = AuditContext::new("run-12345");
//!
//! let span = OperationSpan::begin(&log, &ctx, AuditEventType::ToPdf);
//! let result = render();
//! span.complete(result)?;
//! ```

mod entry;
mod scan;
mod span;
mod verify;
mod writer;

pub use entry::{AuditContext, AuditEntry, AuditEventType, SnapshotRecord, AUDIT_SCHEMA_VERSION};
pub use span::OperationSpan;
pub use verify::{verify_log, BreakType, BrokenLink, TamperedEntry, UnreadableLine, VerificationResult};
pub use writer::{AuditLog, SharedAuditLog, GENESIS_HASH};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during audit logging operations.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize audit entry: {source}")]
    Serialization {
        #[source]
        source: serde_json::Error,
    },

    #[error("audit entry rejected: {0}")]
    InvalidEntry(String),
}

/// Audit log filename inside the session working directory.
pub const AUDIT_LOG_FILENAME: &str = ".OTTER_LOG";

/// Default audit log location for a working directory.
pub fn audit_log_path(work_dir: &Path) -> PathBuf {
    work_dir.join(AUDIT_LOG_FILENAME)
}
