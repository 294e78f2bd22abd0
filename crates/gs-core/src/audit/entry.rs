//! Audit log entry types and schema.
//!
//! Each audit entry follows a consistent schema with:
//! - Timestamp (ISO-8601 with microseconds)
//! - Event type (init, auth, check, export, submit, ...)
//! - Run context for correlation
//! - Outcome (success flag and error text)
//! - Operation payload (question, results, environment snapshot, details)
//! - Hash chain fields for integrity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::check::CheckResult;

/// Schema version for audit log entries.
pub const AUDIT_SCHEMA_VERSION: &str = "1.0.0";

/// Types of events recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Session construction.
    Init,
    /// Credential resolution against the grading service.
    Auth,
    /// A single question check.
    Check,
    /// Start of a full check run.
    BeginCheckAll,
    /// End of a full check run.
    EndCheckAll,
    /// Start of an export.
    BeginExport,
    /// End of an export.
    EndExport,
    /// Standalone PDF rendering.
    ToPdf,
    /// Notebook submission to the grading service.
    Submit,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::Init => "init",
            AuditEventType::Auth => "auth",
            AuditEventType::Check => "check",
            AuditEventType::BeginCheckAll => "begin_check_all",
            AuditEventType::EndCheckAll => "end_check_all",
            AuditEventType::BeginExport => "begin_export",
            AuditEventType::EndExport => "end_export",
            AuditEventType::ToPdf => "to_pdf",
            AuditEventType::Submit => "submit",
        }
    }
}

impl std::fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a serialized environment snapshot, stored inline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// SHA-256 of the raw snapshot blob (hex).
    pub sha256: String,
    /// Base64-encoded snapshot blob.
    pub blob: String,
    /// Binding names captured in the blob.
    pub captured: Vec<String>,
    /// Binding names that could not be serialized.
    pub unshelved: Vec<String>,
}

/// A single audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Schema version for forward compatibility.
    pub schema_version: String,

    /// Timestamp when the event occurred.
    pub ts: DateTime<Utc>,

    /// Type of event being logged.
    pub event_type: AuditEventType,

    /// Unique ID for the process that wrote the entry.
    pub run_id: String,

    /// Session ID, once a session exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Whether the operation completed without error.
    pub success: bool,

    /// Error text when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Question identifier for check events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,

    /// Ordered per-question results.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<CheckResult>,

    /// Environment snapshot taken for check events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<SnapshotRecord>,

    /// Event-specific structured details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// SHA-256 hash of the previous entry (hex string).
    /// First entry in a log file uses "genesis".
    pub prev_hash: String,

    /// SHA-256 hash of this entry (excluding this field).
    /// Computed after all other fields are set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_hash: Option<String>,
}

impl AuditEntry {
    /// Create a new, successful entry with the given context.
    pub fn new(ctx: &AuditContext, event_type: AuditEventType) -> Self {
        AuditEntry {
            schema_version: AUDIT_SCHEMA_VERSION.to_string(),
            ts: Utc::now(),
            event_type,
            run_id: ctx.run_id.clone(),
            session_id: ctx.session_id.clone(),
            success: true,
            error: None,
            question: None,
            results: Vec::new(),
            snapshot: None,
            details: None,
            prev_hash: String::new(),
            entry_hash: None,
        }
    }

    /// Mark the entry as failed with the given error text.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }

    pub fn with_question(mut self, question: impl Into<String>) -> Self {
        self.question = Some(question.into());
        self
    }

    /// Add structured details to the entry.
    pub fn with_details<T: Serialize>(mut self, details: &T) -> Self {
        self.details = serde_json::to_value(details).ok();
        self
    }

    /// Compute and set the entry hash.
    ///
    /// The hash is computed over the JSON representation of the entry
    /// with `entry_hash` set to None.
    pub fn compute_hash(&mut self) -> Result<(), serde_json::Error> {
        self.entry_hash = None;
        let digest = hash_json(self)?;
        self.entry_hash = Some(digest);
        Ok(())
    }

    /// Hash of the entry contents with `entry_hash` cleared.
    pub fn computed_hash(&self) -> String {
        let mut unhashed = self.clone();
        unhashed.entry_hash = None;
        hash_json(&unhashed).unwrap_or_default()
    }

    /// Verify that the stored entry hash is correct.
    pub fn verify_hash(&self) -> bool {
        match &self.entry_hash {
            Some(stored) => *stored == self.computed_hash(),
            None => false,
        }
    }

    /// Get the entry hash (for chaining).
    pub fn hash(&self) -> &str {
        self.entry_hash.as_deref().unwrap_or("invalid")
    }

    /// Serialize to a single JSON line.
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn hash_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(value)?;
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Context for generating audit entries with consistent IDs.
#[derive(Debug, Clone)]
pub struct AuditContext {
    /// Unique ID for this process.
    pub run_id: String,
    /// Session ID (if a session has been created).
    pub session_id: Option<String>,
}

impl AuditContext {
    pub fn new(run_id: impl Into<String>) -> Self {
        AuditContext {
            run_id: run_id.into(),
            session_id: None,
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}
