//! Terminal-record guard for session operations.

use super::entry::{AuditContext, AuditEntry, AuditEventType, SnapshotRecord};
use super::writer::SharedAuditLog;
use super::AuditError;
use crate::check::CheckResult;
use chrono::Utc;
use serde::Serialize;
use std::fmt::Display;
use tracing::{error, info, warn};

/// Guard that writes exactly one terminal audit record for an operation.
///
/// Call [`OperationSpan::complete`] with the operation's outcome. If the
/// guard is dropped without completing (a panic unwinding through it), a
/// failure record is written instead.
#[must_use = "an operation span records nothing until completed or dropped"]
pub struct OperationSpan {
    log: SharedAuditLog,
    entry: Option<AuditEntry>,
}

impl OperationSpan {
    pub fn begin(log: &SharedAuditLog, ctx: &AuditContext, event_type: AuditEventType) -> Self {
        OperationSpan {
            log: log.clone(),
            entry: Some(AuditEntry::new(ctx, event_type)),
        }
    }

    pub fn set_question(&mut self, question: impl Into<String>) {
        if let Some(entry) = self.entry.as_mut() {
            entry.question = Some(question.into());
        }
    }

    pub fn set_snapshot(&mut self, snapshot: SnapshotRecord) {
        if let Some(entry) = self.entry.as_mut() {
            entry.snapshot = Some(snapshot);
        }
    }

    pub fn push_result(&mut self, result: CheckResult) {
        if let Some(entry) = self.entry.as_mut() {
            entry.results.push(result);
        }
    }

    pub fn set_details<T: Serialize>(&mut self, details: &T) {
        if let Some(entry) = self.entry.as_mut() {
            entry.details = serde_json::to_value(details).ok();
        }
    }

    /// Append the terminal record and hand back the operation outcome.
    ///
    /// When the record cannot be written, a successful outcome becomes an
    /// audit error; a failed outcome keeps its own error and the audit
    /// failure is logged.
    pub fn complete<T, E>(mut self, result: Result<T, E>) -> Result<T, E>
    where
        E: Display + From<AuditError>,
    {
        let Some(mut entry) = self.entry.take() else {
            return result;
        };

        entry.ts = Utc::now();
        if let Err(e) = &result {
            entry.success = false;
            entry.error = Some(e.to_string());
        }

        let event_type = entry.event_type;
        let success = entry.success;

        match self.log.append(entry) {
            Ok(_) => {
                if success {
                    info!(event = %event_type, "Session operation completed");
                } else {
                    warn!(event = %event_type, "Session operation failed");
                }
                result
            }
            Err(audit_err) => {
                error!(
                    event = %event_type,
                    error = %audit_err,
                    "Failed to append audit record"
                );
                match result {
                    Ok(_) => Err(E::from(audit_err)),
                    Err(op_err) => Err(op_err),
                }
            }
        }
    }
}

impl Drop for OperationSpan {
    fn drop(&mut self) {
        let Some(entry) = self.entry.take() else {
            return;
        };

        let event_type = entry.event_type;
        let mut entry = entry.with_error("operation did not complete");
        entry.ts = Utc::now();

        if let Err(e) = self.log.append(entry) {
            error!(
                event = %event_type,
                error = %e,
                "Failed to append audit record for abandoned operation"
            );
        }
    }
}
