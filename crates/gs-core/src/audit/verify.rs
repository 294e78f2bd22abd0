//! Audit log integrity check.
//!
//! Re-reads `.OTTER_LOG` and reports three kinds of damage: lines that are
//! not entries at all, entries whose content no longer matches their own
//! hash, and the first place the `prev_hash` chain stops lining up.
//! Unreadable lines are stepped over the same way the writer steps over
//! them, so a single cut-off write shows up once and does not also break
//! every link after it.

use super::entry::AuditEventType;
use super::scan::scan_log;
use super::writer::GENESIS_HASH;
use super::AuditError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    /// True when no damage of any kind was found.
    pub is_valid: bool,
    pub entries_verified: u64,
    /// Distinct `session_id`s seen among readable entries.
    pub sessions: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broken_link: Option<BrokenLink>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tampered_entries: Vec<TamperedEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unreadable_lines: Vec<UnreadableLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokenLink {
    /// 1-indexed line of the entry whose `prev_hash` is wrong.
    pub line: usize,
    pub expected: String,
    pub actual: String,
    pub break_type: BreakType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakType {
    /// Links to something other than the preceding readable entry.
    ChainMismatch,
    /// The first readable entry does not link to `genesis`.
    InvalidGenesis,
}

/// An entry edited after it was written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TamperedEntry {
    pub line: usize,
    pub event_type: AuditEventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
}

/// A line that does not parse as an entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnreadableLine {
    pub line: usize,
    pub reason: String,
}

/// Check the log at `path`. A missing file is an empty, valid log.
pub fn verify_log(path: &Path) -> Result<VerificationResult, AuditError> {
    let scan = scan_log(path)?;

    let mut expected_prev = GENESIS_HASH.to_string();
    let mut entries_verified = 0u64;
    let mut sessions = BTreeSet::new();
    let mut broken_link = None;
    let mut tampered_entries = Vec::new();
    let mut unreadable_lines = Vec::new();

    for scanned in scan.lines {
        let entry = match scanned.entry {
            Ok(entry) => entry,
            Err(e) => {
                unreadable_lines.push(UnreadableLine {
                    line: scanned.line,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        if !entry.verify_hash() {
            tampered_entries.push(TamperedEntry {
                line: scanned.line,
                event_type: entry.event_type,
                question: entry.question.clone(),
            });
        }

        if broken_link.is_none() && entry.prev_hash != expected_prev {
            broken_link = Some(BrokenLink {
                line: scanned.line,
                expected: expected_prev.clone(),
                actual: entry.prev_hash.clone(),
                break_type: if entries_verified == 0 {
                    BreakType::InvalidGenesis
                } else {
                    BreakType::ChainMismatch
                },
            });
        }

        if let Some(hash) = entry.entry_hash {
            expected_prev = hash;
        }
        if let Some(session_id) = entry.session_id {
            sessions.insert(session_id);
        }
        entries_verified += 1;
    }

    Ok(VerificationResult {
        is_valid: broken_link.is_none()
            && tampered_entries.is_empty()
            && unreadable_lines.is_empty(),
        entries_verified,
        sessions: sessions.len(),
        broken_link,
        tampered_entries,
        unreadable_lines,
    })
}
