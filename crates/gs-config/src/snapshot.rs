//! Configuration snapshots for the audit trail.
//!
//! A snapshot records which artifact a session was built from and a hash of
//! its exact content, so an audit record can be tied back to the file.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::resolve::ConfigSource;

/// A frozen description of the configuration a session started with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// Schema version of the snapshot.
    pub schema_version: String,

    /// Where the artifact came from.
    pub source: ConfigSource,

    /// Path of the artifact, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 of the artifact content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,

    pub service_enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notebook: Option<String>,
}

impl ConfigSnapshot {
    /// Snapshot for a session without any configuration artifact.
    pub fn local_only() -> Self {
        ConfigSnapshot {
            schema_version: crate::CONFIG_SCHEMA_VERSION.to_string(),
            source: ConfigSource::None,
            path: None,
            content_hash: None,
            service_enabled: false,
            notebook: None,
        }
    }
}

/// Compute SHA-256 hash of content.
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
