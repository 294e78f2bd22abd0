//! Session error taxonomy.

use crate::audit::AuditError;
use crate::auth::AuthError;
use crate::check::CheckError;
use crate::render::RenderError;
use crate::transport::TransportError;
use gs_bundle::ArchiveError;
use gs_config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by [`GradingSession`](crate::GradingSession) operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("test {question} does not exist at {}", path.display())]
    CheckNotFound { question: String, path: PathBuf },

    #[error("check failed to run: {0}")]
    Check(#[from] CheckError),

    /// No notebook could be determined for export or rendering.
    #[error("{0}")]
    ExportResolution(String),

    #[error("{0}")]
    Precondition(String),

    #[error("export failed: {0}")]
    Archive(#[from] ArchiveError),

    #[error("PDF rendering failed: {0}")]
    Render(#[from] RenderError),

    #[error("submission failed: {0}")]
    Transport(#[from] TransportError),

    #[error("invalid notebook {}: {message}", path.display())]
    InvalidNotebook { path: PathBuf, message: String },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("audit log unavailable: {0}")]
    Audit(#[from] AuditError),
}

impl SessionError {
    /// Stable category name, recorded in audit details.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::Configuration(_) => "configuration",
            SessionError::Auth(_) => "auth",
            SessionError::CheckNotFound { .. } => "check_not_found",
            SessionError::Check(_) => "check",
            SessionError::ExportResolution(_) => "export_resolution",
            SessionError::Precondition(_) => "precondition",
            SessionError::Archive(_) => "archive",
            SessionError::Render(_) => "render",
            SessionError::Transport(_) => "transport",
            SessionError::InvalidNotebook { .. } => "invalid_notebook",
            SessionError::Io { .. } => "io",
            SessionError::Audit(_) => "audit",
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SessionError::Io {
            path: path.into(),
            source,
        }
    }
}
