//! Grading Session Core Library
//!
//! This library provides the core functionality for interactive grading:
//! - Session construction with local-only and remote-service modes
//! - Running check scripts against a caller-supplied environment
//! - Hash-chained audit log of every session operation
//! - Environment snapshots attached to check records
//! - Export archives, PDF rendering and notebook submission
//! - Structured logging setup

pub mod audit;
pub mod auth;
pub mod check;
pub mod credentials;
pub mod error;
pub mod export;
pub mod logging;
pub mod prompt;
pub mod render;
pub mod session;
pub mod snapshot;
pub mod submit;
pub mod transport;

pub use audit::{verify_log, AuditEntry, AuditEventType, SharedAuditLog, VerificationResult};
pub use auth::{AuthClient, AuthError, AuthOutcome};
pub use check::{CheckEngine, CheckError, CheckResult};
pub use credentials::{Credential, CredentialStore};
pub use error::SessionError;
pub use export::{ExportOptions, ExportSummary};
pub use prompt::{CredentialPrompt, LoginCredentials, PromptError, TerminalPrompt};
pub use render::{NotebookRenderer, PdfOptions, RenderError};
pub use session::{Collaborators, GradingSession, SessionOptions};
pub use snapshot::{snapshot, Binding, Environment, EnvironmentSnapshot, NativeValue};
pub use transport::{HttpTransport, TransportError, UreqTransport};
