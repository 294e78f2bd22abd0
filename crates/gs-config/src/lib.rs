//! Grading session configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust struct for the `*.otter` configuration artifact
//! - Config resolution (explicit path → env → working-directory discovery)
//! - Required-key validation for remote-service mode
//! - Notebook path resolution
//! - Config snapshots for the audit trail

pub mod error;
pub mod notebook;
pub mod resolve;
pub mod schema;
pub mod settings;
pub mod snapshot;
pub mod validate;

pub use error::ConfigError;
pub use notebook::{discover_notebooks, NOTEBOOK_EXTENSION};
pub use resolve::{discover_config_artifacts, resolve_config_path, ConfigSource, CONFIG_EXTENSION};
pub use schema::{AuthProvider, Configuration, RemoteService};
pub use settings::{ConfigOptions, LoadedConfig, SessionSettings};
pub use snapshot::ConfigSnapshot;
pub use validate::REQUIRED_REMOTE_KEYS;

/// Schema version for configuration snapshots.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
