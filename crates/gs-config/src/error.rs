//! Error types for configuration loading.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while discovering, parsing or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("more than one configuration found in {}: {}", dir.display(), display_paths(found))]
    MultipleConfigs { dir: PathBuf, found: Vec<PathBuf> },

    #[error("Invalid JSON in config file {}: {source}", path.display())]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("config file {} is missing required keys: {}", path.display(), missing.join(", "))]
    MissingKeys {
        path: PathBuf,
        missing: Vec<&'static str>,
    },

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("notebook not specified in config file and {count} notebooks found in {}", dir.display())]
    NotebookUnresolved { dir: PathBuf, count: usize },

    #[error("I/O error reading {}: {source}", path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
