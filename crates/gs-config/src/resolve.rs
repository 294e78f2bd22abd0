//! Configuration resolution and artifact discovery.
//!
//! Resolution order: explicit path → environment variable → working-directory discovery.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// File extension of configuration artifacts.
pub const CONFIG_EXTENSION: &str = "otter";

/// Environment variable naming an explicit config artifact.
pub const ENV_CONFIG_PATH: &str = "GS_CONFIG";

/// Where the configuration artifact was found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    /// Passed in by the host application.
    Explicit,

    /// Set via environment variable.
    Environment,

    /// Found by scanning the working directory.
    Discovered,

    /// No artifact; local-only mode.
    #[default]
    None,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Explicit => write!(f, "explicit path"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::Discovered => write!(f, "working directory"),
            ConfigSource::None => write!(f, "none"),
        }
    }
}

/// List all configuration artifacts directly inside `dir`, sorted by path.
pub fn discover_config_artifacts(dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    list_files_with_extension(dir, CONFIG_EXTENSION)
}

/// Resolve which configuration artifact (if any) the session should load.
///
/// An explicit path must exist. Discovery fails when the working directory
/// holds more than one artifact.
pub fn resolve_config_path(
    explicit: Option<&Path>,
    work_dir: &Path,
) -> Result<(Option<PathBuf>, ConfigSource), ConfigError> {
    // 1. Explicit path from the host
    if let Some(path) = explicit {
        let path = work_dir.join(path);
        if !path.is_file() {
            return Err(ConfigError::NotFound { path });
        }
        return Ok((Some(path), ConfigSource::Explicit));
    }

    // 2. Environment variable
    if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
        if !env_path.is_empty() {
            let path = work_dir.join(env_path);
            if !path.is_file() {
                return Err(ConfigError::NotFound { path });
            }
            return Ok((Some(path), ConfigSource::Environment));
        }
    }

    // 3. Working-directory discovery
    let mut found = discover_config_artifacts(work_dir)?;
    match found.len() {
        0 => Ok((None, ConfigSource::None)),
        1 => Ok((found.pop(), ConfigSource::Discovered)),
        _ => Err(ConfigError::MultipleConfigs {
            dir: work_dir.to_path_buf(),
            found,
        }),
    }
}

pub(crate) fn list_files_with_extension(
    dir: &Path,
    extension: &str,
) -> Result<Vec<PathBuf>, ConfigError> {
    let entries = std::fs::read_dir(dir).map_err(|e| ConfigError::IoError {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut files = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}
