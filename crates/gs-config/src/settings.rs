//! Session settings resolved once at startup.
//!
//! [`SessionSettings::resolve`] runs the whole pipeline: locate the artifact,
//! parse it, resolve the notebook, and validate remote-service keys.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ConfigError;
use crate::notebook::sole_notebook;
use crate::resolve::{resolve_config_path, ConfigSource};
use crate::schema::{Configuration, RemoteService};
use crate::snapshot::{hash_content, ConfigSnapshot};

/// Configuration resolution options.
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    /// Directory scanned for artifacts and notebooks. Defaults to `.`.
    pub work_dir: PathBuf,
    /// Explicit artifact path (highest priority).
    pub config_path: Option<PathBuf>,
}

impl ConfigOptions {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        ConfigOptions {
            work_dir: work_dir.into(),
            config_path: None,
        }
    }

    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    fn work_dir(&self) -> &Path {
        if self.work_dir.as_os_str().is_empty() {
            Path::new(".")
        } else {
            &self.work_dir
        }
    }
}

/// A parsed artifact with provenance.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Configuration,
    pub path: PathBuf,
    pub source: ConfigSource,
    /// SHA-256 of the raw artifact content.
    pub content_hash: String,
}

impl LoadedConfig {
    /// Read and parse the artifact at `path`.
    pub fn load(path: &Path, source: ConfigSource) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config = Configuration::from_json(path, &content)?;
        Ok(LoadedConfig {
            config,
            path: path.to_path_buf(),
            source,
            content_hash: hash_content(&content),
        })
    }
}

/// Everything a session needs from configuration, validated.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub work_dir: PathBuf,
    pub loaded: Option<LoadedConfig>,
    /// Present only in remote-service mode.
    pub remote: Option<RemoteService>,
    /// Resolved notebook path (absolute or relative to the process cwd).
    pub notebook: Option<PathBuf>,
    pub pregraded_questions: Vec<String>,
}

impl SessionSettings {
    /// Resolve and validate settings for a new session.
    pub fn resolve(options: &ConfigOptions) -> Result<Self, ConfigError> {
        let work_dir = options.work_dir().to_path_buf();
        let (path, source) = resolve_config_path(options.config_path.as_deref(), &work_dir)?;

        let Some(path) = path else {
            debug!(work_dir = %work_dir.display(), "No configuration artifact; local-only mode");
            return Ok(SessionSettings::local_only(work_dir));
        };

        let loaded = LoadedConfig::load(&path, source)?;

        let notebook = match &loaded.config.notebook {
            Some(nb) => work_dir.join(nb),
            None => sole_notebook(&work_dir)?,
        };

        let remote = loaded.config.remote_service(&path)?;
        let pregraded_questions = loaded.config.pregraded_questions.clone();

        debug!(
            config = %path.display(),
            source = %source,
            service_enabled = remote.is_some(),
            notebook = %notebook.display(),
            "Configuration resolved"
        );

        Ok(SessionSettings {
            work_dir,
            loaded: Some(loaded),
            remote,
            notebook: Some(notebook),
            pregraded_questions,
        })
    }

    /// Settings with no artifact at all.
    pub fn local_only(work_dir: impl Into<PathBuf>) -> Self {
        SessionSettings {
            work_dir: work_dir.into(),
            loaded: None,
            remote: None,
            notebook: None,
            pregraded_questions: Vec::new(),
        }
    }

    pub fn service_enabled(&self) -> bool {
        self.remote.is_some()
    }

    /// Path of the loaded artifact, if any.
    pub fn config_path(&self) -> Option<&Path> {
        self.loaded.as_ref().map(|l| l.path.as_path())
    }

    /// Snapshot for the audit trail.
    pub fn snapshot(&self) -> ConfigSnapshot {
        let Some(loaded) = &self.loaded else {
            return ConfigSnapshot::local_only();
        };
        ConfigSnapshot {
            schema_version: crate::CONFIG_SCHEMA_VERSION.to_string(),
            source: loaded.source,
            path: Some(loaded.path.display().to_string()),
            content_hash: Some(loaded.content_hash.clone()),
            service_enabled: self.service_enabled(),
            notebook: self.notebook.as_ref().map(|p| p.display().to_string()),
        }
    }
}
