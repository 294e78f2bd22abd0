//! Configuration artifact schema.
//!
//! The artifact is a JSON object. Presence of `endpoint` switches the session
//! into remote-service mode, at which point `auth`, `assignment_id` and
//! `class_id` become mandatory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::validate::{missing_required_keys, validate_endpoint};

/// Parsed configuration artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// Base URL of the grading service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Authentication provider name (`google` or `default`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_id: Option<String>,

    /// Notebook path, relative to the working directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notebook: Option<PathBuf>,

    /// Questions graded ahead of time, in the order the instructor listed them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pregraded_questions: Vec<String>,
}

impl Configuration {
    /// Parse configuration content; `path` is only used for error context.
    pub fn from_json(path: &Path, content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Whether the artifact enables remote-service mode.
    pub fn service_enabled(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Extract the validated remote-service block.
    ///
    /// Returns `Ok(None)` in local-only mode.
    pub fn remote_service(&self, path: &Path) -> Result<Option<RemoteService>, ConfigError> {
        if !self.service_enabled() {
            return Ok(None);
        }

        let (Some(endpoint), Some(auth), Some(assignment_id), Some(class_id)) = (
            self.endpoint.clone(),
            self.auth.clone(),
            self.assignment_id.clone(),
            self.class_id.clone(),
        ) else {
            return Err(ConfigError::MissingKeys {
                path: path.to_path_buf(),
                missing: missing_required_keys(self),
            });
        };

        validate_endpoint(&endpoint)?;

        Ok(Some(RemoteService {
            endpoint,
            auth,
            assignment_id,
            class_id,
        }))
    }
}

/// Validated remote-service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteService {
    pub endpoint: String,
    /// Raw provider name; checked against [`AuthProvider`] when authenticating.
    pub auth: String,
    pub assignment_id: String,
    pub class_id: String,
}

impl RemoteService {
    /// Join a route onto the endpoint base URL.
    pub fn url(&self, route: &str) -> String {
        format!(
            "{}/{}",
            self.endpoint.trim_end_matches('/'),
            route.trim_start_matches('/')
        )
    }

    /// `{endpoint}/auth`
    pub fn default_auth_url(&self) -> String {
        self.url("auth")
    }

    /// `{endpoint}/auth/google`
    pub fn google_auth_url(&self) -> String {
        self.url("auth/google")
    }

    /// `{endpoint}/submit`
    pub fn submit_url(&self) -> String {
        self.url("submit")
    }

    /// Parse the configured provider name.
    pub fn provider(&self) -> Option<AuthProvider> {
        self.auth.parse().ok()
    }
}

/// Supported authentication providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    /// External login page; the user pastes the issued key back in.
    Google,
    /// Username/password exchanged for a key at `{endpoint}/auth`.
    Default,
}

impl std::str::FromStr for AuthProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(AuthProvider::Google),
            "default" => Ok(AuthProvider::Default),
            _ => Err(format!("unknown auth provider: {}", s)),
        }
    }
}

impl std::fmt::Display for AuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthProvider::Google => write!(f, "google"),
            AuthProvider::Default => write!(f, "default"),
        }
    }
}
