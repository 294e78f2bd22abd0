//! Validation for remote-service configuration.

use crate::error::ConfigError;
use crate::schema::Configuration;

/// Keys that must all be present once `endpoint` is set.
pub const REQUIRED_REMOTE_KEYS: [&str; 4] = ["endpoint", "auth", "assignment_id", "class_id"];

/// List the required keys that are absent, in declaration order.
pub fn missing_required_keys(config: &Configuration) -> Vec<&'static str> {
    REQUIRED_REMOTE_KEYS
        .iter()
        .copied()
        .filter(|key| match *key {
            "endpoint" => config.endpoint.is_none(),
            "auth" => config.auth.is_none(),
            "assignment_id" => config.assignment_id.is_none(),
            "class_id" => config.class_id.is_none(),
            _ => false,
        })
        .collect()
}

/// The endpoint must be an absolute http(s) URL.
pub fn validate_endpoint(endpoint: &str) -> Result<(), ConfigError> {
    let rest = endpoint
        .strip_prefix("https://")
        .or_else(|| endpoint.strip_prefix("http://"));

    match rest {
        Some(host) if !host.trim_matches('/').is_empty() => Ok(()),
        _ => Err(ConfigError::InvalidValue {
            field: "endpoint".to_string(),
            message: format!("expected an http(s) URL, got {:?}", endpoint),
        }),
    }
}
