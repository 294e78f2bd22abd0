//! Structured logging for grading sessions.
//!
//! Provides dual-mode logging:
//! - Human-readable console output for interactive use
//! - Machine-parseable JSONL for graders and CI pipelines
//!
//! # Usage
//!
//! ```ignore
//! use gs_core::logging::{init_logging, LogConfig};
//!
//! let config = LogConfig::from_env(None, None);
//! init_logging(&config);
//! ```
//!
//! All log output goes to stderr. API keys are logged only as a short
//! SHA-256 fingerprint and passwords are never logged.

pub mod config;

pub use config::{LogConfig, LogFormat, ENV_LOG_FORMAT, ENV_LOG_LEVEL};
pub use tracing_subscriber::filter::LevelFilter;

use std::io::IsTerminal;
use std::sync::OnceLock;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::fmt;

/// Initialize the logging subsystem.
///
/// Returns `false` when a global subscriber was already installed, which
/// happens when several sessions or tests initialize logging.
pub fn init_logging(config: &LogConfig) -> bool {
    let filter = config.env_filter();

    let result = match config.format {
        LogFormat::Human => {
            let use_ansi = std::io::stderr().is_terminal();
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(use_ansi);

            if config.timestamps {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer)
                    .try_init()
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer.without_time())
                    .try_init()
            }
        }
        LogFormat::Jsonl => {
            let json_layer = fmt::layer()
                .json()
                .flatten_event(true)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry()
                .with(filter)
                .with(json_layer)
                .try_init()
        }
    };

    result.is_ok()
}

/// Initialize logging with defaults (for tests and simple cases).
pub fn init_default_logging() -> bool {
    init_logging(&LogConfig::from_env(None, None))
}

/// Generate a unique run ID for this process.
pub fn generate_run_id() -> String {
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    format!("run-{}", &uuid[..12])
}

static RUN_ID: OnceLock<String> = OnceLock::new();

/// Run ID shared by every session in this process.
pub fn process_run_id() -> &'static str {
    RUN_ID.get_or_init(generate_run_id)
}

/// Generate a unique session ID.
pub fn generate_session_id() -> String {
    let ts = chrono::Utc::now().format("%Y%m%d-%H%M%S");
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    format!("gs-{}-{}", ts, &uuid[..6])
}
