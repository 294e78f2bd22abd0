//! Logging configuration resolved from `GS_LOG`, `GS_LOG_FORMAT` and
//! `RUST_LOG`, with caller overrides applied last.

use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Level for the grading crates. Accepts anything `LevelFilter` parses.
pub const ENV_LOG_LEVEL: &str = "GS_LOG";

/// `human` or `jsonl`.
pub const ENV_LOG_FORMAT: &str = "GS_LOG_FORMAT";

/// Crates a level applies to. Other crates stay quiet.
const LOG_TARGETS: [&str; 3] = ["gs_core", "gs_config", "gs_bundle"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Console lines for someone watching a notebook kernel.
    #[default]
    Human,
    /// One JSON object per event, for autograder pipelines.
    Jsonl,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "human" | "pretty" => Ok(LogFormat::Human),
            "jsonl" | "json" => Ok(LogFormat::Jsonl),
            _ => Err(format!("unknown log format: {s}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Level for the grading crates. `None` hands filtering to `directives`.
    pub level: Option<LevelFilter>,
    /// Raw `RUST_LOG` directives, captured when the config was built.
    pub directives: Option<String>,
    /// Timestamps on human output.
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            format: LogFormat::Human,
            level: None,
            directives: None,
            timestamps: true,
        }
    }
}

impl LogConfig {
    /// Read the environment, then apply `level` and `format` if given.
    pub fn from_env(level: Option<LevelFilter>, format: Option<LogFormat>) -> Self {
        Self::from_lookup(|key| std::env::var(key).ok(), level, format)
    }

    fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        level: Option<LevelFilter>,
        format: Option<LogFormat>,
    ) -> Self {
        // Unparseable values fall back silently; nothing is listening yet.
        let env_level = lookup(ENV_LOG_LEVEL).and_then(|v| v.trim().parse::<LevelFilter>().ok());
        let env_format = lookup(ENV_LOG_FORMAT).and_then(|v| v.parse::<LogFormat>().ok());

        LogConfig {
            format: format.or(env_format).unwrap_or_default(),
            level: level.or(env_level),
            directives: lookup("RUST_LOG").filter(|v| !v.trim().is_empty()),
            timestamps: true,
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LevelFilter) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    /// Filter for the subscriber. An explicit level beats `RUST_LOG`;
    /// with neither, the grading crates log at `info`.
    pub fn env_filter(&self) -> EnvFilter {
        if self.level.is_none() {
            if let Some(filter) = self
                .directives
                .as_deref()
                .and_then(|d| EnvFilter::try_new(d).ok())
            {
                return filter;
            }
        }
        let level = self.level.unwrap_or(LevelFilter::INFO);
        let directives = LOG_TARGETS
            .iter()
            .map(|target| format!("{target}={level}"))
            .collect::<Vec<_>>()
            .join(",");
        EnvFilter::new(directives)
    }
}
