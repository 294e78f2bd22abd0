//! Check-engine seam and check script discovery.

use crate::snapshot::Environment;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by a check engine while running a script.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("failed to read check script {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("check script {} is malformed: {message}", path.display())]
    Malformed { path: PathBuf, message: String },

    #[error("check script {} failed to run: {message}", path.display())]
    Execution { path: PathBuf, message: String },
}

/// Outcome of running one question's check script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub question: String,
    /// Fraction of the question's tests that passed, in `[0, 1]`.
    pub grade: f64,
    /// Human-readable report.
    pub summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,
}

impl CheckResult {
    pub fn new(question: impl Into<String>, grade: f64, summary: impl Into<String>) -> Self {
        CheckResult {
            question: question.into(),
            grade,
            summary: summary.into(),
            failures: Vec::new(),
        }
    }

    pub fn with_failures(mut self, failures: Vec<String>) -> Self {
        self.failures = failures;
        self
    }

    pub fn passed(&self) -> bool {
        self.grade >= 1.0
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary)?;
        for failure in &self.failures {
            write!(f, "\n  {}", failure)?;
        }
        Ok(())
    }
}

/// Executes a check script against an environment.
///
/// The engine may mutate the environment; `check_all` relies on later
/// checks observing those mutations.
pub trait CheckEngine: Send + Sync {
    /// File extension of check scripts, without the dot.
    fn script_extension(&self) -> &str;

    fn run(
        &self,
        script: &Path,
        question: &str,
        env: &mut Environment,
    ) -> Result<CheckResult, CheckError>;
}

/// Script path for `question`: `{test_dir}/{question}.{ext}`.
pub fn script_path(test_dir: &Path, question: &str, extension: &str) -> PathBuf {
    test_dir.join(format!("{question}.{extension}"))
}

/// Initialization and meta files (`__init__`, `__meta__`) are not questions.
fn is_meta_stem(stem: &str) -> bool {
    stem.starts_with("__") || stem.starts_with('.')
}

/// Question names with a check script in `test_dir`, sorted.
pub fn list_questions(test_dir: &Path, extension: &str) -> std::io::Result<Vec<String>> {
    let mut questions = Vec::new();
    for entry in std::fs::read_dir(test_dir)? {
        let path = entry?.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if !is_meta_stem(stem) {
            questions.push(stem.to_string());
        }
    }
    questions.sort();
    Ok(questions)
}
