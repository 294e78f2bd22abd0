//! Notebook discovery in the working directory.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::resolve::list_files_with_extension;

/// File extension of notebook files.
pub const NOTEBOOK_EXTENSION: &str = "ipynb";

/// List notebook files directly inside `dir`, sorted by path.
pub fn discover_notebooks(dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    list_files_with_extension(dir, NOTEBOOK_EXTENSION)
}

/// The unique notebook in `dir`, or an error naming how many were found.
pub fn sole_notebook(dir: &Path) -> Result<PathBuf, ConfigError> {
    let mut notebooks = discover_notebooks(dir)?;
    if notebooks.len() == 1 {
        if let Some(path) = notebooks.pop() {
            return Ok(path);
        }
    }
    Err(ConfigError::NotebookUnresolved {
        dir: dir.to_path_buf(),
        count: notebooks.len(),
    })
}
