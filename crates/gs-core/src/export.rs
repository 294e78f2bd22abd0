//! Export options and archive naming.

use crate::render::PdfOptions;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// What to package in an export archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportOptions {
    /// Notebook to export; resolved from configuration when absent.
    pub notebook: Option<PathBuf>,
    /// Archive path; defaults to the notebook path with a `.zip` extension.
    pub export_path: Option<PathBuf>,
    /// Render and include a PDF.
    pub pdf: bool,
    pub pdf_options: PdfOptions,
    /// Extra files to include, relative to the working directory.
    pub files: Vec<PathBuf>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions {
            notebook: None,
            export_path: None,
            pdf: true,
            pdf_options: PdfOptions::default(),
            files: Vec::new(),
        }
    }
}

impl ExportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_notebook(mut self, notebook: impl Into<PathBuf>) -> Self {
        self.notebook = Some(notebook.into());
        self
    }

    pub fn with_export_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.export_path = Some(path.into());
        self
    }

    pub fn with_pdf(mut self, pdf: bool) -> Self {
        self.pdf = pdf;
        self
    }

    pub fn with_pdf_options(mut self, options: PdfOptions) -> Self {
        self.pdf_options = options;
        self
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.files.push(file.into());
        self
    }
}

/// What an export produced. Recorded in the `END_EXPORT` audit entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSummary {
    pub archive: PathBuf,
    pub notebook: PathBuf,
    /// Archive entry names, sorted.
    pub entries: Vec<String>,
    pub total_bytes: u64,
}

/// Archive entry name for `path`: relative to `work_dir`, `/`-separated.
///
/// Paths outside the working directory keep their relative form when they
/// have one and fall back to the file name otherwise.
pub fn archive_name(work_dir: &Path, path: &Path) -> String {
    let relative = match path.strip_prefix(work_dir) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel,
        _ if path.is_relative() => path,
        _ => path.file_name().map(Path::new).unwrap_or(path),
    };

    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
