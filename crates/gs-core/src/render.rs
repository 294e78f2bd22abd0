//! PDF rendering seam.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no PDF renderer is configured for this session")]
    Unavailable,

    #[error("failed to render {}: {message}", notebook.display())]
    Failed { notebook: PathBuf, message: String },
}

/// Options passed through to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfOptions {
    /// Only include cells marked for export.
    pub filtering: bool,
    /// Insert page breaks between filtered regions.
    pub pagebreaks: bool,
}

impl Default for PdfOptions {
    fn default() -> Self {
        PdfOptions {
            filtering: true,
            pagebreaks: true,
        }
    }
}

/// Renders a notebook to PDF and returns the PDF's path.
pub trait NotebookRenderer: Send + Sync {
    fn render_pdf(&self, notebook: &Path, options: &PdfOptions) -> Result<PathBuf, RenderError>;
}

/// Renderer used when none is injected. Always fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableRenderer;

impl NotebookRenderer for UnavailableRenderer {
    fn render_pdf(&self, _: &Path, _: &PdfOptions) -> Result<PathBuf, RenderError> {
        Err(RenderError::Unavailable)
    }
}

/// Conventional output path: the notebook path with a `.pdf` extension.
pub fn default_pdf_path(notebook: &Path) -> PathBuf {
    notebook.with_extension("pdf")
}
