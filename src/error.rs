use std::path::PathBuf;

use thiserror::Error;

/// Failures while reading a dataset from disk.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("dataset not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("I/O error: {source} (path: {})", path.display())]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("{}: missing required column '{column}'", path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("{}: line {line}, column '{column}': {reason}", path.display())]
    MalformedRow {
        path: PathBuf,
        line: u64,
        column: String,
        reason: String,
    },

    #[error("{}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid delimiter {0:?}: must be a single ASCII character")]
    InvalidDelimiter(char),
}

/// Failures while querying a loaded table.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
}

/// Failures while drawing or exporting a chart.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("unsupported output format for {}: expected png, jpg, jpeg, pdf or svg", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("grid needs at least one column")]
    EmptyGrid,

    #[error("drawing failed: {0}")]
    Draw(String),

    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("PDF export failed: {0}")]
    Pdf(String),

    #[error("I/O error: {source} (path: {})", path.display())]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
}

impl RenderError {
    /// Wrap any plotters drawing error.
    pub fn draw<E: std::fmt::Display>(err: E) -> Self {
        RenderError::Draw(err.to_string())
    }
}
