//! Common error types for kea pipeline tools

use std::path::PathBuf;
use thiserror::Error;

/// Common result type for kea operations
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors across the feature preparation pipeline
///
/// Per-file rejections and per-row drops are not errors: they are recovered
/// locally and surfaced in aggregate by the component that saw them.
#[derive(Error, Debug)]
pub enum Error {
    /// Directory or file does not exist, or has the wrong type
    #[error("Invalid path: {}", .0.display())]
    InvalidPath(PathBuf),

    /// Fold count below one
    #[error("Invalid fold count: {0} (must be >= 1)")]
    InvalidFoldCount(usize),

    /// A label has fewer rows than the requested number of folds
    #[error("Label '{label}' has {rows} rows, fewer than the {folds} requested folds")]
    InsufficientRowsForFolds {
        label: String,
        rows: usize,
        folds: usize,
    },

    /// Malformed ground-truth or feature table content
    #[error("Format error: {0}")]
    Format(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// External classifier could not be run or failed
    #[error("Classifier error: {0}")]
    Classifier(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Run summary serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
