//! Error types for the processing pipeline.
//!
//! Everything here is fatal for a run: the pipeline stops, the scratch tree is dropped
//! (and therefore removed) and no output archive is produced, or a partially written
//! one is abandoned.

use std::path::PathBuf;
use thiserror::Error;

/// Failures raised by a [`crate::highlight::Highlighter`].
#[derive(Debug, Error)]
pub enum HighlightError {
    #[error("no syntax available for language `{0}`")]
    UnsupportedLanguage(String),

    #[error("unknown highlighting style `{0}`")]
    UnknownStyle(String),

    #[error("highlighter failed")]
    Syntect(#[from] syntect::Error),
}

/// Pipeline errors.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to read archive `{0}`")]
    ArchiveRead(PathBuf, #[source] zip::result::ZipError),

    #[error("Failed to write archive `{0}`")]
    ArchiveWrite(PathBuf, #[source] zip::result::ZipError),

    #[error("Failed to highlight a code block in `{0}`")]
    Highlight(PathBuf, #[source] HighlightError),

    #[error("I/O error on `{0}`")]
    Io(PathBuf, #[source] std::io::Error),
}
