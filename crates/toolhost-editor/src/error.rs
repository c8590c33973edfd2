//! Editor errors, each folded into a `{success: false, message}` payload by
//! the tool layer.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("Path must be absolute")]
    PathNotAbsolute,

    #[error("File or directory not found: {0}")]
    NotFound(PathBuf),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("{0} parameter is required")]
    MissingParameter(&'static str),

    #[error("old_str was not found in the file")]
    OldStrNotFound,

    #[error("Found {0} occurrences of old_str; it must match exactly one location")]
    OldStrNotUnique(usize),

    #[error("Invalid line number: {line} (file has {lines} lines)")]
    InvalidLineNumber { line: usize, lines: usize },

    #[error("No edit history found for {0}")]
    NoHistory(PathBuf),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}
