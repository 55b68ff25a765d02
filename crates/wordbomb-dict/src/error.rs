//! Error types for the dictionary layer.

use std::path::PathBuf;

/// Errors that can occur while building or mutating the dictionary.
#[derive(Debug, thiserror::Error)]
pub enum DictError {
    /// The dictionary file does not exist.
    #[error("dictionary file not found: {0}")]
    NotFound(PathBuf),

    /// Reading or writing the dictionary file failed.
    #[error("dictionary I/O error: {0}")]
    Io(#[source] std::io::Error),

    /// An admin mutation was attempted with an empty word.
    #[error("word is empty after normalization")]
    EmptyWord,
}
