//! Error types for the session layer.

/// Errors that can occur during session bookkeeping.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session exists for the given token.
    #[error("session not found for token {0}")]
    NotFound(String),
}
