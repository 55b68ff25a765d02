//! Top-level server error type.

/// Errors that can take the server down (startup and serve failures).
/// Per-request and per-event failures never surface here -- they are
/// contained at the coordinator and HTTP boundaries.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind the listen address.
    #[error("bind error: {0}")]
    Bind(#[source] std::io::Error),

    /// The HTTP server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(#[source] std::io::Error),

    /// The persistence backend could not be initialized.
    #[error("store error: {0}")]
    Store(#[from] crate::store::StoreError),
}
