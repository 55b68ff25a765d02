//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding socket frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning an event into JSON).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing fields, or an
    /// unknown event type tag.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// Deflate compression or decompression failed.
    #[error("compression failed: {0}")]
    Compress(#[source] std::io::Error),
}
