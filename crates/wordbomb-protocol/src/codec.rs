//! Encoding of socket frames, including the large-frame compression path.
//!
//! Inbound frames are always JSON text. Outbound frames are JSON text up
//! to [`COMPRESSION_THRESHOLD`] bytes; anything larger (full room
//! snapshots, long rooms lists) is deflate-compressed and sent as a
//! binary frame. Clients inflate binary frames before parsing.

use std::io::Write;

use flate2::write::{DeflateDecoder, DeflateEncoder};
use flate2::Compression;
use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Outbound payloads at or below this many bytes stay as plain text.
pub const COMPRESSION_THRESHOLD: usize = 1024;

/// An encoded outbound frame, ready for the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// Plain JSON text.
    Text(String),
    /// Deflate-compressed JSON.
    Compressed(Vec<u8>),
}

/// Encodes a value as an outbound frame, compressing above the threshold.
pub fn encode_frame<T: Serialize>(value: &T) -> Result<OutboundFrame, ProtocolError> {
    let json = serde_json::to_string(value).map_err(ProtocolError::Encode)?;
    if json.len() <= COMPRESSION_THRESHOLD {
        return Ok(OutboundFrame::Text(json));
    }

    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::fast());
    encoder
        .write_all(json.as_bytes())
        .and_then(|()| encoder.finish())
        .map(OutboundFrame::Compressed)
        .map_err(ProtocolError::Compress)
}

/// Decodes an inbound JSON text frame.
pub fn decode_text<T: DeserializeOwned>(text: &str) -> Result<T, ProtocolError> {
    serde_json::from_str(text).map_err(ProtocolError::Decode)
}

/// Inflates a compressed frame back to JSON and decodes it.
///
/// The server never receives compressed frames from clients; this exists
/// for tests and client SDK parity.
pub fn decode_compressed<T: DeserializeOwned>(data: &[u8]) -> Result<T, ProtocolError> {
    let mut decoder = DeflateDecoder::new(Vec::new());
    let inflated = decoder
        .write_all(data)
        .and_then(|()| decoder.finish())
        .map_err(ProtocolError::Compress)?;
    serde_json::from_slice(&inflated).map_err(ProtocolError::Decode)
}
