//! Wire protocol for wordbomb.
//!
//! This crate defines the language clients and the server speak:
//!
//! - **Types** ([`RoomId`], [`SocketId`], [`Settings`], snapshots) -- the
//!   structures that travel on the wire.
//! - **Events** ([`ClientEvent`], [`ServerEvent`]) -- the tagged socket
//!   vocabulary, one variant per named event.
//! - **Codec** ([`encode_frame`], [`decode_text`]) -- JSON framing with
//!   deflate compression for payloads above 1 KiB.
//!
//! The protocol layer sits between transport (frames) and the game
//! coordinator (state). It knows nothing about rooms, sessions, or the
//! dictionary -- only how messages are shaped.

mod codec;
mod error;
mod events;
mod types;

pub use codec::{
    decode_compressed, decode_text, encode_frame, OutboundFrame, COMPRESSION_THRESHOLD,
};
pub use error::ProtocolError;
pub use events::{ClientEvent, CreateRoomData, ServerEvent};
pub use types::{
    PlayerProfile, PlayerSnapshot, RoomId, RoomSnapshot, RoomSummary, Scenario, Settings, SocketId,
};
