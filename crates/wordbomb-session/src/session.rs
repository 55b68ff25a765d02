//! The session record: a player's logical identity on the server.
//!
//! A session is keyed by the client-generated token, which persists
//! across transport reconnects. The socket id changes on every
//! reconnect; the token never does. Rooms reference players by token,
//! sessions reference rooms by id -- no pointers in either direction.

use std::time::Instant;

use wordbomb_protocol::{RoomId, SocketId};

/// A player's logical identity, decoupled from transport identity.
#[derive(Debug, Clone)]
pub struct Session {
    /// Client-generated, persistent across reconnects.
    pub token: String,

    /// The currently bound socket, or `None` while disconnected.
    pub socket: Option<SocketId>,

    /// The room this session is in, if any.
    pub room: Option<RoomId>,

    /// When the socket was last lost.
    ///
    /// Doubles as the grace-window generation counter: every disconnect
    /// stamps a new instant, and each scheduled grace callback captures
    /// the stamp it was created for. A mismatch at fire time means a
    /// newer connection cycle happened and the callback must no-op.
    pub last_disconnect: Option<Instant>,
}

impl Session {
    pub fn new(token: String, socket: SocketId) -> Self {
        Self {
            token,
            socket: Some(socket),
            room: None,
            last_disconnect: None,
        }
    }

    /// `true` while a socket is bound.
    pub fn is_connected(&self) -> bool {
        self.socket.is_some()
    }
}
