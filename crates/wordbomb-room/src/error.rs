//! Error types for the room layer.
//!
//! The first three variants are client-facing join codes and keep their
//! historical French wire strings; the rest are internal.

use wordbomb_protocol::RoomId;

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist.
    #[error("Salle introuvable")]
    NotFound(RoomId),

    /// The room has no free player slot.
    #[error("Salle pleine")]
    RoomFull(RoomId),

    /// A game is running and the caller may not enter it.
    #[error("Partie en cours")]
    GameInProgress(RoomId),

    /// The player is not a member of the room.
    #[error("player {token} not in room {room}")]
    NotInRoom { room: RoomId, token: String },

    /// The room is in a state that does not allow this operation.
    #[error("invalid room state: {0}")]
    InvalidState(String),
}

impl RoomError {
    /// The code sent to clients in `joinError` / rejection events.
    pub fn client_code(&self) -> String {
        match self {
            Self::NotFound(_) | Self::RoomFull(_) | Self::GameInProgress(_) => self.to_string(),
            Self::NotInRoom { .. } => "forbidden".to_string(),
            Self::InvalidState(_) => "invalid_state".to_string(),
        }
    }
}
