//! Core protocol types for wordbomb's wire format.
//!
//! Everything in this module travels on the wire: identifiers, room and
//! player snapshots, and game settings. The server owns richer internal
//! records; these are the shapes clients are allowed to see.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Transport-layer identity of a connection.
///
/// Regenerated on every reconnect -- never use this as player identity.
/// Player identity is the session token, which outlives sockets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SocketId(pub u64);

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sock-{}", self.0)
    }
}

/// A unique identifier for a room.
///
/// Clients may supply their own ID on `createRoom` so a returning host can
/// recreate a room idempotently after a server restart; otherwise the
/// server generates one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

/// Named filter narrowing the candidate syllable set for a game.
///
/// The wire strings are historical and client-facing; do not rename them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scenario {
    /// Only 4-letter syllables.
    #[serde(rename = "4 lettres")]
    FourLetters,
    /// Syllables matched by at most 8 dictionary words.
    #[serde(rename = "sub8")]
    Sub8,
    /// Syllables matched by at most 50 dictionary words.
    #[serde(rename = "sub50")]
    Sub50,
    /// Practice mode restricted to a caller-provided allowed set.
    #[serde(rename = "train skip")]
    TrainSkip,
}

impl Scenario {
    /// Syllable lengths this scenario draws from.
    pub fn allowed_lengths(self) -> &'static [usize] {
        match self {
            Self::FourLetters => &[4],
            Self::Sub8 | Self::Sub50 | Self::TrainSkip => &[2, 3],
        }
    }

    /// Upper bound on word count per syllable, if this scenario has one.
    pub fn count_ceiling(self) -> Option<u32> {
        match self {
            Self::Sub8 => Some(8),
            Self::Sub50 => Some(50),
            Self::FourLetters | Self::TrainSkip => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Host-adjustable room settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Active scenario, if any. `None` means plain random play.
    pub scenario: Option<Scenario>,
    /// Maximum players allowed in the room.
    pub max_players: usize,
    /// Lives each player starts a game with.
    pub starting_lives: u32,
    /// Seconds added to the 8 s base turn, clamped to 0..=10.
    pub extra_turn_seconds: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scenario: None,
            max_players: 6,
            starting_lives: 2,
            extra_turn_seconds: 0,
        }
    }
}

impl Settings {
    /// Clamps out-of-range values so the settings are safe to apply.
    pub fn sanitized(mut self) -> Self {
        self.extra_turn_seconds = self.extra_turn_seconds.min(10);
        self.max_players = self.max_players.clamp(1, 16);
        self.starting_lives = self.starting_lives.clamp(1, 10);
        self
    }

    /// Total turn duration derived from these settings.
    pub fn turn_millis(&self) -> u64 {
        (8 + self.extra_turn_seconds) * 1000
    }
}

// ---------------------------------------------------------------------------
// Client-visible snapshots
// ---------------------------------------------------------------------------

/// Identity data a client supplies when joining or creating a room.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProfile {
    pub name: String,
    #[serde(default)]
    pub avatar: String,
}

/// A player as seen by every client in the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub token: String,
    pub name: String,
    pub avatar: String,
    pub is_host: bool,
    pub is_ready: bool,
    pub lives: u32,
    pub words_found: u32,
    pub is_alive: bool,
    pub disconnected: bool,
    /// Host-driven seat with no connection of its own.
    #[serde(default)]
    pub is_bot: bool,
}

/// A full room view sent on join/create and on game transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub id: RoomId,
    pub name: String,
    pub host_token: String,
    pub players: Vec<PlayerSnapshot>,
    pub settings: Settings,
    pub game_state: String,
    pub current_player_index: usize,
    pub round_number: u32,
}

/// A summary entry for lobby browsing (`getRooms`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub id: RoomId,
    pub name: String,
    pub player_count: usize,
    pub max_players: usize,
    pub game_state: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&SocketId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_socket_id_display() {
        assert_eq!(SocketId(7).to_string(), "sock-7");
    }

    #[test]
    fn test_room_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&RoomId::from("abc123")).unwrap();
        assert_eq!(json, "\"abc123\"");
    }

    #[test]
    fn test_scenario_wire_names_are_historical() {
        assert_eq!(
            serde_json::to_string(&Scenario::FourLetters).unwrap(),
            "\"4 lettres\""
        );
        assert_eq!(serde_json::to_string(&Scenario::Sub8).unwrap(), "\"sub8\"");
        assert_eq!(
            serde_json::to_string(&Scenario::TrainSkip).unwrap(),
            "\"train skip\""
        );
    }

    #[test]
    fn test_scenario_round_trip() {
        for s in [
            Scenario::FourLetters,
            Scenario::Sub8,
            Scenario::Sub50,
            Scenario::TrainSkip,
        ] {
            let json = serde_json::to_string(&s).unwrap();
            let back: Scenario = serde_json::from_str(&json).unwrap();
            assert_eq!(s, back);
        }
    }

    #[test]
    fn test_scenario_allowed_lengths() {
        assert_eq!(Scenario::FourLetters.allowed_lengths(), &[4]);
        assert_eq!(Scenario::Sub8.allowed_lengths(), &[2, 3]);
    }

    #[test]
    fn test_settings_default() {
        let s = Settings::default();
        assert_eq!(s.max_players, 6);
        assert_eq!(s.starting_lives, 2);
        assert_eq!(s.extra_turn_seconds, 0);
        assert!(s.scenario.is_none());
    }

    #[test]
    fn test_settings_turn_millis_includes_extra_seconds() {
        let s = Settings {
            extra_turn_seconds: 3,
            ..Settings::default()
        };
        assert_eq!(s.turn_millis(), 11_000);
    }

    #[test]
    fn test_settings_sanitized_clamps_extra_seconds() {
        let s = Settings {
            extra_turn_seconds: 99,
            ..Settings::default()
        }
        .sanitized();
        assert_eq!(s.extra_turn_seconds, 10);
    }

    #[test]
    fn test_settings_missing_fields_fall_back_to_defaults() {
        let s: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(s, Settings::default());
    }
}
