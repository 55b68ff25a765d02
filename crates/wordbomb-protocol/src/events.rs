//! The socket event vocabulary: everything clients send and everything the
//! server broadcasts.
//!
//! Events are internally tagged (`{"type": "submitWord", ...}`) so a
//! JavaScript client can switch on `msg.type` directly. Tag and field names
//! are part of the wire contract -- changing them breaks deployed clients.

use serde::{Deserialize, Serialize};

use crate::{PlayerProfile, PlayerSnapshot, RoomId, RoomSnapshot, RoomSummary, Scenario, Settings};

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Payload of `createRoom`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomData {
    /// Client-supplied room ID for idempotent recreate; generated if absent.
    #[serde(default)]
    pub id: Option<RoomId>,
    pub name: String,
    #[serde(default)]
    pub player: PlayerProfile,
    #[serde(default)]
    pub settings: Option<Settings>,
}

/// Every message a client can send over the socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    /// First message on every connection: binds the client-persistent
    /// session token to this socket.
    Register { token: String },

    /// Request the public lobby listing.
    GetRooms,

    CreateRoom {
        data: CreateRoomData,
    },

    JoinRoom {
        room_id: RoomId,
        player_data: PlayerProfile,
        token: String,
        #[serde(default)]
        was_host: bool,
        #[serde(default)]
        staff_token: Option<String>,
    },

    LeaveRoom,

    DeleteRoom {
        room_id: RoomId,
    },

    ToggleReady {
        room_id: RoomId,
    },

    StartGame {
        room_id: RoomId,
        #[serde(default)]
        scenario: Option<Scenario>,
        /// Allowed syllables for the `train skip` scenario.
        #[serde(default)]
        train_syllables: Option<Vec<String>>,
    },

    /// Legacy client-side engines race to pick their own syllable; the
    /// server only honors this outside its control window.
    NewSyllable {
        room_id: RoomId,
        player_index: usize,
    },

    SubmitWord {
        room_id: RoomId,
        word: String,
        /// Client's idea of the syllable. Ignored -- the server validates
        /// against its own.
        #[serde(default)]
        syllable: Option<String>,
        /// Seat the word is played for. Absent means the caller's own
        /// seat; the host sets it to drive a local bot's turn.
        #[serde(default)]
        player_id: Option<String>,
    },

    /// Host-triggered life loss (self-elimination UI, bot management).
    LoseLife {
        room_id: RoomId,
        player_id: String,
    },

    EndGame {
        room_id: RoomId,
    },

    UpdateBotCount {
        room_id: RoomId,
        total_count: usize,
    },

    UpdateSettings {
        room_id: RoomId,
        settings: Settings,
    },

    TypingUpdate {
        room_id: RoomId,
        text: String,
        player_name: String,
        #[serde(default)]
        accepted: bool,
    },

    ChatMessage {
        room_id: RoomId,
        message: String,
        player_name: String,
        #[serde(default)]
        avatar: String,
        #[serde(default)]
        reply_to: Option<String>,
        #[serde(default)]
        staff_token: Option<String>,
        #[serde(default)]
        is_bot: bool,
    },

    /// The current player gives up the turn, costing a life.
    SuicideRequest {
        room_id: RoomId,
    },
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Every message the server emits over the socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    RoomsList {
        rooms: Vec<RoomSummary>,
    },
    RoomCreated {
        room: RoomSnapshot,
    },
    RoomJoined {
        room: RoomSnapshot,
        reconnected: bool,
    },
    JoinError {
        reason: String,
    },
    JoinedAsSpectator {
        room: RoomSnapshot,
    },
    SpectatorsWaiting {
        count: usize,
    },
    PlayerJoined {
        player: PlayerSnapshot,
    },
    PlayerLeft {
        token: String,
        name: String,
        /// Token of the promoted host, when the leaver was hosting.
        new_host: Option<String>,
    },
    PlayerDisconnected {
        token: String,
        name: String,
        game_paused: bool,
    },
    PlayerReconnected {
        token: String,
        name: String,
    },
    PlayerReadyChanged {
        token: String,
        is_ready: bool,
    },
    RoomDeleted {
        room_id: RoomId,
    },
    GameStarted {
        room: RoomSnapshot,
    },
    SyllableUpdate {
        syllable: String,
        player_index: usize,
        player: String,
        round_number: u32,
        /// Number of dictionary words containing the syllable.
        count: u32,
    },
    TimerUpdate {
        remaining: u64,
        total: u64,
    },
    Timeout {
        socket_id: Option<crate::SocketId>,
        player_name: String,
    },
    WordAccepted {
        token: String,
        player_name: String,
        word: String,
        words_found: u32,
    },
    WordRejected {
        reason: String,
        #[serde(default)]
        word: Option<String>,
    },
    PlayerLostLife {
        token: String,
        player_name: String,
        lives_left: u32,
    },
    PlayerEliminated {
        token: String,
        player_name: String,
    },
    TurnChanged {
        player_index: usize,
        token: String,
    },
    GamePaused {
        reason: String,
    },
    GameResumed {
        remaining: u64,
    },
    GameOver {
        winner_token: Option<String>,
        winner_name: Option<String>,
    },
    PromotedToPlayer {
        token: String,
    },
    SettingsUpdated {
        settings: Settings,
    },
    PlayerTyping {
        player_name: String,
        text: String,
        accepted: bool,
    },
    ChatMessage {
        player_name: String,
        avatar: String,
        message: String,
        reply_to: Option<String>,
        /// Staff role of the sender, resolved server-side.
        staff: Option<String>,
        is_bot: bool,
    },
    Banned {
        reason: String,
    },
}
