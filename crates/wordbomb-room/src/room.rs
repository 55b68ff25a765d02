//! Room and player records plus the in-room game state.
//!
//! A room is a plain record owned by the [`RoomRegistry`](crate::RoomRegistry);
//! all mutation flows through the coordinator while it holds the registry
//! lock. Players are embedded by value and referenced by session token --
//! never by pointer, so reaping a room can never leave a dangling edge.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use wordbomb_protocol::{
    PlayerProfile, PlayerSnapshot, RoomId, RoomSnapshot, RoomSummary, Settings, SocketId,
};
use wordbomb_turn::TurnClock;

/// How long a mid-game leaver may rejoin with their state restored.
pub const RECENTLY_LEFT_TTL: Duration = Duration::from_secs(60);

/// How long after a new syllable the server ignores client `newSyllable`.
pub const SERVER_CONTROL_WINDOW: Duration = Duration::from_secs(3);

/// Minimum spacing between word submissions per session.
pub const SUBMISSION_FLOOR: Duration = Duration::from_millis(800);

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A player embedded in a room.
#[derive(Debug, Clone)]
pub struct Player {
    pub token: String,
    pub socket: Option<SocketId>,
    pub name: String,
    pub avatar: String,
    pub is_host: bool,
    pub is_ready: bool,
    pub lives: u32,
    pub words_found: u32,
    pub is_alive: bool,
    /// Set only after the 8 s grace window, not on raw transport loss.
    pub disconnected: bool,
    /// A host-driven seat: no socket of its own, played via the host's
    /// `submitWord` with a designated `playerId`.
    pub is_bot: bool,
}

impl Player {
    pub fn new(
        token: &str,
        profile: &PlayerProfile,
        socket: Option<SocketId>,
        lives: u32,
        is_host: bool,
    ) -> Self {
        Self {
            token: token.to_string(),
            socket,
            name: profile.name.clone(),
            avatar: profile.avatar.clone(),
            is_host,
            is_ready: is_host,
            lives,
            words_found: 0,
            is_alive: true,
            disconnected: false,
            is_bot: false,
        }
    }

    /// A bot seat. Never disconnected, always ready, no socket.
    pub fn bot(index: usize, lives: u32) -> Self {
        Self {
            token: format!("bot-{index}"),
            socket: None,
            name: format!("Bot {index}"),
            avatar: "bot".to_string(),
            is_host: false,
            is_ready: true,
            lives,
            words_found: 0,
            is_alive: true,
            disconnected: false,
            is_bot: true,
        }
    }

    /// Can this player be handed the turn?
    pub fn can_play(&self) -> bool {
        self.is_alive && self.lives > 0 && !self.disconnected
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            token: self.token.clone(),
            name: self.name.clone(),
            avatar: self.avatar.clone(),
            is_host: self.is_host,
            is_ready: self.is_ready,
            lives: self.lives,
            words_found: self.words_found,
            is_alive: self.is_alive,
            disconnected: self.disconnected,
            is_bot: self.is_bot,
        }
    }
}

/// Snapshot of a player who left mid-game, kept for rejoin.
#[derive(Debug, Clone)]
pub struct LeftPlayer {
    pub player: Player,
    pub left_at: Instant,
}

// ---------------------------------------------------------------------------
// Game state
// ---------------------------------------------------------------------------

/// Lifecycle of a room.
///
/// ```text
/// Lobby ──start──→ Playing ──end──→ Finished ──(immediate)──→ Lobby
/// ```
///
/// `Finished` is transient: `end_game` computes the winner, promotes
/// pending spectators, resets players, and returns to `Lobby` before the
/// handler yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    Lobby,
    Playing,
    Finished,
}

impl RoomPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lobby => "lobby",
            Self::Playing => "playing",
            Self::Finished => "finished",
        }
    }
}

impl std::fmt::Display for RoomPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-game mutable state. Reset on every `start_game`.
#[derive(Debug, Clone, Default)]
pub struct Game {
    pub current_syllable: Option<String>,
    pub current_player: usize,
    pub round_number: u32,
    pub started_at: Option<Instant>,
    /// The single per-round timer. Replaced, never nested.
    pub clock: TurnClock,
    /// Syllables already emitted this game; cleared on pool exhaustion.
    pub used_syllables: HashSet<String>,
    /// Until this instant, client `newSyllable` messages are ignored.
    pub server_controlled_until: Option<Instant>,
    /// Last accepted-or-attempted submission per session token.
    pub last_submission: HashMap<String, Instant>,
    /// Allowed set for the `train skip` scenario.
    pub train_allowed: Option<HashSet<String>>,
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// One room: membership, settings, and the running game.
#[derive(Debug, Clone)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub host_token: String,
    /// The creator's token. Unlike `host_token` this never changes; it
    /// gates mid-game re-entry of the historical host.
    pub original_host_token: String,
    pub players: Vec<Player>,
    /// Arrivals during a game, promoted to players on the next end.
    pub pending_spectators: Vec<Player>,
    pub recently_left: Vec<LeftPlayer>,
    /// Host-reported total including local bots; lobby listings show
    /// `max(players.len(), display_player_count)`.
    pub display_player_count: usize,
    pub settings: Settings,
    pub phase: RoomPhase,
    pub game: Game,
    pub created_at: Instant,
    /// Stamped by `end_game`; drives idle reaping.
    pub finished_at: Option<Instant>,
}

impl Room {
    pub fn player(&self, token: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.token == token)
    }

    pub fn player_mut(&mut self, token: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.token == token)
    }

    pub fn player_index(&self, token: &str) -> Option<usize> {
        self.players.iter().position(|p| p.token == token)
    }

    pub fn is_host(&self, token: &str) -> bool {
        self.host_token == token
    }

    /// The player whose turn it is. `None` only when the room is empty.
    pub fn current_player(&self) -> Option<&Player> {
        self.players.get(self.game.current_player)
    }

    pub fn alive_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_alive && p.lives > 0).count()
    }

    /// Keeps `current_player` a valid index after any membership change.
    pub fn normalize_current_index(&mut self) {
        if self.players.is_empty() {
            self.game.current_player = 0;
        } else {
            self.game.current_player %= self.players.len();
        }
    }

    /// Advances the turn to the next player able to play: a forward
    /// linear scan from `current + 1`, bounded by one full lap.
    ///
    /// Returns the new index, or `None` when nobody can play.
    pub fn advance_to_next_alive(&mut self) -> Option<usize> {
        let n = self.players.len();
        if n == 0 {
            return None;
        }
        for step in 1..=n {
            let idx = (self.game.current_player + step) % n;
            if self.players[idx].can_play() {
                self.game.current_player = idx;
                return Some(idx);
            }
        }
        None
    }

    /// Re-points `host_token` at `players[0]` after the host left.
    /// Returns the promoted player's (token, name).
    pub fn promote_first_player(&mut self) -> Option<(String, String)> {
        for p in &mut self.players {
            p.is_host = false;
        }
        let first = self.players.first_mut()?;
        first.is_host = true;
        first.is_ready = true;
        self.host_token = first.token.clone();
        Some((first.token.clone(), first.name.clone()))
    }

    /// Drops rejoin snapshots older than [`RECENTLY_LEFT_TTL`].
    pub fn prune_recently_left(&mut self, now: Instant) {
        self.recently_left
            .retain(|lp| now.duration_since(lp.left_at) <= RECENTLY_LEFT_TTL);
    }

    /// A still-fresh rejoin snapshot for `token`, if any. Removes it.
    pub fn take_recently_left(&mut self, token: &str, now: Instant) -> Option<Player> {
        self.prune_recently_left(now);
        let idx = self.recently_left.iter().position(|lp| lp.player.token == token)?;
        Some(self.recently_left.swap_remove(idx).player)
    }

    /// Resets every player for the next lobby phase.
    pub fn reset_players_for_lobby(&mut self) {
        let lives = self.settings.starting_lives;
        for p in &mut self.players {
            p.lives = lives;
            p.words_found = 0;
            p.is_alive = true;
            p.is_ready = p.is_host || p.is_bot;
        }
    }

    /// Adjusts the host-driven bot seats so the room totals `total`
    /// players (capped by `max_players`; human seats are never touched).
    ///
    /// Returns the snapshots of added bots and the removed bot players,
    /// for the membership broadcasts.
    pub fn set_bot_count(&mut self, total: usize) -> (Vec<PlayerSnapshot>, Vec<Player>) {
        self.display_player_count = total;
        let humans = self.players.iter().filter(|p| !p.is_bot).count();
        let desired = total.min(self.settings.max_players).saturating_sub(humans);

        let mut removed = Vec::new();
        while self.players.iter().filter(|p| p.is_bot).count() > desired {
            let Some(pos) = self.players.iter().rposition(|p| p.is_bot) else {
                break;
            };
            if pos < self.game.current_player && self.game.current_player > 0 {
                self.game.current_player -= 1;
            }
            removed.push(self.players.remove(pos));
        }

        let mut added = Vec::new();
        let mut next_index = 1;
        while self.players.iter().filter(|p| p.is_bot).count() < desired {
            while self
                .players
                .iter()
                .any(|p| p.token == format!("bot-{next_index}"))
            {
                next_index += 1;
            }
            let bot = Player::bot(next_index, self.settings.starting_lives);
            added.push(bot.snapshot());
            self.players.push(bot);
        }

        self.normalize_current_index();
        (added, removed)
    }

    /// Moves every pending spectator into the player list (up to the
    /// room cap). Returns their tokens for the promotion broadcasts.
    pub fn promote_pending_spectators(&mut self) -> Vec<String> {
        let mut promoted = Vec::new();
        // Arrival order; anyone past the cap keeps waiting.
        while self.players.len() < self.settings.max_players && !self.pending_spectators.is_empty()
        {
            let mut spectator = self.pending_spectators.remove(0);
            spectator.lives = self.settings.starting_lives;
            spectator.is_alive = true;
            spectator.is_ready = false;
            promoted.push(spectator.token.clone());
            self.players.push(spectator);
        }
        promoted
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            host_token: self.host_token.clone(),
            players: self.players.iter().map(Player::snapshot).collect(),
            settings: self.settings.clone(),
            game_state: self.phase.as_str().to_string(),
            current_player_index: self.game.current_player,
            round_number: self.game.round_number,
        }
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            player_count: self.players.len().max(self.display_player_count),
            max_players: self.settings.max_players,
            game_state: self.phase.as_str().to_string(),
        }
    }

    /// Sockets of every connected player and pending spectator -- the
    /// broadcast set for this room.
    pub fn member_sockets(&self) -> Vec<SocketId> {
        self.players
            .iter()
            .chain(self.pending_spectators.iter())
            .filter_map(|p| p.socket)
            .collect()
    }
}
