//! Room registry: creates, tracks, and mutates rooms.
//!
//! This is the entry point for membership operations from the
//! coordinator. Like the session registry it is a plain map guarded by a
//! mutex one level up -- a single logical authority owns all rooms.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::Rng;
use wordbomb_protocol::{CreateRoomData, PlayerProfile, RoomId, RoomSummary, SocketId};

use crate::room::{Game, LeftPlayer, Player, Room, RoomPhase};
use crate::RoomError;

/// Rooms that stay finished-or-empty this long are reaped.
const IDLE_ROOM_TTL: Duration = Duration::from_secs(3600);

/// Outcome of a join, driving which event the coordinator emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The token was already a member: socket updated in place.
    Reconnected,
    /// A fresh seat in a lobby-phase room.
    Joined,
    /// Mid-game return of the historical host or a recent leaver,
    /// original state restored.
    RejoinedMidGame,
    /// Arrived during a game; queued for promotion at game end.
    Spectator,
}

/// Outcome of a leave, carrying what the coordinator must broadcast.
#[derive(Debug, Clone)]
pub struct LeaveOutcome {
    pub player: Player,
    pub room_deleted: bool,
    /// `(token, name)` of the promoted host, when the leaver hosted.
    pub new_host: Option<(String, String)>,
}

/// All live rooms, keyed by ID.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomId, Room>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a room with the caller as host (implicitly ready).
    ///
    /// A client-supplied ID wins so a returning host can recreate their
    /// room after a server restart; an existing room under that ID is an
    /// error.
    pub fn create_room(
        &mut self,
        data: &CreateRoomData,
        host_socket: SocketId,
        host_token: &str,
    ) -> Result<&Room, RoomError> {
        let id = match &data.id {
            Some(id) if !id.as_str().is_empty() => id.clone(),
            _ => generate_room_id(),
        };
        if self.rooms.contains_key(&id) {
            return Err(RoomError::InvalidState(format!("room {id} already exists")));
        }

        let settings = data.settings.clone().unwrap_or_default().sanitized();
        let host = Player::new(
            host_token,
            &data.player,
            Some(host_socket),
            settings.starting_lives,
            true,
        );

        let room = Room {
            id: id.clone(),
            name: data.name.clone(),
            host_token: host_token.to_string(),
            original_host_token: host_token.to_string(),
            players: vec![host],
            pending_spectators: Vec::new(),
            recently_left: Vec::new(),
            display_player_count: 0,
            settings,
            phase: RoomPhase::Lobby,
            game: Game::default(),
            created_at: Instant::now(),
            finished_at: None,
        };

        tracing::info!(room_id = %id, host = %host_token, "room created");
        self.rooms.insert(id.clone(), room);
        Ok(self.rooms.get(&id).expect("just inserted"))
    }

    /// Adds a player to a room. The four cases are evaluated in order:
    /// already-member reconnection, full room, mid-game gate, fresh join.
    pub fn join_room(
        &mut self,
        room_id: &RoomId,
        profile: &PlayerProfile,
        socket: SocketId,
        token: &str,
        was_host: bool,
    ) -> Result<(JoinOutcome, &Room), RoomError> {
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;

        // 1. Reconnection: the token is already a member.
        if let Some(player) = room.player_mut(token) {
            player.socket = Some(socket);
            player.disconnected = false;
            tracing::info!(%room_id, %token, "player reconnected to room");
            return Ok((JoinOutcome::Reconnected, room));
        }

        // 2. No free seat.
        if room.players.len() >= room.settings.max_players {
            return Err(RoomError::RoomFull(room_id.clone()));
        }

        // 3. Mid-game: only the historical host or a recent leaver may
        //    re-enter as a player; everyone else waits as a spectator.
        if room.phase == RoomPhase::Playing {
            let now = Instant::now();
            let restored = room.take_recently_left(token, now);
            if restored.is_none() && !(was_host && room.original_host_token == token) {
                if room.pending_spectators.len() >= room.settings.max_players {
                    return Err(RoomError::GameInProgress(room_id.clone()));
                }
                let spectator = Player::new(token, profile, Some(socket), 0, false);
                room.pending_spectators.push(spectator);
                tracing::info!(%room_id, %token, "queued as pending spectator");
                return Ok((JoinOutcome::Spectator, room));
            }

            let mut player = restored.unwrap_or_else(|| {
                Player::new(token, profile, Some(socket), room.settings.starting_lives, false)
            });
            player.socket = Some(socket);
            player.disconnected = false;
            room.players.push(player);
            room.normalize_current_index();
            tracing::info!(%room_id, %token, "rejoined mid-game");
            return Ok((JoinOutcome::RejoinedMidGame, room));
        }

        // 4. Fresh join in the lobby.
        let player = Player::new(token, profile, Some(socket), room.settings.starting_lives, false);
        room.players.push(player);
        tracing::info!(%room_id, %token, players = room.players.len(), "player joined");
        Ok((JoinOutcome::Joined, room))
    }

    /// Removes a player; deletes the room when it empties, promotes a new
    /// host when the host left.
    pub fn leave_room(&mut self, room_id: &RoomId, token: &str) -> Result<LeaveOutcome, RoomError> {
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;

        let idx = room.player_index(token).ok_or_else(|| RoomError::NotInRoom {
            room: room_id.clone(),
            token: token.to_string(),
        })?;
        let was_host = room.players[idx].is_host;
        let player = room.players.remove(idx);

        // Mid-game leavers keep a rejoin snapshot for a minute.
        if room.phase == RoomPhase::Playing {
            room.recently_left.push(LeftPlayer {
                player: player.clone(),
                left_at: Instant::now(),
            });
            room.prune_recently_left(Instant::now());
        }

        // Keep the turn index on a valid player.
        if idx < room.game.current_player && room.game.current_player > 0 {
            room.game.current_player -= 1;
        }
        room.normalize_current_index();

        if room.players.is_empty() {
            tracing::info!(%room_id, "last player left, room deleted");
            self.rooms.remove(room_id);
            return Ok(LeaveOutcome {
                player,
                room_deleted: true,
                new_host: None,
            });
        }

        let new_host = if was_host {
            room.promote_first_player()
        } else {
            None
        };
        if let Some((ref host_token, _)) = new_host {
            tracing::info!(%room_id, new_host = %host_token, "host transferred");
        }

        Ok(LeaveOutcome {
            player,
            room_deleted: false,
            new_host,
        })
    }

    /// Flips the grace-window disconnect flag without removing the player.
    pub fn mark_disconnected(
        &mut self,
        room_id: &RoomId,
        token: &str,
        disconnected: bool,
    ) -> Result<(), RoomError> {
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;
        let player = room.player_mut(token).ok_or_else(|| RoomError::NotInRoom {
            room: room_id.clone(),
            token: token.to_string(),
        })?;
        player.disconnected = disconnected;
        if disconnected {
            player.socket = None;
        }
        Ok(())
    }

    /// Lobby listing, sorted by creation (stable iteration by name).
    pub fn get_public_rooms(&self) -> Vec<RoomSummary> {
        let mut summaries: Vec<RoomSummary> = self.rooms.values().map(Room::summary).collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.0.cmp(&b.id.0)));
        summaries
    }

    pub fn get(&self, room_id: &RoomId) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn get_mut(&mut self, room_id: &RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(room_id)
    }

    pub fn delete(&mut self, room_id: &RoomId) -> Option<Room> {
        let room = self.rooms.remove(room_id);
        if room.is_some() {
            tracing::info!(%room_id, "room deleted");
        }
        room
    }

    /// Drops rooms that are empty or have sat idle since finishing for
    /// longer than an hour. Also prunes stale rejoin snapshots.
    pub fn reap_idle(&mut self) -> Vec<RoomId> {
        let now = Instant::now();
        let mut reaped = Vec::new();
        self.rooms.retain(|id, room| {
            room.prune_recently_left(now);
            let stale = room.players.is_empty()
                || room
                    .finished_at
                    .is_some_and(|at| now.duration_since(at) > IDLE_ROOM_TTL && room.phase == RoomPhase::Lobby);
            if stale {
                reaped.push(id.clone());
            }
            !stale
        });
        if !reaped.is_empty() {
            tracing::info!(count = reaped.len(), "idle rooms reaped");
        }
        reaped
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

/// 8 lowercase alphanumerics, generated server-side when the client
/// does not bring an ID.
fn generate_room_id() -> RoomId {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    let id: String = (0..8)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect();
    RoomId(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str) -> PlayerProfile {
        PlayerProfile {
            name: name.into(),
            avatar: String::new(),
        }
    }

    fn create_data(name: &str) -> CreateRoomData {
        CreateRoomData {
            id: None,
            name: name.into(),
            player: profile("host"),
            settings: None,
        }
    }

    fn sock(id: u64) -> SocketId {
        SocketId(id)
    }

    #[test]
    fn test_create_room_host_is_ready_and_flagged() {
        let mut reg = RoomRegistry::new();
        let room = reg.create_room(&create_data("salle"), sock(1), "tok-h").unwrap();

        assert_eq!(room.players.len(), 1);
        assert!(room.players[0].is_host);
        assert!(room.players[0].is_ready);
        assert_eq!(room.host_token, "tok-h");
        assert_eq!(room.phase, RoomPhase::Lobby);
    }

    #[test]
    fn test_create_room_with_supplied_id_is_idempotent_for_host() {
        let mut reg = RoomRegistry::new();
        let data = CreateRoomData {
            id: Some(RoomId::from("my-room")),
            ..create_data("salle")
        };
        let room = reg.create_room(&data, sock(1), "tok-h").unwrap();
        assert_eq!(room.id, RoomId::from("my-room"));

        // Recreating while it exists is rejected.
        assert!(reg.create_room(&data, sock(2), "tok-h").is_err());
    }

    #[test]
    fn test_generated_ids_are_unique_enough() {
        let a = generate_room_id();
        let b = generate_room_id();
        assert_eq!(a.as_str().len(), 8);
        assert_ne!(a, b);
    }

    #[test]
    fn test_join_unknown_room_is_salle_introuvable() {
        let mut reg = RoomRegistry::new();
        let err = reg
            .join_room(&RoomId::from("nope"), &profile("p"), sock(1), "tok", false)
            .unwrap_err();
        assert_eq!(err.to_string(), "Salle introuvable");
    }

    #[test]
    fn test_join_full_room_is_salle_pleine() {
        let mut reg = RoomRegistry::new();
        let id = reg.create_room(&create_data("salle"), sock(1), "tok-h").unwrap().id.clone();
        for i in 0..5 {
            reg.join_room(&id, &profile(&format!("p{i}")), sock(i + 2), &format!("tok-{i}"), false)
                .unwrap();
        }

        let err = reg
            .join_room(&id, &profile("late"), sock(99), "tok-late", false)
            .unwrap_err();
        assert_eq!(err.to_string(), "Salle pleine");
    }

    #[test]
    fn test_join_twice_is_reconnection_with_new_socket() {
        let mut reg = RoomRegistry::new();
        let id = reg.create_room(&create_data("salle"), sock(1), "tok-h").unwrap().id.clone();
        reg.join_room(&id, &profile("p"), sock(2), "tok-p", false).unwrap();

        let (outcome, room) = reg.join_room(&id, &profile("p"), sock(3), "tok-p", false).unwrap();

        assert_eq!(outcome, JoinOutcome::Reconnected);
        assert_eq!(room.players.len(), 2);
        assert_eq!(room.player("tok-p").unwrap().socket, Some(sock(3)));
        assert!(!room.player("tok-p").unwrap().disconnected);
    }

    #[test]
    fn test_join_playing_room_queues_spectator() {
        let mut reg = RoomRegistry::new();
        let id = reg.create_room(&create_data("salle"), sock(1), "tok-h").unwrap().id.clone();
        reg.get_mut(&id).unwrap().phase = RoomPhase::Playing;

        let (outcome, room) = reg
            .join_room(&id, &profile("spec"), sock(2), "tok-s", false)
            .unwrap();

        assert_eq!(outcome, JoinOutcome::Spectator);
        assert_eq!(room.pending_spectators.len(), 1);
        assert_eq!(room.players.len(), 1);
    }

    #[test]
    fn test_recent_leaver_rejoins_with_state_restored() {
        let mut reg = RoomRegistry::new();
        let id = reg.create_room(&create_data("salle"), sock(1), "tok-h").unwrap().id.clone();
        reg.join_room(&id, &profile("p"), sock(2), "tok-p", false).unwrap();
        {
            let room = reg.get_mut(&id).unwrap();
            room.phase = RoomPhase::Playing;
            room.player_mut("tok-p").unwrap().lives = 1;
            room.player_mut("tok-p").unwrap().words_found = 4;
        }
        reg.leave_room(&id, "tok-p").unwrap();

        let (outcome, room) = reg
            .join_room(&id, &profile("p"), sock(3), "tok-p", false)
            .unwrap();

        assert_eq!(outcome, JoinOutcome::RejoinedMidGame);
        let p = room.player("tok-p").unwrap();
        assert_eq!(p.lives, 1);
        assert_eq!(p.words_found, 4);
    }

    #[test]
    fn test_host_leaving_promotes_first_remaining() {
        let mut reg = RoomRegistry::new();
        let id = reg.create_room(&create_data("salle"), sock(1), "tok-h").unwrap().id.clone();
        reg.join_room(&id, &profile("p"), sock(2), "tok-p", false).unwrap();

        let outcome = reg.leave_room(&id, "tok-h").unwrap();

        assert!(!outcome.room_deleted);
        assert_eq!(outcome.new_host, Some(("tok-p".into(), "p".into())));
        let room = reg.get(&id).unwrap();
        assert_eq!(room.host_token, "tok-p");
        assert!(room.players[0].is_host);
    }

    #[test]
    fn test_last_player_leaving_deletes_room() {
        let mut reg = RoomRegistry::new();
        let id = reg.create_room(&create_data("salle"), sock(1), "tok-h").unwrap().id.clone();

        let outcome = reg.leave_room(&id, "tok-h").unwrap();

        assert!(outcome.room_deleted);
        assert!(reg.get(&id).is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_leave_adjusts_current_player_index() {
        let mut reg = RoomRegistry::new();
        let id = reg.create_room(&create_data("salle"), sock(1), "tok-h").unwrap().id.clone();
        reg.join_room(&id, &profile("b"), sock(2), "tok-b", false).unwrap();
        reg.join_room(&id, &profile("c"), sock(3), "tok-c", false).unwrap();
        {
            let room = reg.get_mut(&id).unwrap();
            room.phase = RoomPhase::Playing;
            room.game.current_player = 2; // tok-c's turn
        }

        reg.leave_room(&id, "tok-b").unwrap();

        // tok-c shifted from index 2 to 1; the turn follows them.
        let room = reg.get(&id).unwrap();
        assert_eq!(room.game.current_player, 1);
        assert_eq!(room.players[1].token, "tok-c");
    }

    #[test]
    fn test_mark_disconnected_flips_flag_only() {
        let mut reg = RoomRegistry::new();
        let id = reg.create_room(&create_data("salle"), sock(1), "tok-h").unwrap().id.clone();

        reg.mark_disconnected(&id, "tok-h", true).unwrap();
        let room = reg.get(&id).unwrap();
        assert!(room.player("tok-h").unwrap().disconnected);
        assert_eq!(room.players.len(), 1);

        reg.mark_disconnected(&id, "tok-h", false).unwrap();
        assert!(!reg.get(&id).unwrap().player("tok-h").unwrap().disconnected);
    }

    #[test]
    fn test_public_rooms_lists_every_room() {
        let mut reg = RoomRegistry::new();
        reg.create_room(&create_data("beta"), sock(1), "tok-1").unwrap();
        reg.create_room(&create_data("alpha"), sock(2), "tok-2").unwrap();

        let rooms = reg.get_public_rooms();
        assert_eq!(rooms.len(), 2);
        assert_eq!(rooms[0].name, "alpha");
        assert_eq!(rooms[1].name, "beta");
    }
}
