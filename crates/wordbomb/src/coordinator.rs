//! The game coordinator: maps inbound socket events to state mutations
//! and outbound broadcasts.
//!
//! Every inbound event resolves the caller's session first, then
//! dispatches to the room operation. All room mutation happens while the
//! registry lock is held; broadcasts are issued inside the same hold so
//! observers in one room always see events in submission order.
//!
//! Errors never propagate past [`handle_event`]: failed operations are
//! answered to the caller (join errors, word rejections) or logged, and
//! the process keeps serving.

use std::sync::Arc;
use std::time::Instant;

use wordbomb_protocol::{
    ClientEvent, CreateRoomData, PlayerProfile, RoomId, Scenario, ServerEvent, Settings, SocketId,
};
use wordbomb_room::{choose_syllable, JoinOutcome, RoomPhase, RoomRegistry, SUBMISSION_FLOOR};

use crate::state::ServerState;
use crate::timer::spawn_turn_timer;

/// Maximum chat message length after trimming.
const CHAT_LIMIT: usize = 300;

/// Entry point for every decoded client event.
pub async fn handle_event(
    state: &Arc<ServerState>,
    socket: SocketId,
    ip: std::net::IpAddr,
    event: ClientEvent,
) {
    match event {
        ClientEvent::Register { token } => {
            let mut sessions = state.sessions.lock().await;
            sessions.register(&token, socket);
            drop(sessions);
            state.stores.record_user(&ip.to_string(), None).await;
        }

        ClientEvent::GetRooms => {
            let rooms = state.rooms.lock().await;
            let listing = rooms.get_public_rooms();
            drop(rooms);
            state.send_to(socket, &ServerEvent::RoomsList { rooms: listing });
        }

        ClientEvent::CreateRoom { data } => {
            create_room(state, socket, ip, data).await;
        }

        ClientEvent::JoinRoom {
            room_id,
            player_data,
            token,
            was_host,
            staff_token: _,
        } => {
            join_room(state, socket, ip, room_id, player_data, token, was_host).await;
        }

        ClientEvent::LeaveRoom => {
            let Some((token, room_id)) = caller_room(state, socket).await else {
                return;
            };
            leave_room(state, &token, &room_id).await;
        }

        ClientEvent::DeleteRoom { room_id } => {
            delete_room(state, socket, room_id).await;
        }

        ClientEvent::ToggleReady { room_id } => {
            let Some(token) = caller_token(state, socket).await else {
                return;
            };
            let mut rooms = state.rooms.lock().await;
            let Some(room) = rooms.get_mut(&room_id) else {
                return;
            };
            let Some(player) = room.player_mut(&token) else {
                return;
            };
            player.is_ready = !player.is_ready;
            let is_ready = player.is_ready;
            state.broadcast_room(room, &ServerEvent::PlayerReadyChanged { token, is_ready });
        }

        ClientEvent::StartGame {
            room_id,
            scenario,
            train_syllables,
        } => {
            start_game(state, socket, room_id, scenario, train_syllables).await;
        }

        ClientEvent::NewSyllable { room_id, .. } => {
            new_syllable(state, socket, room_id).await;
        }

        ClientEvent::SubmitWord {
            room_id,
            word,
            player_id,
            ..
        } => {
            submit_word(state, socket, room_id, word, player_id).await;
        }

        ClientEvent::LoseLife { room_id, player_id } => {
            let Some(token) = caller_token(state, socket).await else {
                return;
            };
            let mut rooms = state.rooms.lock().await;
            let Some(room) = rooms.get(&room_id) else {
                return;
            };
            if !room.is_host(&token) {
                tracing::warn!(%room_id, caller = %token, "loseLife from non-host ignored");
                return;
            }
            handle_lose_life(state, &mut rooms, &room_id, &player_id);
        }

        ClientEvent::EndGame { room_id } => {
            let Some(token) = caller_token(state, socket).await else {
                return;
            };
            let mut rooms = state.rooms.lock().await;
            let Some(room) = rooms.get(&room_id) else {
                return;
            };
            if !room.is_host(&token) {
                tracing::warn!(%room_id, caller = %token, "endGame from non-host ignored");
                return;
            }
            end_game(state, &mut rooms, &room_id);
        }

        ClientEvent::UpdateBotCount {
            room_id,
            total_count,
        } => {
            let Some(token) = caller_token(state, socket).await else {
                return;
            };
            let mut rooms = state.rooms.lock().await;
            let Some(room) = rooms.get_mut(&room_id) else {
                return;
            };
            if !room.is_host(&token) {
                return;
            }
            // Seats change in the lobby only; a running game keeps its
            // roster until it ends.
            if room.phase != RoomPhase::Lobby {
                room.display_player_count = total_count;
                return;
            }
            let (added, removed) = room.set_bot_count(total_count);
            for player in added {
                state.broadcast_room(room, &ServerEvent::PlayerJoined { player });
            }
            for player in removed {
                state.broadcast_room(
                    room,
                    &ServerEvent::PlayerLeft {
                        token: player.token,
                        name: player.name,
                        new_host: None,
                    },
                );
            }
        }

        ClientEvent::UpdateSettings { room_id, settings } => {
            update_settings(state, socket, room_id, settings).await;
        }

        ClientEvent::TypingUpdate {
            room_id,
            text,
            player_name,
            accepted,
        } => {
            let rooms = state.rooms.lock().await;
            if let Some(room) = rooms.get(&room_id) {
                state.broadcast_room(
                    room,
                    &ServerEvent::PlayerTyping {
                        player_name,
                        text,
                        accepted,
                    },
                );
            }
        }

        ClientEvent::ChatMessage {
            room_id,
            message,
            player_name,
            avatar,
            reply_to,
            staff_token,
            is_bot,
        } => {
            chat_message(
                state, socket, room_id, message, player_name, avatar, reply_to, staff_token,
                is_bot,
            )
            .await;
        }

        ClientEvent::SuicideRequest { room_id } => {
            let Some(token) = caller_token(state, socket).await else {
                return;
            };
            let mut rooms = state.rooms.lock().await;
            let Some(room) = rooms.get(&room_id) else {
                return;
            };
            // Only the current player can give up their own turn.
            if room.phase != RoomPhase::Playing
                || room.current_player().map(|p| p.token.as_str()) != Some(token.as_str())
            {
                return;
            }
            let Some(r) = rooms.get_mut(&room_id) else {
                return;
            };
            r.game.clock.disarm();
            handle_lose_life(state, &mut rooms, &room_id, &token);
        }
    }
}

// ---------------------------------------------------------------------------
// Session helpers
// ---------------------------------------------------------------------------

async fn caller_token(state: &ServerState, socket: SocketId) -> Option<String> {
    let sessions = state.sessions.lock().await;
    let token = sessions.token_by_socket(socket)?;
    Some(token.to_string())
}

async fn caller_room(state: &ServerState, socket: SocketId) -> Option<(String, RoomId)> {
    let sessions = state.sessions.lock().await;
    let token = sessions.token_by_socket(socket)?.to_string();
    let room = sessions.session_by_token(&token)?.room.clone()?;
    Some((token, room))
}

// ---------------------------------------------------------------------------
// Room membership
// ---------------------------------------------------------------------------

async fn create_room(state: &Arc<ServerState>, socket: SocketId, ip: std::net::IpAddr, data: CreateRoomData) {
    let Some(token) = caller_token(state, socket).await else {
        tracing::debug!(%socket, "createRoom before register ignored");
        return;
    };
    state
        .stores
        .record_user(&ip.to_string(), Some(&data.player.name))
        .await;

    let mut rooms = state.rooms.lock().await;
    match rooms.create_room(&data, socket, &token) {
        Ok(room) => {
            let snapshot = room.snapshot();
            let room_id = room.id.clone();
            drop(rooms);
            let mut sessions = state.sessions.lock().await;
            let _ = sessions.set_room(&token, Some(room_id));
            drop(sessions);
            state.send_to(socket, &ServerEvent::RoomCreated { room: snapshot });
        }
        Err(e) => {
            state.send_to(
                socket,
                &ServerEvent::JoinError {
                    reason: e.client_code(),
                },
            );
        }
    }
}

async fn join_room(
    state: &Arc<ServerState>,
    socket: SocketId,
    ip: std::net::IpAddr,
    room_id: RoomId,
    profile: PlayerProfile,
    token: String,
    was_host: bool,
) {
    // joinRoom carries the token; make sure the session is bound to this
    // socket even if the client skipped register.
    {
        let mut sessions = state.sessions.lock().await;
        sessions.register(&token, socket);
    }
    state
        .stores
        .record_user(&ip.to_string(), Some(&profile.name))
        .await;

    let mut rooms = state.rooms.lock().await;
    let outcome = match rooms.join_room(&room_id, &profile, socket, &token, was_host) {
        Ok((outcome, _)) => outcome,
        Err(e) => {
            drop(rooms);
            state.send_to(
                socket,
                &ServerEvent::JoinError {
                    reason: e.client_code(),
                },
            );
            return;
        }
    };

    let Some(room) = rooms.get_mut(&room_id) else {
        return;
    };
    let snapshot = room.snapshot();

    match outcome {
        JoinOutcome::Spectator => {
            state.send_to(socket, &ServerEvent::JoinedAsSpectator { room: snapshot });
            let count = room.pending_spectators.len();
            state.broadcast_room(room, &ServerEvent::SpectatorsWaiting { count });
        }
        JoinOutcome::Reconnected => {
            state.send_to(
                socket,
                &ServerEvent::RoomJoined {
                    room: snapshot,
                    reconnected: true,
                },
            );
            let name = room.player(&token).map(|p| p.name.clone()).unwrap_or_default();
            state.broadcast_room(
                room,
                &ServerEvent::PlayerReconnected {
                    token: token.clone(),
                    name,
                },
            );

            // A paused round resumes when its player is back.
            let holds_turn =
                room.current_player().map(|p| p.token.as_str()) == Some(token.as_str());
            if room.phase == RoomPhase::Playing && holds_turn && room.game.clock.is_paused() {
                if let Some((generation, remaining)) = room.game.clock.resume() {
                    state.broadcast_room(
                        room,
                        &ServerEvent::GameResumed {
                            remaining: remaining.as_millis() as u64,
                        },
                    );
                    spawn_turn_timer(Arc::clone(state), room_id.clone(), generation);
                }
            }
        }
        JoinOutcome::Joined | JoinOutcome::RejoinedMidGame => {
            state.send_to(
                socket,
                &ServerEvent::RoomJoined {
                    room: snapshot,
                    reconnected: outcome == JoinOutcome::RejoinedMidGame,
                },
            );
            if let Some(player) = room.player(&token) {
                let event = ServerEvent::PlayerJoined {
                    player: player.snapshot(),
                };
                state.broadcast_room(room, &event);
            }
        }
    }
    drop(rooms);

    let mut sessions = state.sessions.lock().await;
    let _ = sessions.set_room(&token, Some(room_id));
}

pub(crate) async fn leave_room(state: &Arc<ServerState>, token: &str, room_id: &RoomId) {
    let mut rooms = state.rooms.lock().await;

    // Keep a playing room coherent around the departure.
    if let Some(room) = rooms.get_mut(room_id) {
        let held_turn = room.current_player().map(|p| p.token.as_str()) == Some(token);
        if room.phase == RoomPhase::Playing && held_turn {
            room.game.clock.disarm();
            room.advance_to_next_alive();
        }
    }

    match rooms.leave_room(room_id, token) {
        Ok(outcome) => {
            if !outcome.room_deleted {
                if let Some(room) = rooms.get(room_id) {
                    state.broadcast_room(
                        room,
                        &ServerEvent::PlayerLeft {
                            token: token.to_string(),
                            name: outcome.player.name.clone(),
                            new_host: outcome.new_host.clone().map(|(t, _)| t),
                        },
                    );
                }
                // The round the leaver held restarts for the next player.
                let follow_up = rooms.get(room_id).and_then(|room| {
                    let idle_mid_game = room.phase == RoomPhase::Playing
                        && !room.game.clock.is_armed()
                        && !room.game.clock.is_paused();
                    idle_mid_game.then(|| room.alive_count() <= 1)
                });
                match follow_up {
                    Some(true) => end_game(state, &mut rooms, room_id),
                    Some(false) => start_round(state, &mut rooms, room_id),
                    None => {}
                }
            }
        }
        Err(e) => {
            tracing::debug!(%room_id, %token, error = %e, "leave failed");
        }
    }
    drop(rooms);

    let mut sessions = state.sessions.lock().await;
    let _ = sessions.set_room(token, None);
}

async fn delete_room(state: &Arc<ServerState>, socket: SocketId, room_id: RoomId) {
    let Some(token) = caller_token(state, socket).await else {
        return;
    };
    let mut rooms = state.rooms.lock().await;
    let Some(room) = rooms.get_mut(&room_id) else {
        return;
    };
    if !room.is_host(&token) {
        tracing::warn!(%room_id, caller = %token, "deleteRoom from non-host ignored");
        return;
    }
    room.game.clock.disarm();
    state.broadcast_room(
        room,
        &ServerEvent::RoomDeleted {
            room_id: room_id.clone(),
        },
    );
    let member_tokens: Vec<String> = room.players.iter().map(|p| p.token.clone()).collect();
    rooms.delete(&room_id);
    drop(rooms);

    let mut sessions = state.sessions.lock().await;
    for member in member_tokens {
        let _ = sessions.set_room(&member, None);
    }
}

// ---------------------------------------------------------------------------
// Game lifecycle
// ---------------------------------------------------------------------------

async fn start_game(
    state: &Arc<ServerState>,
    socket: SocketId,
    room_id: RoomId,
    scenario: Option<Scenario>,
    train_syllables: Option<Vec<String>>,
) {
    let Some(token) = caller_token(state, socket).await else {
        return;
    };
    let mut rooms = state.rooms.lock().await;
    let Some(room) = rooms.get_mut(&room_id) else {
        return;
    };
    if !room.is_host(&token) {
        tracing::warn!(%room_id, caller = %token, "startGame from non-host ignored");
        return;
    }
    if room.phase == RoomPhase::Playing {
        return;
    }

    room.settings.scenario = scenario;
    // Fresh game state; the clock instance survives so its generation
    // counter stays monotonic for stale timer tasks.
    let clock = room.game.clock.clone();
    room.game = wordbomb_room::Game {
        clock,
        ..Default::default()
    };
    room.game.train_allowed = train_syllables
        .map(|list| list.into_iter().map(|s| s.trim().to_uppercase()).collect());
    room.game.started_at = Some(Instant::now());
    room.phase = RoomPhase::Playing;
    let lives = room.settings.starting_lives;
    for p in &mut room.players {
        p.lives = lives;
        p.words_found = 0;
        p.is_alive = true;
    }
    room.game.current_player = 0;
    room.normalize_current_index();

    let snapshot = room.snapshot();
    state.broadcast_room(room, &ServerEvent::GameStarted { room: snapshot });
    tracing::info!(%room_id, ?scenario, players = room.players.len(), "game started");

    start_round(state, &mut rooms, &room_id);
}

/// Honors a legacy client's `newSyllable` only outside the server's
/// control window, so the scenario filter can never be bypassed.
async fn new_syllable(state: &Arc<ServerState>, socket: SocketId, room_id: RoomId) {
    let Some(_token) = caller_token(state, socket).await else {
        return;
    };
    let mut rooms = state.rooms.lock().await;
    let Some(room) = rooms.get_mut(&room_id) else {
        return;
    };
    if room.phase != RoomPhase::Playing {
        return;
    }
    if let Some(until) = room.game.server_controlled_until {
        if Instant::now() < until {
            tracing::debug!(%room_id, "newSyllable inside control window ignored");
            return;
        }
    }
    room.game.clock.disarm();
    start_round(state, &mut rooms, &room_id);
}

async fn update_settings(
    state: &Arc<ServerState>,
    socket: SocketId,
    room_id: RoomId,
    settings: Settings,
) {
    let Some(token) = caller_token(state, socket).await else {
        return;
    };
    let mut rooms = state.rooms.lock().await;
    let Some(room) = rooms.get_mut(&room_id) else {
        return;
    };
    if !room.is_host(&token) {
        tracing::warn!(%room_id, caller = %token, "updateSettings from non-host ignored");
        return;
    }
    room.settings = settings.sanitized();
    let applied = room.settings.clone();
    state.broadcast_room(room, &ServerEvent::SettingsUpdated { settings: applied });
}

// ---------------------------------------------------------------------------
// Rounds and words
// ---------------------------------------------------------------------------

/// Starts the next round: chooses a syllable, arms the clock, announces.
/// Ends the game instead when the scenario pool is exhausted for good.
pub(crate) fn start_round(state: &Arc<ServerState>, rooms: &mut RoomRegistry, room_id: &RoomId) {
    let Some(room) = rooms.get_mut(room_id) else {
        return;
    };
    if room.phase != RoomPhase::Playing || room.players.is_empty() {
        return;
    }

    let dict = state.dict.snapshot();
    let scenario = room.settings.scenario;
    let train = room.game.train_allowed.clone();
    let syllable = choose_syllable(
        dict.as_deref(),
        scenario,
        &mut room.game.used_syllables,
        train.as_ref(),
    );
    let Some(syllable) = syllable else {
        tracing::info!(%room_id, "no syllable available, ending game");
        end_game(state, rooms, room_id);
        return;
    };

    room.game.used_syllables.insert(syllable.clone());
    room.game.current_syllable = Some(syllable.clone());
    room.game.round_number += 1;
    room.game.server_controlled_until =
        Some(Instant::now() + wordbomb_room::SERVER_CONTROL_WINDOW);

    let total = std::time::Duration::from_millis(room.settings.turn_millis());
    let generation = room.game.clock.arm(total);

    let count = dict.as_deref().and_then(|d| d.count_for(&syllable)).unwrap_or(0);
    let player_index = room.game.current_player;
    let player_name = room
        .players
        .get(player_index)
        .map(|p| p.name.clone())
        .unwrap_or_default();
    let round_number = room.game.round_number;

    state.broadcast_room(
        room,
        &ServerEvent::SyllableUpdate {
            syllable,
            player_index,
            player: player_name,
            round_number,
            count,
        },
    );

    spawn_turn_timer(Arc::clone(state), room_id.clone(), generation);
}

async fn submit_word(
    state: &Arc<ServerState>,
    socket: SocketId,
    room_id: RoomId,
    word: String,
    player_id: Option<String>,
) {
    let Some(caller) = caller_token(state, socket).await else {
        return;
    };
    let mut rooms = state.rooms.lock().await;
    let Some(room) = rooms.get_mut(&room_id) else {
        return;
    };
    if room.phase != RoomPhase::Playing || !room.game.clock.is_armed() {
        return;
    }
    let Some(current) = room.current_player() else {
        return;
    };
    let current_token = current.token.clone();
    let current_connected = current.socket.is_some();

    // The seat the word is played for: the caller's own unless the host
    // designates another. The submitter must hold the turn, and only the
    // host may play a seat with no live connection of its own (the
    // host-driven local bots).
    let submitter = player_id.unwrap_or_else(|| caller.clone());
    let authorized = submitter == current_token
        && (caller == submitter || (room.is_host(&caller) && !current_connected));
    if !authorized {
        state.send_to(
            socket,
            &ServerEvent::WordRejected {
                reason: "Ce n'est pas ton tour".into(),
                word: Some(word),
            },
        );
        return;
    }

    // One submission per 800 ms per playing identity, accepted or not.
    let now = Instant::now();
    let too_fast = room
        .game
        .last_submission
        .get(&submitter)
        .is_some_and(|last| now.duration_since(*last) < SUBMISSION_FLOOR);
    room.game.last_submission.insert(submitter, now);
    if too_fast {
        let event = ServerEvent::WordRejected {
            reason: "Trop rapide!".into(),
            word: Some(word),
        };
        state.broadcast_room(room, &event);
        return;
    }

    // Validate against the server's syllable, never the client's.
    let normalized = wordbomb_dict::normalize(&word);
    let Some(syllable) = room.game.current_syllable.clone() else {
        return;
    };
    if !normalized.contains(&syllable) {
        let event = ServerEvent::WordRejected {
            reason: "Le mot ne contient pas la syllabe".into(),
            word: Some(word),
        };
        state.broadcast_room(room, &event);
        return;
    }
    let in_dictionary = state
        .dict
        .snapshot()
        .is_some_and(|dict| dict.contains(&normalized));
    if !in_dictionary {
        let event = ServerEvent::WordRejected {
            reason: "Mot inconnu du dictionnaire".into(),
            word: Some(word),
        };
        state.broadcast_room(room, &event);
        return;
    }

    // Accepted: stop the clock before anything else can expire it.
    room.game.clock.disarm();
    let words_found = {
        let player = room
            .player_mut(&current_token)
            .expect("current player exists");
        player.words_found += 1;
        player.words_found
    };
    let player_name = room
        .player(&current_token)
        .map(|p| p.name.clone())
        .unwrap_or_default();
    let event = ServerEvent::WordAccepted {
        token: current_token.clone(),
        player_name,
        word: normalized,
        words_found,
    };
    state.broadcast_room(room, &event);

    if let Some(idx) = room.advance_to_next_alive() {
        let next_token = room.players[idx].token.clone();
        let event = ServerEvent::TurnChanged {
            player_index: idx,
            token: next_token,
        };
        state.broadcast_room(room, &event);
        start_round(state, &mut rooms, &room_id);
    } else {
        end_game(state, &mut rooms, &room_id);
    }
}

/// Applies a life loss and drives the follow-up: elimination, game end,
/// or the next round.
pub(crate) fn handle_lose_life(
    state: &Arc<ServerState>,
    rooms: &mut RoomRegistry,
    room_id: &RoomId,
    token: &str,
) {
    let Some(room) = rooms.get_mut(room_id) else {
        return;
    };
    if room.phase != RoomPhase::Playing {
        return;
    }
    let Some(player) = room.player_mut(token) else {
        return;
    };
    player.lives = player.lives.saturating_sub(1);
    let lives_left = player.lives;
    let player_name = player.name.clone();
    if lives_left == 0 {
        player.is_alive = false;
    }

    let event = ServerEvent::PlayerLostLife {
        token: token.to_string(),
        player_name: player_name.clone(),
        lives_left,
    };
    state.broadcast_room(room, &event);

    if lives_left == 0 {
        let event = ServerEvent::PlayerEliminated {
            token: token.to_string(),
            player_name,
        };
        state.broadcast_room(room, &event);
        tracing::info!(%room_id, %token, "player eliminated");
    }

    if room.alive_count() <= 1 {
        end_game(state, rooms, room_id);
        return;
    }

    if let Some(idx) = room.advance_to_next_alive() {
        let next_token = room.players[idx].token.clone();
        let event = ServerEvent::TurnChanged {
            player_index: idx,
            token: next_token,
        };
        state.broadcast_room(room, &event);
        start_round(state, rooms, room_id);
    } else {
        end_game(state, rooms, room_id);
    }
}

/// Finishes the game: winner, spectator promotion, reset to lobby.
pub(crate) fn end_game(state: &Arc<ServerState>, rooms: &mut RoomRegistry, room_id: &RoomId) {
    let Some(room) = rooms.get_mut(room_id) else {
        return;
    };
    room.game.clock.disarm();
    room.phase = RoomPhase::Finished;

    // Last alive player wins; ties broken by player order.
    let winner = room
        .players
        .iter()
        .find(|p| p.is_alive && p.lives > 0)
        .map(|p| (p.token.clone(), p.name.clone()));
    let event = ServerEvent::GameOver {
        winner_token: winner.as_ref().map(|(t, _)| t.clone()),
        winner_name: winner.as_ref().map(|(_, n)| n.clone()),
    };
    state.broadcast_room(room, &event);
    tracing::info!(%room_id, winner = ?winner.as_ref().map(|(t, _)| t.as_str()), "game over");

    for token in room.promote_pending_spectators() {
        let event = ServerEvent::PromotedToPlayer { token };
        state.broadcast_room(room, &event);
    }

    // Back to the lobby with everyone reset for the next game. The
    // clock instance survives to keep generations monotonic.
    room.reset_players_for_lobby();
    let clock = room.game.clock.clone();
    room.game = wordbomb_room::Game {
        clock,
        ..Default::default()
    };
    room.phase = RoomPhase::Lobby;
    room.finished_at = Some(Instant::now());
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

#[allow(clippy::too_many_arguments)]
async fn chat_message(
    state: &Arc<ServerState>,
    socket: SocketId,
    room_id: RoomId,
    message: String,
    player_name: String,
    avatar: String,
    reply_to: Option<String>,
    staff_token: Option<String>,
    is_bot: bool,
) {
    let Some(caller) = caller_token(state, socket).await else {
        return;
    };

    let staff = match staff_token {
        Some(token) => state.stores.staff_role_for_token(&token).await,
        None => None,
    };

    let rooms = state.rooms.lock().await;
    let Some(room) = rooms.get(&room_id) else {
        return;
    };
    // Bot impersonation is a host privilege.
    let is_bot = is_bot && room.is_host(&caller);

    let trimmed: String = message.chars().take(CHAT_LIMIT).collect();
    let event = ServerEvent::ChatMessage {
        player_name: escape_html(&player_name),
        avatar,
        message: escape_html(&trimmed),
        reply_to,
        staff,
        is_bot,
    };
    state.broadcast_room(room, &event);
}

/// Minimal HTML escaping for chat names and bodies.
fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
