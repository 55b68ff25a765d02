//! Spawned timer tasks: the per-round turn timer and the staged
//! disconnect grace windows.
//!
//! Every task re-locks shared state when it wakes and validates a
//! captured generation before acting:
//!
//! - turn timers capture the [`TurnClock`](wordbomb_turn::TurnClock)
//!   generation; any word acceptance, pause, or round replacement bumps
//!   it and the stale task exits silently.
//! - grace stages capture the session's `last_disconnect` stamp; any
//!   reconnect clears it and the stale stage exits silently.
//!
//! This is what makes cancellation implicit: nothing ever needs to hold
//! a `JoinHandle` or abort a task.

use std::sync::Arc;
use std::time::Duration;
// The turn clock runs on tokio's clock; session disconnect stamps are
// plain monotonic instants compared only for equality.
use std::time::Instant as DisconnectStamp;

use tokio::time::Instant;
use wordbomb_protocol::{RoomId, ServerEvent};
use wordbomb_room::RoomPhase;

use crate::coordinator;
use crate::state::ServerState;

/// Broadcast cadence for `timerUpdate` while a round is armed.
const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Transport loss → `disconnected` flag (stage 2).
pub const GRACE_DISCONNECT: Duration = Duration::from_secs(8);

/// `disconnected` flag → eviction (stage 3).
pub const GRACE_EVICT: Duration = Duration::from_secs(45);

/// Drives one armed round: periodic `timerUpdate` broadcasts, then the
/// timeout when the deadline passes. Exits as soon as the captured
/// generation is superseded.
pub fn spawn_turn_timer(state: Arc<ServerState>, room_id: RoomId, generation: u64) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(TICK_INTERVAL).await;

            let mut rooms = state.rooms.lock().await;
            let Some(room) = rooms.get_mut(&room_id) else {
                return;
            };
            if room.game.clock.generation() != generation || room.phase != RoomPhase::Playing {
                return;
            }

            let now = Instant::now();
            if room.game.clock.expired_at(now) {
                // Clear the clock before charging the life so a racing
                // expiry can never double-charge.
                room.game.clock.disarm();
                let Some(player) = room.current_player() else {
                    return;
                };
                let token = player.token.clone();
                let event = ServerEvent::Timeout {
                    socket_id: player.socket,
                    player_name: player.name.clone(),
                };
                state.broadcast_room(room, &event);
                tracing::info!(%room_id, %token, "turn timed out");

                coordinator::handle_lose_life(&state, &mut rooms, &room_id, &token);
                return;
            }

            let remaining = room.game.clock.remaining_at(now).as_millis() as u64;
            let total = room.game.clock.total().as_millis() as u64;
            state.broadcast_room(room, &ServerEvent::TimerUpdate { remaining, total });
        }
    });
}

/// Runs the staged disconnect protocol for one lost socket.
///
/// Stage 2 (t+8 s): mark the player disconnected; pause the round when
/// they held the turn. Stage 3 (t+53 s): advance past them, resume a
/// paused round, and evict them from the room.
///
/// `stamp` is the disconnect generation; reconnection at any point makes
/// every later stage a no-op.
pub fn spawn_disconnect_stages(state: Arc<ServerState>, token: String, stamp: DisconnectStamp) {
    tokio::spawn(async move {
        tokio::time::sleep(GRACE_DISCONNECT).await;
        if !run_stage_disconnect(&state, &token, stamp).await {
            return;
        }

        tokio::time::sleep(GRACE_EVICT).await;
        run_stage_evict(&state, &token, stamp).await;
    });
}

/// Checks the disconnect generation. `Some(room_id)` when the session is
/// still gone and sits in a room.
async fn still_disconnected(
    state: &ServerState,
    token: &str,
    stamp: DisconnectStamp,
) -> Option<RoomId> {
    let sessions = state.sessions.lock().await;
    let session = sessions.session_by_token(token)?;
    if session.last_disconnect != Some(stamp) || session.socket.is_some() {
        return None;
    }
    session.room.clone()
}

/// Stage 2. Returns `false` when the stage voided (stage 3 must not run).
async fn run_stage_disconnect(state: &Arc<ServerState>, token: &str, stamp: DisconnectStamp) -> bool {
    let Some(room_id) = still_disconnected(state, token, stamp).await else {
        return false;
    };

    let mut rooms = state.rooms.lock().await;
    let holds_turn = rooms
        .get(&room_id)
        .and_then(|r| r.current_player())
        .is_some_and(|p| p.token == token);
    if rooms.mark_disconnected(&room_id, token, true).is_err() {
        return false;
    }
    let Some(room) = rooms.get_mut(&room_id) else {
        return false;
    };
    let name = room
        .player(token)
        .map(|p| p.name.clone())
        .unwrap_or_default();

    let mut game_paused = false;
    if room.phase == RoomPhase::Playing && holds_turn && room.game.clock.is_armed() {
        room.game.clock.pause();
        game_paused = true;
        state.broadcast_room(
            room,
            &ServerEvent::GamePaused {
                reason: format!("{name} a perdu la connexion"),
            },
        );
        tracing::info!(%room_id, %token, "round paused for disconnected current player");
    }

    state.broadcast_room(
        room,
        &ServerEvent::PlayerDisconnected {
            token: token.to_string(),
            name,
            game_paused,
        },
    );
    true
}

/// Stage 3: eviction after the long grace window.
async fn run_stage_evict(state: &Arc<ServerState>, token: &str, stamp: DisconnectStamp) {
    let Some(room_id) = still_disconnected(state, token, stamp).await else {
        return;
    };

    let mut rooms = state.rooms.lock().await;
    let Some(room) = rooms.get_mut(&room_id) else {
        return;
    };

    // Move the turn off the leaver before they disappear.
    let held_turn = room.current_player().map(|p| p.token.as_str()) == Some(token);
    if held_turn {
        room.advance_to_next_alive();
    }
    if room.game.clock.is_paused() {
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

    match rooms.leave_room(&room_id, token) {
        Ok(outcome) => {
            tracing::info!(%room_id, %token, "player evicted after grace window");
            if !outcome.room_deleted {
                if let Some(room) = rooms.get(&room_id) {
                    state.broadcast_room(
                        room,
                        &ServerEvent::PlayerLeft {
                            token: token.to_string(),
                            name: outcome.player.name.clone(),
                            new_host: outcome.new_host.map(|(t, _)| t),
                        },
                    );
                }
            }
        }
        Err(e) => {
            tracing::debug!(%room_id, %token, error = %e, "eviction leave failed");
        }
    }
    drop(rooms);

    let mut sessions = state.sessions.lock().await;
    let _ = sessions.set_room(token, None);
}
