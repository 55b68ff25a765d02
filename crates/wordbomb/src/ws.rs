//! WebSocket transport: upgrade, per-connection loop, disconnect hook.
//!
//! The socket shares the HTTP port; `GET /ws` upgrades. Each connection
//! gets a transport-scoped [`SocketId`], an unbounded outbox drained by
//! this task, and a read loop that decodes [`ClientEvent`]s into the
//! coordinator. Outbound frames over 1 KiB arrive from the codec already
//! deflate-compressed and go out as binary.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tokio::sync::mpsc;

use wordbomb_protocol::{decode_text, ClientEvent, OutboundFrame, ServerEvent};

use crate::coordinator;
use crate::state::{next_socket_id, ServerState};
use crate::timer::spawn_disconnect_stages;

/// `GET /ws` -- upgrade to the game socket.
///
/// The guard middleware has already screened this request; from here on
/// only the fail-closed ban check applies per message.
pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
    let ip = addr.ip();
    ws.on_upgrade(move |socket| handle_socket(socket, state, ip))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<ServerState>, ip: IpAddr) {
    let socket_id = next_socket_id();
    let (tx, mut rx) = mpsc::unbounded_channel::<OutboundFrame>();
    state.attach_outbox(socket_id, ip, tx);
    tracing::debug!(%socket_id, %ip, "socket connected");

    loop {
        tokio::select! {
            frame = rx.recv() => {
                match frame {
                    Some(OutboundFrame::Text(json)) => {
                        if socket.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(OutboundFrame::Compressed(bytes)) => {
                        if socket.send(Message::Binary(bytes.into())).await.is_err() {
                            break;
                        }
                    }
                    // Outbox detached (ban eviction): flush done, close.
                    None => {
                        let _ = socket.send(Message::Close(None)).await;
                        break;
                    }
                }
            }

            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        // Fail-closed: a banned or blocked IP gets the
                        // typed event and the connection is dropped.
                        let rejected = {
                            let guard = state.guard.lock().await;
                            guard.is_banned(ip) || guard.is_blocked(ip)
                        };
                        if rejected {
                            // Send directly: the outbox will not be
                            // drained again once we break.
                            let banned = ServerEvent::Banned {
                                reason: "forbidden".into(),
                            };
                            if let Ok(OutboundFrame::Text(json)) = wordbomb_protocol::encode_frame(&banned) {
                                let _ = socket.send(Message::Text(json.into())).await;
                            }
                            break;
                        }

                        match decode_text::<ClientEvent>(&text) {
                            Ok(event) => {
                                coordinator::handle_event(&state, socket_id, ip, event).await;
                            }
                            Err(e) => {
                                tracing::debug!(%socket_id, error = %e, "undecodable event dropped");
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // binary/pong from clients: ignored
                    Some(Err(e)) => {
                        tracing::debug!(%socket_id, error = %e, "socket error");
                        break;
                    }
                }
            }
        }
    }

    state.detach_outbox(socket_id);
    tracing::debug!(%socket_id, "socket closed");
    on_socket_closed(&state, socket_id).await;
}

/// Transport-level disconnect: detach the session's socket (stage 1,
/// nothing broadcast) and schedule the grace stages when the session
/// sits in a room.
pub async fn on_socket_closed(state: &Arc<ServerState>, socket_id: wordbomb_protocol::SocketId) {
    let mut sessions = state.sessions.lock().await;
    let Some((token, stamp)) = sessions.unregister(socket_id) else {
        return;
    };
    let in_room = sessions
        .session_by_token(&token)
        .and_then(|s| s.room.clone())
        .is_some();
    drop(sessions);

    if in_room {
        spawn_disconnect_stages(Arc::clone(state), token, stamp);
    }
}

/// Ban propagation: every session whose socket maps to `ip` receives a
/// typed `banned` event, is dropped from its room, and is closed.
pub async fn evict_ip(state: &Arc<ServerState>, ip: IpAddr) {
    let sockets = state.sockets_for_ip(ip);
    for socket in &sockets {
        state.send_to(
            *socket,
            &ServerEvent::Banned {
                reason: "forbidden".into(),
            },
        );
    }

    // Resolve the affected sessions before the sockets go away.
    let tokens = {
        let sessions = state.sessions.lock().await;
        sessions.tokens_for_sockets(&sockets)
    };

    // Detaching drops the outbox sender; each writer flushes what is
    // queued (the banned event) and closes its socket.
    for socket in &sockets {
        state.detach_outbox(*socket);
    }

    // Banned players leave their rooms now, not after the grace window.
    for token in tokens {
        let room_id = {
            let sessions = state.sessions.lock().await;
            sessions
                .session_by_token(&token)
                .and_then(|s| s.room.clone())
        };
        if let Some(room_id) = room_id {
            coordinator::leave_room(state, &token, &room_id).await;
        }
    }

    if !sockets.is_empty() {
        tracing::info!(%ip, count = sockets.len(), "evicted sockets for banned ip");
    }
}
