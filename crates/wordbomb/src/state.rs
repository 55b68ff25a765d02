//! Shared server state: the single logical authority over all rooms.
//!
//! One `ServerState` is wrapped in an `Arc` and handed to every
//! connection task, timer task, and HTTP handler. Interior mutability is
//! per concern:
//!
//! - `sessions`, `rooms`, `guard` -- tokio mutexes; every handler and
//!   timer callback locks, runs to completion, and releases.
//! - `outboxes` -- std mutex; sends are non-blocking unbounded pushes, so
//!   broadcasts complete before the caller returns and can be issued
//!   while the room lock is held.
//! - `dict` -- lock-free snapshot handle; rebuilds swap atomically.
//!
//! Lock order where several are needed: sessions → rooms. The outbox
//! mutex is a leaf and is never held across an await.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex as StdMutex;

use tokio::sync::{mpsc, Mutex};

use wordbomb_dict::IndexHandle;
use wordbomb_guard::Guard;
use wordbomb_protocol::{encode_frame, OutboundFrame, ServerEvent, SocketId};
use wordbomb_room::{Room, RoomRegistry};
use wordbomb_session::SessionRegistry;

use crate::config::Config;
use crate::store::Stores;

/// Counter for socket IDs; transport identity only.
static NEXT_SOCKET_ID: AtomicU64 = AtomicU64::new(1);

pub fn next_socket_id() -> SocketId {
    SocketId(NEXT_SOCKET_ID.fetch_add(1, Ordering::Relaxed))
}

/// Per-connection outbound channel plus the peer's IP for ban eviction.
pub struct Outbox {
    pub sender: mpsc::UnboundedSender<OutboundFrame>,
    pub ip: IpAddr,
}

/// Everything the server shares across tasks.
pub struct ServerState {
    pub config: Config,
    pub dict: IndexHandle,
    pub guard: Mutex<Guard>,
    pub sessions: Mutex<SessionRegistry>,
    pub rooms: Mutex<RoomRegistry>,
    pub stores: Stores,
    outboxes: StdMutex<HashMap<SocketId, Outbox>>,
}

impl ServerState {
    pub fn new(config: Config, guard: Guard, stores: Stores) -> Self {
        Self {
            config,
            dict: IndexHandle::new(),
            guard: Mutex::new(guard),
            sessions: Mutex::new(SessionRegistry::new()),
            rooms: Mutex::new(RoomRegistry::new()),
            stores,
            outboxes: StdMutex::new(HashMap::new()),
        }
    }

    /// Registers a connection's outbound channel.
    pub fn attach_outbox(&self, socket: SocketId, ip: IpAddr, sender: mpsc::UnboundedSender<OutboundFrame>) {
        if let Ok(mut outboxes) = self.outboxes.lock() {
            outboxes.insert(socket, Outbox { sender, ip });
        }
    }

    /// Drops a connection's outbound channel; the writer task ends when
    /// its receiver drains.
    pub fn detach_outbox(&self, socket: SocketId) {
        if let Ok(mut outboxes) = self.outboxes.lock() {
            outboxes.remove(&socket);
        }
    }

    /// Sends one event to one socket. Encoding failures and gone
    /// receivers are logged and dropped -- a dead socket is cleaned up by
    /// its own connection task.
    pub fn send_to(&self, socket: SocketId, event: &ServerEvent) {
        let frame = match encode_frame(event) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode outbound event");
                return;
            }
        };
        if let Ok(outboxes) = self.outboxes.lock() {
            if let Some(outbox) = outboxes.get(&socket) {
                let _ = outbox.sender.send(frame);
            }
        }
    }

    /// Delivers one event to every socket in the room, before returning.
    pub fn broadcast_room(&self, room: &Room, event: &ServerEvent) {
        let frame = match encode_frame(event) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode broadcast");
                return;
            }
        };
        if let Ok(outboxes) = self.outboxes.lock() {
            for socket in room.member_sockets() {
                if let Some(outbox) = outboxes.get(&socket) {
                    let _ = outbox.sender.send(frame.clone());
                }
            }
        }
    }

    /// All sockets currently connected from `ip`.
    pub fn sockets_for_ip(&self, ip: IpAddr) -> Vec<SocketId> {
        match self.outboxes.lock() {
            Ok(outboxes) => outboxes
                .iter()
                .filter(|(_, o)| o.ip == ip)
                .map(|(s, _)| *s)
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}
