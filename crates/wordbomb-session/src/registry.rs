//! The session registry: every logical player the server knows about.
//!
//! Two maps kept in sync: token → session and socket → token. Lookups
//! in both directions are O(1) and happen on every inbound event.
//!
//! # Concurrency note
//!
//! `SessionRegistry` is NOT thread-safe by itself -- it uses plain
//! `HashMap`s. It is owned by the server's shared state and accessed
//! through a mutex at a higher level; keeping it simple here avoids
//! hidden locking overhead.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use wordbomb_protocol::{RoomId, SocketId};

use crate::{Session, SessionError};

/// Registry of all sessions, connected or within their grace window.
///
/// ```text
/// register() ──→ [Connected] ──unregister()──→ [Detached]
///                    ↑                              │
///                    └───────── register() ─────────┘
///                                                   │ idle, no room
///                                                   ▼
///                                              reap_idle()
/// ```
#[derive(Default)]
pub struct SessionRegistry {
    by_token: HashMap<String, Session>,
    by_socket: HashMap<SocketId, String>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a token to a socket, creating the session on first contact.
    ///
    /// If the token already has a session, its previous socket binding is
    /// detached first and the disconnect stamp is cleared -- this is the
    /// reconnection path, and clearing the stamp voids any pending grace
    /// callbacks.
    pub fn register(&mut self, token: &str, socket: SocketId) -> &Session {
        if let Some(session) = self.by_token.get_mut(token) {
            if let Some(old) = session.socket.take() {
                self.by_socket.remove(&old);
            }
            session.socket = Some(socket);
            session.last_disconnect = None;
            self.by_socket.insert(socket, token.to_string());
            tracing::debug!(%token, %socket, "session rebound to new socket");
        } else {
            self.by_token
                .insert(token.to_string(), Session::new(token.to_string(), socket));
            self.by_socket.insert(socket, token.to_string());
            tracing::debug!(%token, %socket, "session created");
        }
        self.by_token.get(token).expect("just inserted")
    }

    /// Detaches a socket, leaving the session alive for grace-period
    /// lookups. Returns the token and the new disconnect stamp.
    pub fn unregister(&mut self, socket: SocketId) -> Option<(String, Instant)> {
        let token = self.by_socket.remove(&socket)?;
        let session = self.by_token.get_mut(&token)?;
        // Only clear if this socket is still the bound one; a raced
        // re-register may already have moved the session on.
        if session.socket == Some(socket) {
            session.socket = None;
            let stamp = Instant::now();
            session.last_disconnect = Some(stamp);
            tracing::debug!(%token, %socket, "socket detached, grace window open");
            return Some((token, stamp));
        }
        None
    }

    pub fn token_by_socket(&self, socket: SocketId) -> Option<&str> {
        self.by_socket.get(&socket).map(String::as_str)
    }

    pub fn session_by_token(&self, token: &str) -> Option<&Session> {
        self.by_token.get(token)
    }

    pub fn session_by_token_mut(&mut self, token: &str) -> Option<&mut Session> {
        self.by_token.get_mut(token)
    }

    /// Records which room a session is in (or `None` on leave).
    pub fn set_room(&mut self, token: &str, room: Option<RoomId>) -> Result<(), SessionError> {
        let session = self
            .by_token
            .get_mut(token)
            .ok_or_else(|| SessionError::NotFound(token.to_string()))?;
        session.room = room;
        Ok(())
    }

    /// The socket currently bound to a token, if any.
    pub fn socket_for(&self, token: &str) -> Option<SocketId> {
        self.by_token.get(token).and_then(|s| s.socket)
    }

    /// Sessions with no socket and no room for longer than `max_idle`
    /// are dropped. Returns the reaped tokens.
    pub fn reap_idle(&mut self, max_idle: Duration) -> Vec<String> {
        let now = Instant::now();
        let mut reaped = Vec::new();
        self.by_token.retain(|token, session| {
            let idle = session.socket.is_none()
                && session.room.is_none()
                && session
                    .last_disconnect
                    .is_some_and(|at| now.duration_since(at) > max_idle);
            if idle {
                reaped.push(token.clone());
            }
            !idle
        });
        if !reaped.is_empty() {
            tracing::info!(count = reaped.len(), "idle sessions reaped");
        }
        reaped
    }

    /// All tokens whose session is currently bound to one of `sockets`.
    pub fn tokens_for_sockets(&self, sockets: &[SocketId]) -> Vec<String> {
        sockets
            .iter()
            .filter_map(|s| self.by_socket.get(s).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sock(id: u64) -> SocketId {
        SocketId(id)
    }

    #[test]
    fn test_register_new_token_creates_connected_session() {
        let mut reg = SessionRegistry::new();

        let session = reg.register("tok-a", sock(1));

        assert_eq!(session.token, "tok-a");
        assert_eq!(session.socket, Some(sock(1)));
        assert!(session.last_disconnect.is_none());
        assert_eq!(reg.token_by_socket(sock(1)), Some("tok-a"));
    }

    #[test]
    fn test_register_same_token_twice_keeps_one_session() {
        // Reconnect with a fresh socket: exactly one session remains,
        // bound to the new socket, and the old socket no longer resolves.
        let mut reg = SessionRegistry::new();
        reg.register("tok-a", sock(1));

        reg.register("tok-a", sock(2));

        assert_eq!(reg.len(), 1);
        assert_eq!(reg.socket_for("tok-a"), Some(sock(2)));
        assert_eq!(reg.token_by_socket(sock(1)), None);
        assert_eq!(reg.token_by_socket(sock(2)), Some("tok-a"));
    }

    #[test]
    fn test_register_clears_disconnect_stamp() {
        let mut reg = SessionRegistry::new();
        reg.register("tok-a", sock(1));
        reg.unregister(sock(1));
        assert!(reg.session_by_token("tok-a").unwrap().last_disconnect.is_some());

        reg.register("tok-a", sock(2));

        assert!(reg.session_by_token("tok-a").unwrap().last_disconnect.is_none());
    }

    #[test]
    fn test_unregister_keeps_session_for_grace_lookup() {
        let mut reg = SessionRegistry::new();
        reg.register("tok-a", sock(1));

        let (token, _stamp) = reg.unregister(sock(1)).expect("should detach");

        assert_eq!(token, "tok-a");
        let session = reg.session_by_token("tok-a").unwrap();
        assert!(session.socket.is_none());
        assert!(!session.is_connected());
        assert_eq!(reg.token_by_socket(sock(1)), None);
    }

    #[test]
    fn test_unregister_unknown_socket_is_none() {
        let mut reg = SessionRegistry::new();
        assert!(reg.unregister(sock(99)).is_none());
    }

    #[test]
    fn test_unregister_stale_socket_after_rebind_is_noop() {
        // Socket 1 is replaced by socket 2, then the old transport's
        // close arrives late. It must not clobber the live binding.
        let mut reg = SessionRegistry::new();
        reg.register("tok-a", sock(1));
        reg.register("tok-a", sock(2));

        assert!(reg.unregister(sock(1)).is_none());
        assert_eq!(reg.socket_for("tok-a"), Some(sock(2)));
    }

    #[test]
    fn test_set_room_round_trip() {
        let mut reg = SessionRegistry::new();
        reg.register("tok-a", sock(1));

        reg.set_room("tok-a", Some(wordbomb_protocol::RoomId::from("r1")))
            .unwrap();
        assert_eq!(
            reg.session_by_token("tok-a").unwrap().room,
            Some(wordbomb_protocol::RoomId::from("r1"))
        );

        reg.set_room("tok-a", None).unwrap();
        assert!(reg.session_by_token("tok-a").unwrap().room.is_none());
    }

    #[test]
    fn test_set_room_unknown_token_errors() {
        let mut reg = SessionRegistry::new();
        let result = reg.set_room("ghost", None);
        assert!(matches!(result, Err(SessionError::NotFound(_))));
    }

    #[test]
    fn test_reap_idle_removes_detached_roomless_sessions() {
        let mut reg = SessionRegistry::new();
        reg.register("idle", sock(1));
        reg.register("in-room", sock(2));
        reg.register("live", sock(3));

        reg.unregister(sock(1));
        reg.unregister(sock(2));
        reg.set_room("in-room", Some(wordbomb_protocol::RoomId::from("r1")))
            .unwrap();

        // Zero max idle: anything detached is immediately stale.
        let reaped = reg.reap_idle(Duration::ZERO);

        assert_eq!(reaped, vec!["idle".to_string()]);
        assert!(reg.session_by_token("idle").is_none());
        // Referenced by a room → retained.
        assert!(reg.session_by_token("in-room").is_some());
        // Still connected → retained.
        assert!(reg.session_by_token("live").is_some());
    }

    #[test]
    fn test_reap_idle_keeps_sessions_within_grace() {
        let mut reg = SessionRegistry::new();
        reg.register("tok-a", sock(1));
        reg.unregister(sock(1));

        let reaped = reg.reap_idle(Duration::from_secs(3600));

        assert!(reaped.is_empty());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_tokens_for_sockets_resolves_only_bound() {
        let mut reg = SessionRegistry::new();
        reg.register("a", sock(1));
        reg.register("b", sock(2));
        reg.unregister(sock(2));

        let tokens = reg.tokens_for_sockets(&[sock(1), sock(2), sock(3)]);
        assert_eq!(tokens, vec!["a".to_string()]);
    }
}
