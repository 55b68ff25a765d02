//! Player session management for wordbomb.
//!
//! A session is the server's record of a logical player, keyed by the
//! client-persistent token and decoupled from the transport socket:
//!
//! 1. **Registration** -- `register(token)` on every new connection binds
//!    the token to the fresh socket ([`SessionRegistry`]).
//! 2. **Grace tracking** -- a lost socket detaches but keeps the session;
//!    the disconnect stamp is the generation counter that voids stale
//!    grace callbacks.
//! 3. **Reaping** -- sessions with no socket and no room are dropped on a
//!    maintenance cadence.
//!
//! # How it fits in the stack
//!
//! ```text
//! Coordinator (above)  ← resolves every inbound event to a token
//!     ↕
//! Session layer (this crate)  ← token ↔ socket identity
//!     ↕
//! Protocol layer (below)  ← provides SocketId, RoomId
//! ```

mod error;
mod registry;
mod session;

pub use error::SessionError;
pub use registry::SessionRegistry;
pub use session::Session;
