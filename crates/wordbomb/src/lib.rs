//! # wordbomb
//!
//! Real-time multiplayer syllable word-game server.
//!
//! Clients connect over a WebSocket (sharing the HTTP port); the server
//! is the single source of truth for syllable selection, turn ordering,
//! timing, validation, life accounting, and room membership.
//!
//! Layer map:
//!
//! ```text
//! ws / http / admin        ← transport + query surfaces
//!        │
//!   coordinator            ← events → room mutations → broadcasts
//!    │   │   │
//!    │   │   └─ timer      ← turn-timer + grace-stage tasks
//!    │   └─ wordbomb-room  ← rooms, players, scenario selection
//!    └─ wordbomb-session   ← token ↔ socket identity
//!
//! wordbomb-dict            ← syllable index (shared, swap-on-rebuild)
//! wordbomb-guard           ← anti-scraping verdicts
//! store                    ← staff / bans / user-log JSON backend
//! ```

pub mod admin;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod http;
pub mod server;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod timer;
pub mod ws;

pub use config::Config;
pub use error::ServerError;
pub use state::ServerState;
