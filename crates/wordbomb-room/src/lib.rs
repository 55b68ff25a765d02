//! Room lifecycle and membership for wordbomb.
//!
//! Rooms are plain records owned by a single [`RoomRegistry`] -- no
//! per-room tasks, no back-pointers. Sessions reference rooms by id and
//! rooms reference players by token; every lookup goes through a
//! registry, which keeps reaping trivial and ownership acyclic.
//!
//! The crate also hosts the scenario selector ([`choose_syllable`]),
//! which turns the dictionary index plus the room's constraints into the
//! next server-chosen syllable.

mod error;
mod registry;
mod room;
mod scenario;

pub use error::RoomError;
pub use registry::{JoinOutcome, LeaveOutcome, RoomRegistry};
pub use room::{
    Game, LeftPlayer, Player, Room, RoomPhase, RECENTLY_LEFT_TTL, SERVER_CONTROL_WINDOW,
    SUBMISSION_FLOOR,
};
pub use scenario::{choose_syllable, SEED_SYLLABLES};
