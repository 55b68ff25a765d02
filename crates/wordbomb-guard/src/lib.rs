//! Anti-scraping and abuse guard for wordbomb.
//!
//! Tracks per-IP request history, enforces rate limits, accumulates a
//! suspicion score with named reasons, issues short-lived IP-bound
//! tokens, and detects honeypot hits. The transport and HTTP layers ask
//! the guard for a [`Verdict`] before any request reaches game state.
//!
//! Policy summary:
//!
//! | Signal | Weight |
//! |---|---|
//! | token used from another IP | +50 |
//! | token missing | +5 |
//! | token invalid/expired | +15 |
//! | per-minute overflow | +20 |
//! | per-hour overflow | +30 |
//! | scraper user-agent | +10 |
//! | machine-regular timing | +25 |
//! | dictionary download | +50 |
//! | honeypot hit | +100 |
//!
//! Block at 100; release when decay (1/minute) drops the score under 50;
//! forget IPs idle for 24 h.

mod guard;
mod suspicion;

pub use guard::{Guard, GuardConfig, GuardStats, TokenCheck, Verdict};
pub use suspicion::Suspicion;
