//! Turn clock for wordbomb rounds.
//!
//! Each active round owns exactly one deadline. The clock supports
//! **pause** (freeze the remaining time without drift) and **resume**
//! (continue from the frozen remainder against a new deadline), both on
//! the monotonic clock -- wall-clock time is never involved.
//!
//! Deadlines are [`tokio::time::Instant`]s so schedulers can
//! `sleep_until` them directly and tests can drive them with
//! `tokio::time::pause`.
//!
//! # Generations
//!
//! Expiry is driven by spawned tasks that sleep until the deadline and
//! then re-lock server state. Any state change that invalidates a
//! pending expiry (word accepted, pause, round replaced, room deleted)
//! bumps the clock's generation; an expiry task whose captured
//! generation no longer matches must no-op. This is what guarantees two
//! racing expirations can never both charge a life.
//!
//! # Integration
//!
//! ```ignore
//! let gen = room.game.clock.arm(total);
//! tokio::spawn(async move {
//!     tokio::time::sleep_until(deadline).await;
//!     let mut rooms = state.rooms.lock().await;
//!     let Some(room) = rooms.get_mut(&room_id) else { return };
//!     if room.game.clock.generation() != gen { return; } // superseded
//!     // apply the timeout
//! });
//! ```

use std::time::Duration;

use tokio::time::Instant;

/// Minimum remaining time granted when a paused round resumes.
pub const RESUME_FLOOR: Duration = Duration::from_secs(3);

/// A single round's timer: armed, paused, or idle.
///
/// State machine (generation bumps marked `*`):
///
/// ```text
///   Idle ──arm*──→ Armed ──pause*──→ Paused
///    ↑               │                  │
///    └───disarm*─────┴──────────────────┘ (resume* → Armed)
/// ```
#[derive(Debug, Clone)]
pub struct TurnClock {
    deadline: Option<Instant>,
    total: Duration,
    paused: bool,
    paused_remaining: Option<Duration>,
    generation: u64,
}

impl Default for TurnClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnClock {
    /// A fresh, idle clock.
    pub fn new() -> Self {
        Self {
            deadline: None,
            total: Duration::ZERO,
            paused: false,
            paused_remaining: None,
            generation: 0,
        }
    }

    /// Arms the clock for a full turn of `total`, replacing any previous
    /// state. Returns the new generation.
    pub fn arm(&mut self, total: Duration) -> u64 {
        self.arm_at(total, Instant::now())
    }

    pub fn arm_at(&mut self, total: Duration, now: Instant) -> u64 {
        self.deadline = Some(now + total);
        self.total = total;
        self.paused = false;
        self.paused_remaining = None;
        self.generation += 1;
        tracing::trace!(gen = self.generation, total_ms = total.as_millis() as u64, "turn clock armed");
        self.generation
    }

    /// Stops the clock entirely. Any pending expiry task is superseded.
    pub fn disarm(&mut self) {
        self.deadline = None;
        self.paused = false;
        self.paused_remaining = None;
        self.generation += 1;
    }

    /// Freezes the remaining time. Idempotent; a no-op unless armed.
    ///
    /// Returns the frozen remainder when the pause took effect.
    pub fn pause(&mut self) -> Option<Duration> {
        self.pause_at(Instant::now())
    }

    pub fn pause_at(&mut self, now: Instant) -> Option<Duration> {
        if self.paused {
            return self.paused_remaining;
        }
        let deadline = self.deadline.take()?;
        let remaining = deadline.saturating_duration_since(now);
        self.paused = true;
        self.paused_remaining = Some(remaining);
        self.generation += 1;
        tracing::debug!(
            gen = self.generation,
            remaining_ms = remaining.as_millis() as u64,
            "turn clock paused"
        );
        Some(remaining)
    }

    /// Resumes from the frozen remainder, floored at [`RESUME_FLOOR`] so
    /// a reconnected player gets a playable turn. Returns the new
    /// generation and the granted remainder; `None` if not paused.
    pub fn resume(&mut self) -> Option<(u64, Duration)> {
        self.resume_at(Instant::now())
    }

    pub fn resume_at(&mut self, now: Instant) -> Option<(u64, Duration)> {
        if !self.paused {
            return None;
        }
        let remaining = self.paused_remaining.take()?.max(RESUME_FLOOR);
        self.paused = false;
        self.deadline = Some(now + remaining);
        self.generation += 1;
        tracing::debug!(
            gen = self.generation,
            remaining_ms = remaining.as_millis() as u64,
            "turn clock resumed"
        );
        Some((self.generation, remaining))
    }

    /// Time left on the clock: the live remainder while armed, the
    /// frozen remainder while paused, zero when idle.
    pub fn remaining(&self) -> Duration {
        self.remaining_at(Instant::now())
    }

    pub fn remaining_at(&self, now: Instant) -> Duration {
        if self.paused {
            return self.paused_remaining.unwrap_or(Duration::ZERO);
        }
        match self.deadline {
            Some(deadline) => deadline.saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }

    /// `true` once an armed deadline has passed.
    pub fn expired_at(&self, now: Instant) -> bool {
        !self.paused && self.deadline.is_some_and(|d| now >= d)
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some() && !self.paused
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// The deadline of the armed turn, for `sleep_until` scheduling.
    pub fn deadline(&self) -> Option<Instant> {
        if self.paused {
            None
        } else {
            self.deadline
        }
    }

    /// Full duration of the current turn.
    pub fn total(&self) -> Duration {
        self.total
    }

    /// Current generation; expiry tasks capture and re-check this.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TURN: Duration = Duration::from_secs(8);

    #[test]
    fn test_new_clock_is_idle() {
        let clock = TurnClock::new();
        assert!(!clock.is_armed());
        assert!(!clock.is_paused());
        assert_eq!(clock.remaining(), Duration::ZERO);
        assert!(clock.deadline().is_none());
    }

    #[test]
    fn test_arm_sets_deadline_and_bumps_generation() {
        let mut clock = TurnClock::new();
        let now = Instant::now();

        let gen = clock.arm_at(TURN, now);

        assert_eq!(gen, 1);
        assert!(clock.is_armed());
        assert_eq!(clock.total(), TURN);
        assert_eq!(clock.remaining_at(now), TURN);
        assert_eq!(clock.remaining_at(now + Duration::from_secs(3)), Duration::from_secs(5));
    }

    #[test]
    fn test_rearm_replaces_previous_turn() {
        // Timers are replaced, never nested: re-arming supersedes the
        // old deadline and its pending expiry task.
        let mut clock = TurnClock::new();
        let now = Instant::now();
        let gen1 = clock.arm_at(TURN, now);
        let gen2 = clock.arm_at(Duration::from_secs(10), now + Duration::from_secs(4));

        assert_ne!(gen1, gen2);
        assert_eq!(
            clock.remaining_at(now + Duration::from_secs(4)),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn test_pause_freezes_remaining_without_drift() {
        let mut clock = TurnClock::new();
        let now = Instant::now();
        clock.arm_at(TURN, now);

        let frozen = clock.pause_at(now + Duration::from_secs(3)).unwrap();

        assert_eq!(frozen, Duration::from_secs(5));
        assert!(clock.is_paused());
        assert!(!clock.is_armed());
        // However long the pause lasts, the remainder does not move.
        assert_eq!(
            clock.remaining_at(now + Duration::from_secs(500)),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_pause_is_idempotent() {
        let mut clock = TurnClock::new();
        let now = Instant::now();
        clock.arm_at(TURN, now);

        let first = clock.pause_at(now + Duration::from_secs(2));
        let gen_after_first = clock.generation();
        let second = clock.pause_at(now + Duration::from_secs(6));

        assert_eq!(first, second);
        assert_eq!(clock.generation(), gen_after_first);
    }

    #[test]
    fn test_pause_when_idle_is_none() {
        let mut clock = TurnClock::new();
        assert!(clock.pause().is_none());
    }

    #[test]
    fn test_resume_continues_from_frozen_remainder() {
        let mut clock = TurnClock::new();
        let now = Instant::now();
        clock.arm_at(TURN, now);
        clock.pause_at(now + Duration::from_secs(3));

        // Resume much later; remaining picks up at 5 s, not 8 - elapsed.
        let resume_at = now + Duration::from_secs(60);
        let (_gen, granted) = clock.resume_at(resume_at).unwrap();

        assert_eq!(granted, Duration::from_secs(5));
        assert!(clock.is_armed());
        assert_eq!(
            clock.remaining_at(resume_at + Duration::from_secs(1)),
            Duration::from_secs(4)
        );
    }

    #[test]
    fn test_resume_floors_at_three_seconds() {
        // Pausing just before expiry leaves almost nothing; the resumed
        // player still gets a fair 3 s.
        let mut clock = TurnClock::new();
        let now = Instant::now();
        clock.arm_at(TURN, now);
        clock.pause_at(now + Duration::from_millis(7900));

        let (_gen, granted) = clock.resume_at(now + Duration::from_secs(20)).unwrap();

        assert_eq!(granted, RESUME_FLOOR);
    }

    #[test]
    fn test_resume_when_not_paused_is_none() {
        let mut clock = TurnClock::new();
        clock.arm(TURN);
        assert!(clock.resume().is_none());
    }

    #[test]
    fn test_pause_and_resume_bump_generation() {
        // Both transitions must supersede any in-flight expiry task.
        let mut clock = TurnClock::new();
        let now = Instant::now();
        let armed = clock.arm_at(TURN, now);

        clock.pause_at(now + Duration::from_secs(1));
        let paused = clock.generation();
        assert!(paused > armed);

        clock.resume_at(now + Duration::from_secs(2));
        assert!(clock.generation() > paused);
    }

    #[test]
    fn test_disarm_clears_everything() {
        let mut clock = TurnClock::new();
        let now = Instant::now();
        let gen = clock.arm_at(TURN, now);

        clock.disarm();

        assert!(!clock.is_armed());
        assert!(!clock.is_paused());
        assert_eq!(clock.remaining_at(now), Duration::ZERO);
        assert!(clock.generation() > gen);
    }

    #[test]
    fn test_expired_at_tracks_deadline() {
        let mut clock = TurnClock::new();
        let now = Instant::now();
        clock.arm_at(TURN, now);

        assert!(!clock.expired_at(now + Duration::from_secs(7)));
        assert!(clock.expired_at(now + Duration::from_secs(8)));
        assert!(clock.expired_at(now + Duration::from_secs(9)));
    }

    #[test]
    fn test_paused_clock_never_expires() {
        let mut clock = TurnClock::new();
        let now = Instant::now();
        clock.arm_at(TURN, now);
        clock.pause_at(now + Duration::from_secs(1));

        assert!(!clock.expired_at(now + Duration::from_secs(600)));
        assert!(clock.deadline().is_none());
    }

    #[test]
    fn test_playing_invariant_armed_xor_paused() {
        // While a round is live the clock is in exactly one of two
        // states: armed with a future deadline, or paused with a frozen
        // remainder.
        let mut clock = TurnClock::new();
        let now = Instant::now();

        clock.arm_at(TURN, now);
        assert!(clock.is_armed() ^ clock.is_paused());

        clock.pause_at(now + Duration::from_secs(2));
        assert!(clock.is_armed() ^ clock.is_paused());

        clock.resume_at(now + Duration::from_secs(4));
        assert!(clock.is_armed() ^ clock.is_paused());
    }
}
