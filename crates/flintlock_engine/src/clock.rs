//! Session clocks.
//!
//! A session owns exactly one clock: either the wall clock or a manually
//! advanced pseudo-clock for deterministic temporal testing. Advancing
//! the pseudo-clock is the caller's job; it never fires rules by itself.

use chrono::Utc;
use flintlock_foundation::{Error, Result, TimeDelta, Timestamp, pseudo_epoch};

/// Logical time source owned by a session.
#[derive(Clone, Debug)]
pub enum SessionClock {
    /// Wall-clock time.
    Realtime,
    /// Manually advanced logical time, starting at the pseudo-epoch.
    Pseudo {
        /// The current logical instant.
        now: Timestamp,
    },
}

impl SessionClock {
    /// Creates a wall-clock time source.
    #[must_use]
    pub const fn realtime() -> Self {
        Self::Realtime
    }

    /// Creates a pseudo-clock starting at the pseudo-epoch.
    #[must_use]
    pub fn pseudo() -> Self {
        Self::Pseudo {
            now: pseudo_epoch(),
        }
    }

    /// Creates a pseudo-clock starting at the given instant.
    #[must_use]
    pub const fn pseudo_at(start: Timestamp) -> Self {
        Self::Pseudo { now: start }
    }

    /// Returns the current instant.
    #[must_use]
    pub fn now(&self) -> Timestamp {
        match self {
            Self::Realtime => Utc::now(),
            Self::Pseudo { now } => *now,
        }
    }

    /// Advances a pseudo-clock by the given delta, returning the new
    /// instant.
    ///
    /// # Errors
    /// Fails with an unsupported-clock-mode error on a realtime clock.
    pub fn advance(&mut self, delta: TimeDelta) -> Result<Timestamp> {
        match self {
            Self::Realtime => Err(Error::unsupported_clock_mode()),
            Self::Pseudo { now } => {
                *now = *now + delta;
                Ok(*now)
            }
        }
    }

    /// Returns true if this is a pseudo-clock.
    #[must_use]
    pub const fn is_pseudo(&self) -> bool {
        matches!(self, Self::Pseudo { .. })
    }
}
