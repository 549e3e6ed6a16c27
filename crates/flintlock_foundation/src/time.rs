//! Logical time for temporal rule attributes.
//!
//! Rule date windows, activation timestamps, and duration gating all use
//! `chrono` UTC instants. A session's clock is either the wall clock or a
//! manually advanced pseudo-clock starting at [`pseudo_epoch`].

use chrono::{DateTime, Utc};

/// An instant on the session's logical timeline.
pub type Timestamp = DateTime<Utc>;

/// A signed span of logical time.
pub type TimeDelta = chrono::Duration;

/// The instant a pseudo-clock starts at: the Unix epoch.
///
/// A fixed origin keeps temporal tests deterministic regardless of when
/// they run.
#[must_use]
pub fn pseudo_epoch() -> Timestamp {
    DateTime::UNIX_EPOCH
}
