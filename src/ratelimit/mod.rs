//! Single-flight-per-window rate limiting.
//!
//! A [`RateLimiter`] admits at most one call per cooldown window and drops
//! every other call instead of queuing it. It bounds how often an operation
//! is *started*, not how many run concurrently over time.
//!
//! # Architecture
//!
//! - [`RateLimiter`]: the state machine, `Idle` ⇄ `CoolingDown`
//! - [`RateLimitConfig`]: window length and the reset-on-failure policy
//! - [`Clock`]: time and one-shot timers, [`SystemClock`] or [`ManualClock`]
//! - [`Throttled`]: outcome of a call attempt

mod clock;
mod config;
mod limiter;

use std::time::Duration;

pub use clock::{Clock, ManualClock, SystemClock, TimerCallback};
pub use config::RateLimitConfig;
pub use limiter::{Phase, RateLimiter};

/// Outcome of an attempt to run a rate-limited call.
///
/// A suppressed call is neither a value nor an error: it simply did not run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Throttled<T> {
    /// The call ran and produced this value
    Admitted(T),
    /// The call did not run because a window was still cooling down
    Suppressed {
        /// Time left until the window ends
        remaining: Duration,
    },
}

impl<T> Throttled<T> {
    /// Whether the call was dropped
    #[must_use]
    pub const fn is_suppressed(&self) -> bool {
        matches!(self, Self::Suppressed { .. })
    }

    /// The value of an admitted call
    #[must_use]
    pub fn admitted(self) -> Option<T> {
        match self {
            Self::Admitted(value) => Some(value),
            Self::Suppressed { .. } => None,
        }
    }

    /// Map the value of an admitted call
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Throttled<U> {
        match self {
            Self::Admitted(value) => Throttled::Admitted(f(value)),
            Self::Suppressed { remaining } => Throttled::Suppressed { remaining },
        }
    }
}
