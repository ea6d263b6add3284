use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration of a single-flight [`crate::RateLimiter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Length of the cooldown window started by each admitted call
    #[serde(with = "humantime_serde")]
    pub window: Duration,

    /// End the window early when the admitted call fails,
    /// so that failures do not use up the caller's budget
    #[serde(default)]
    pub reset_on_success_only: bool,
}

impl RateLimitConfig {
    /// A window of `window` that is only ended by its timer
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            reset_on_success_only: false,
        }
    }

    /// Set [`RateLimitConfig::reset_on_success_only`]
    #[must_use]
    pub const fn reset_on_success_only(mut self, enabled: bool) -> Self {
        self.reset_on_success_only = enabled;
        self
    }
}
