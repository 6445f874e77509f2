//! Refresh backoff calculation
//!
//! After the `n`-th consecutive refresh failure the next refresh may not be
//! attempted before `min(cap, base * 2^n)` has elapsed.

use std::time::Duration;

use workbridge_domain::constants::{REFRESH_BACKOFF_BASE_MINUTES, REFRESH_BACKOFF_CAP_MINUTES};

/// Exponential backoff with a hard cap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshBackoff {
    base: Duration,
    cap: Duration,
}

impl Default for RefreshBackoff {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(REFRESH_BACKOFF_BASE_MINUTES * 60),
            cap: Duration::from_secs(REFRESH_BACKOFF_CAP_MINUTES * 60),
        }
    }
}

impl RefreshBackoff {
    #[must_use]
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    /// Delay for a given failure count. Saturates instead of overflowing.
    #[must_use]
    pub fn delay(&self, failures: u32) -> Duration {
        let factor = 2u32.checked_pow(failures).unwrap_or(u32::MAX);
        self.base.checked_mul(factor).map_or(self.cap, |delay| delay.min(self.cap))
    }

    /// Earliest permissible next attempt, in epoch milliseconds.
    #[must_use]
    pub fn next_allowed_at_ms(&self, now_ms: i64, failures: u32) -> i64 {
        let delay_ms = i64::try_from(self.delay(failures).as_millis()).unwrap_or(i64::MAX);
        now_ms.saturating_add(delay_ms)
    }
}

/// `min(60, 5 * 2^n)` minutes.
#[must_use]
pub fn refresh_backoff(failures: u32) -> Duration {
    RefreshBackoff::default().delay(failures)
}
