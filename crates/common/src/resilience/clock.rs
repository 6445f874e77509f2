//! Time abstraction for testability
//!
//! Lifecycle code records timestamps as epoch milliseconds; taking them from
//! a `Clock` lets tests pin "now" without sleeping.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

/// Source of wall-clock time
pub trait Clock: Send + Sync + 'static {
    fn now_utc(&self) -> DateTime<Utc>;

    /// Milliseconds since the UNIX epoch.
    fn now_millis(&self) -> i64 {
        self.now_utc().timestamp_millis()
    }
}

/// Real system clock for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<T: Clock> Clock for Arc<T> {
    fn now_utc(&self) -> DateTime<Utc> {
        (**self).now_utc()
    }
}

/// Manually driven clock for tests
///
/// Clones share the same time, so a test can keep one handle and hand the
/// other to the code under test.
#[derive(Debug, Clone)]
pub struct MockClock {
    now_ms: Arc<Mutex<i64>>,
}

impl MockClock {
    /// Clock frozen at the given epoch milliseconds.
    #[must_use]
    pub fn at_millis(now_ms: i64) -> Self {
        Self { now_ms: Arc::new(Mutex::new(now_ms)) }
    }

    /// Clock frozen at the current system time.
    #[must_use]
    pub fn new() -> Self {
        Self::at_millis(Utc::now().timestamp_millis())
    }

    pub fn set_millis(&self, now_ms: i64) {
        *self.now_ms.lock() = now_ms;
    }

    pub fn advance(&self, duration: std::time::Duration) {
        let delta = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        let mut now = self.now_ms.lock();
        *now = now.saturating_add(delta);
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        let ms = *self.now_ms.lock();
        Utc.timestamp_millis_opt(ms).single().unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    fn now_millis(&self) -> i64 {
        *self.now_ms.lock()
    }
}
