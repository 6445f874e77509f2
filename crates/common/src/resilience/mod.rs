//! Resilience helpers for the connection lifecycle
//!
//! - **Refresh backoff**: exponential, capped windows after failed token
//!   refreshes. Purely data; nothing here schedules a retry.
//! - **Clock**: wall-clock abstraction so lifecycle code stays deterministic
//!   under test.

pub mod backoff;
pub mod clock;

pub use backoff::{refresh_backoff, RefreshBackoff};
pub use clock::{Clock, MockClock, SystemClock};
