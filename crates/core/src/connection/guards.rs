//! Transition guards and the token validity predicate

use std::time::Duration;

use workbridge_domain::constants::{DEFAULT_TOKEN_EXPIRY_MARGIN_SECS, MAX_RETRY_ATTEMPTS};
use workbridge_domain::AuthMethod;

use super::state::ConnectionContext;

/// Decides whether a cached access token is still usable
pub trait TokenValidator: Send + Sync {
    fn is_valid(&self, expires_at_ms: Option<i64>, now_ms: i64) -> bool;
}

/// Valid until `margin` before expiry; tokens without expiry are valid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryMarginValidator {
    margin: Duration,
}

impl ExpiryMarginValidator {
    #[must_use]
    pub fn new(margin: Duration) -> Self {
        Self { margin }
    }

    #[must_use]
    pub fn margin(&self) -> Duration {
        self.margin
    }
}

impl Default for ExpiryMarginValidator {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TOKEN_EXPIRY_MARGIN_SECS))
    }
}

impl TokenValidator for ExpiryMarginValidator {
    fn is_valid(&self, expires_at_ms: Option<i64>, now_ms: i64) -> bool {
        let Some(expires_at) = expires_at_ms else {
            return true;
        };
        let margin_ms = i64::try_from(self.margin.as_millis()).unwrap_or(i64::MAX);
        now_ms.saturating_add(margin_ms) < expires_at
    }
}

pub fn is_entra_auth(ctx: &ConnectionContext) -> bool {
    ctx.auth_method == AuthMethod::Entra
}

pub fn is_pat_auth(ctx: &ConnectionContext) -> bool {
    ctx.auth_method == AuthMethod::Pat
}

pub fn can_retry(ctx: &ConnectionContext) -> bool {
    ctx.retry_count < MAX_RETRY_ATTEMPTS
}

pub fn should_force_interactive_auth(ctx: &ConnectionContext) -> bool {
    ctx.force_interactive
}

/// Token present and not within the validator's expiry margin.
pub fn has_valid_token(
    token: Option<&str>,
    expires_at_ms: Option<i64>,
    now_ms: i64,
    validator: &dyn TokenValidator,
) -> bool {
    token.is_some_and(|t| !t.is_empty()) && validator.is_valid(expires_at_ms, now_ms)
}
