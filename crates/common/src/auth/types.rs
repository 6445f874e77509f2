//! OAuth 2.0 types and structures
//!
//! Wire formats of the identity platform endpoints (device authorization,
//! token, error responses) and the token set cached per connection.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use workbridge_domain::constants::{DEFAULT_DEVICE_CODE_EXPIRES_SECS, DEFAULT_VERIFICATION_URI};

/// Default polling interval when the device authorization response omits it.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Access and refresh tokens with metadata, as cached per connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSet {
    pub access_token: String,

    /// Optional because the platform only issues one for `offline_access`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub scopes: Vec<String>,

    /// Tenant the token was issued for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

impl TokenSet {
    /// Build a token set from a token endpoint response received at `now`.
    ///
    /// A response without `refresh_token` keeps `previous_refresh`; the
    /// refresh grant may omit it when the old one stays valid.
    #[must_use]
    pub fn from_response(
        response: TokenResponse,
        now: DateTime<Utc>,
        requested_scopes: &[String],
        tenant_id: Option<String>,
        previous_refresh: Option<String>,
    ) -> Self {
        // A lifetime beyond the representable range counts as no expiry
        let expires_at = response
            .expires_in
            .filter(|secs| *secs > 0)
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| now.checked_add_signed(lifetime));
        let scopes = response
            .scope
            .as_deref()
            .map(|s| s.split_whitespace().map(str::to_string).collect::<Vec<_>>())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| requested_scopes.to_vec());

        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token.or(previous_refresh),
            expires_at,
            scopes,
            tenant_id,
        }
    }

    /// True when the token expires within `margin` of `now`.
    ///
    /// A token without expiry is treated as valid.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => now.checked_add_signed(margin).map_or(true, |edge| edge >= expires_at),
            None => false,
        }
    }

    #[must_use]
    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Token endpoint success response (RFC 6749 §5.1)
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Device authorization response (RFC 8628 §3.2)
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCodeResponse {
    pub device_code: String,
    pub user_code: String,
    /// Older endpoints spell it `verification_url`.
    #[serde(default, alias = "verification_url")]
    pub verification_uri: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub interval: Option<u64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl DeviceCodeResponse {
    /// Polling interval with the protocol default applied.
    #[must_use]
    pub fn poll_interval_secs(&self) -> u64 {
        self.interval.filter(|i| *i > 0).unwrap_or(DEFAULT_POLL_INTERVAL_SECS)
    }
}

/// Payload handed to the host once per device-code attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCodeInfo {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub expires_in_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<&DeviceCodeResponse> for DeviceCodeInfo {
    fn from(response: &DeviceCodeResponse) -> Self {
        Self {
            device_code: response.device_code.clone(),
            user_code: response.user_code.clone(),
            verification_uri: response
                .verification_uri
                .clone()
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_VERIFICATION_URI.to_string()),
            expires_in_secs: response
                .expires_in
                .filter(|e| *e > 0)
                .unwrap_or(DEFAULT_DEVICE_CODE_EXPIRES_SECS),
            message: response.message.clone(),
        }
    }
}

/// OAuth error response (RFC 6749 §5.2, RFC 8628 §3.5)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OAuthError {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Error codes the device-code poller reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthErrorKind {
    AuthorizationPending,
    SlowDown,
    ExpiredToken,
    AuthorizationDeclined,
    AccessDenied,
    InvalidGrant,
    Other,
}

impl OAuthError {
    #[must_use]
    pub fn kind(&self) -> OAuthErrorKind {
        match self.error.as_str() {
            "authorization_pending" => OAuthErrorKind::AuthorizationPending,
            "slow_down" => OAuthErrorKind::SlowDown,
            "expired_token" | "code_expired" => OAuthErrorKind::ExpiredToken,
            "authorization_declined" => OAuthErrorKind::AuthorizationDeclined,
            "access_denied" => OAuthErrorKind::AccessDenied,
            "invalid_grant" => OAuthErrorKind::InvalidGrant,
            _ => OAuthErrorKind::Other,
        }
    }
}

impl fmt::Display for OAuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(desc) => write!(f, "{}: {}", self.error, desc),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for OAuthError {}
