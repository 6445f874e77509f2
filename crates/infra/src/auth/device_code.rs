//! OAuth 2.0 device authorization grant against the Entra identity platform
//!
//! Endpoints: `{authority}/{tenant}/oauth2/v2.0/devicecode` and
//! `{authority}/{tenant}/oauth2/v2.0/token`.

use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use workbridge_common::auth::{DeviceCodeResponse, OAuthError, OAuthErrorKind, TokenResponse};
use workbridge_domain::constants::DEFAULT_DEVICE_CODE_EXPIRES_SECS;
use workbridge_domain::ConnectionError;

use crate::http::HttpClient;

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

/// Failure of a device-code or refresh exchange
#[derive(Debug, Clone, Error)]
pub enum DeviceCodeError {
    #[error("network_error: {0}")]
    Network(String),

    #[error("device code expired before sign-in completed")]
    Expired,

    #[error("sign-in was declined")]
    Declined,

    #[error("sign-in was cancelled")]
    Cancelled,

    #[error("refresh token rejected: {0}")]
    InvalidGrant(String),

    #[error("identity provider error: {0}")]
    Provider(String),

    #[error("unexpected identity provider response: {0}")]
    Parse(String),
}

impl From<ConnectionError> for DeviceCodeError {
    fn from(error: ConnectionError) -> Self {
        match error {
            ConnectionError::Network(message) => Self::Network(message),
            other => Self::Provider(other.to_string()),
        }
    }
}

impl From<OAuthError> for DeviceCodeError {
    fn from(error: OAuthError) -> Self {
        match error.kind() {
            OAuthErrorKind::ExpiredToken => Self::Expired,
            OAuthErrorKind::AuthorizationDeclined | OAuthErrorKind::AccessDenied => Self::Declined,
            OAuthErrorKind::InvalidGrant => Self::InvalidGrant(error.to_string()),
            _ => Self::Provider(error.to_string()),
        }
    }
}

/// Answer of the token endpoint
enum TokenReply {
    Granted(TokenResponse),
    Rejected(OAuthError),
}

/// Device-code and refresh-token exchanges for one client id
#[derive(Debug, Clone)]
pub struct DeviceCodeClient {
    http: HttpClient,
    authority_url: String,
    client_id: String,
    poll_interval: Option<Duration>,
    slow_down_step: Duration,
    max_wait: Duration,
}

impl DeviceCodeClient {
    pub fn new(http: HttpClient, authority_url: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            http,
            authority_url: authority_url.into(),
            client_id: client_id.into(),
            poll_interval: None,
            slow_down_step: SLOW_DOWN_STEP,
            max_wait: Duration::from_secs(DEFAULT_DEVICE_CODE_EXPIRES_SECS),
        }
    }

    /// Override the server-provided polling interval and the `slow_down`
    /// increment.
    #[must_use]
    pub fn with_poll_timing(mut self, interval: Duration, slow_down_step: Duration) -> Self {
        self.poll_interval = Some(interval);
        self.slow_down_step = slow_down_step;
        self
    }

    /// Upper bound on one attempt when the server omits or inflates `expires_in`.
    #[must_use]
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    fn endpoint(&self, tenant_id: &str, leaf: &str) -> String {
        format!("{}/{tenant_id}/oauth2/v2.0/{leaf}", self.authority_url.trim_end_matches('/'))
    }

    pub async fn request_device_code(
        &self,
        tenant_id: &str,
        scopes: &[String],
    ) -> Result<DeviceCodeResponse, DeviceCodeError> {
        let url = self.endpoint(tenant_id, "devicecode");
        let params = [("client_id", self.client_id.clone()), ("scope", scopes.join(" "))];

        let response = self.http.send_once(self.http.post(&url).form(&params)).await?;
        if !response.status().is_success() {
            let status = response.status();
            let error: OAuthError = response
                .json()
                .await
                .map_err(|e| DeviceCodeError::Parse(format!("HTTP {status}: {e}")))?;
            return Err(error.into());
        }

        let code: DeviceCodeResponse =
            response.json().await.map_err(|e| DeviceCodeError::Parse(e.to_string()))?;
        info!(tenant_id, interval_secs = code.poll_interval_secs(), "device code issued");
        Ok(code)
    }

    /// Poll the token endpoint until the user completes sign-in.
    ///
    /// Keeps polling on `authorization_pending`, backs off on `slow_down`
    /// and stops on expiry, decline, deadline or cancellation.
    pub async fn poll_for_token(
        &self,
        tenant_id: &str,
        code: &DeviceCodeResponse,
        cancel: &CancellationToken,
    ) -> Result<TokenResponse, DeviceCodeError> {
        let url = self.endpoint(tenant_id, "token");
        let params = [
            ("grant_type", DEVICE_CODE_GRANT.to_string()),
            ("client_id", self.client_id.clone()),
            ("device_code", code.device_code.clone()),
        ];

        let lifetime = code
            .expires_in
            .filter(|secs| *secs > 0)
            .map_or(self.max_wait, |secs| Duration::from_secs(secs).min(self.max_wait));
        let deadline = Instant::now() + lifetime;
        let mut interval =
            self.poll_interval.unwrap_or_else(|| Duration::from_secs(code.poll_interval_secs()));
        let mut attempt = 0u32;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(DeviceCodeError::Cancelled),
                () = tokio::time::sleep(interval) => {}
            }
            if Instant::now() >= deadline {
                return Err(DeviceCodeError::Expired);
            }

            attempt += 1;
            let request = self.http.post(&url).form(&params);
            let reply = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(DeviceCodeError::Cancelled),
                reply = self.token_reply(request) => reply?,
            };

            match reply {
                TokenReply::Granted(tokens) => {
                    info!(tenant_id, attempt, "device code sign-in completed");
                    return Ok(tokens);
                }
                TokenReply::Rejected(error) => match error.kind() {
                    OAuthErrorKind::AuthorizationPending => {
                        debug!(tenant_id, attempt, "authorization pending");
                    }
                    OAuthErrorKind::SlowDown => {
                        interval += self.slow_down_step;
                        debug!(tenant_id, attempt, interval_ms = interval.as_millis() as u64, "slowing down polling");
                    }
                    _ => return Err(error.into()),
                },
            }
        }
    }

    /// Exchange a refresh token (`grant_type=refresh_token`).
    pub async fn refresh_token(
        &self,
        tenant_id: &str,
        scopes: &[String],
        refresh_token: &str,
    ) -> Result<TokenResponse, DeviceCodeError> {
        if refresh_token.is_empty() {
            return Err(DeviceCodeError::InvalidGrant("no refresh token cached".to_string()));
        }
        let url = self.endpoint(tenant_id, "token");
        let params = [
            ("grant_type", "refresh_token".to_string()),
            ("client_id", self.client_id.clone()),
            ("refresh_token", refresh_token.to_string()),
            ("scope", scopes.join(" ")),
        ];

        match self.token_reply(self.http.post(&url).form(&params)).await? {
            TokenReply::Granted(tokens) => Ok(tokens),
            TokenReply::Rejected(error) => Err(error.into()),
        }
    }

    async fn token_reply(&self, request: reqwest::RequestBuilder) -> Result<TokenReply, DeviceCodeError> {
        let response = self.http.send_once(request).await?;
        let status = response.status();
        if status.is_success() {
            let tokens = response.json().await.map_err(|e| DeviceCodeError::Parse(e.to_string()))?;
            return Ok(TokenReply::Granted(tokens));
        }
        let error: OAuthError =
            response.json().await.map_err(|e| DeviceCodeError::Parse(format!("HTTP {status}: {e}")))?;
        Ok(TokenReply::Rejected(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_tenant_scoped() {
        let http = HttpClient::new().unwrap();
        let client = DeviceCodeClient::new(http, "https://login.example.com/", "cid");
        assert_eq!(
            client.endpoint("organizations", "devicecode"),
            "https://login.example.com/organizations/oauth2/v2.0/devicecode"
        );
        assert_eq!(
            client.endpoint("t-1", "token"),
            "https://login.example.com/t-1/oauth2/v2.0/token"
        );
    }

    #[test]
    fn oauth_errors_map_to_typed_failures() {
        let err = |code: &str| OAuthError { error: code.into(), error_description: None };
        assert!(matches!(DeviceCodeError::from(err("expired_token")), DeviceCodeError::Expired));
        assert!(matches!(DeviceCodeError::from(err("access_denied")), DeviceCodeError::Declined));
        assert!(matches!(
            DeviceCodeError::from(err("authorization_declined")),
            DeviceCodeError::Declined
        ));
        assert!(matches!(
            DeviceCodeError::from(err("invalid_grant")),
            DeviceCodeError::InvalidGrant(_)
        ));
        assert!(matches!(DeviceCodeError::from(err("server_error")), DeviceCodeError::Provider(_)));
    }

    #[test]
    fn network_errors_keep_the_network_marker() {
        let err = DeviceCodeError::from(ConnectionError::Network("HTTP connection failure".into()));
        assert!(err.to_string().starts_with("network_error"));
    }
}
