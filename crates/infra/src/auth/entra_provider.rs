//! Entra identity provider
//!
//! One provider per connection and tenant. The token set is persisted in the
//! [`SecretStore`] under `workbridge.entra.token.{connection_id}` so a sign-in
//! survives restarts. `authenticate` tries the cached refresh token before
//! starting a device-code flow.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use workbridge_common::auth::{DeviceCodeInfo, TokenResponse, TokenSet};
use workbridge_common::resilience::{Clock, SystemClock};
use workbridge_core::{
    AuthenticationResult, IdentityAuthProvider, IdentityProviderFactory, IdentityProviderOptions,
    SecretStore, TokenInfo,
};
use workbridge_domain::constants::ENTRA_TOKEN_CACHE_PREFIX;
use workbridge_domain::{normalize_expiry, AuthSettings, ExpiryValue, Result};

use super::device_code::{DeviceCodeClient, DeviceCodeError};
use crate::http::HttpClient;

/// Secret-store key of the cached token set for a connection.
#[must_use]
pub fn token_cache_key(connection_id: &str) -> String {
    format!("{ENTRA_TOKEN_CACHE_PREFIX}{connection_id}")
}

pub struct EntraAuthProvider {
    options: IdentityProviderOptions,
    device_codes: DeviceCodeClient,
    secrets: Arc<dyn SecretStore>,
    clock: Arc<dyn Clock>,
    expiry_margin: chrono::Duration,
    cache_key: String,
}

impl EntraAuthProvider {
    pub fn new(
        options: IdentityProviderOptions,
        device_codes: DeviceCodeClient,
        secrets: Arc<dyn SecretStore>,
    ) -> Self {
        let cache_key = token_cache_key(&options.connection_id);
        Self {
            options,
            device_codes,
            secrets,
            clock: Arc::new(SystemClock),
            expiry_margin: chrono::Duration::zero(),
            cache_key,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Tokens expiring within `margin` are not handed out by `access_token`.
    #[must_use]
    pub fn with_expiry_margin(mut self, margin: Duration) -> Self {
        self.expiry_margin = chrono::Duration::from_std(margin).unwrap_or_else(|_| chrono::Duration::zero());
        self
    }

    pub fn tenant_id(&self) -> &str {
        &self.options.tenant_id
    }

    /// Cached token set; an unreadable entry counts as absent.
    async fn load(&self) -> Option<TokenSet> {
        match self.secrets.get(&self.cache_key).await {
            Ok(Some(raw)) => {
                let decoded = decode_token_set(&raw);
                if decoded.is_none() {
                    warn!(connection_id = %self.options.connection_id, "cached Entra token is unreadable; ignoring it");
                }
                decoded
            }
            Ok(None) => None,
            Err(error) => {
                warn!(connection_id = %self.options.connection_id, error = %error, "failed to read cached Entra token");
                None
            }
        }
    }

    async fn save(&self, tokens: &TokenSet) {
        let encoded = match serde_json::to_string(tokens) {
            Ok(encoded) => encoded,
            Err(error) => {
                warn!(connection_id = %self.options.connection_id, error = %error, "failed to encode Entra token");
                return;
            }
        };
        if let Err(error) = self.secrets.store(&self.cache_key, &encoded).await {
            warn!(connection_id = %self.options.connection_id, error = %error, "failed to cache Entra token");
        }
    }

    async fn accept(&self, response: TokenResponse, previous_refresh: Option<String>) -> AuthenticationResult {
        let tokens = TokenSet::from_response(
            response,
            self.clock.now_utc(),
            &self.options.scopes,
            Some(self.options.tenant_id.clone()),
            previous_refresh,
        );
        self.save(&tokens).await;
        AuthenticationResult::succeeded(tokens.access_token.clone(), tokens.expires_at.map(ExpiryValue::from))
    }

    async fn silent_refresh(&self, cached: Option<TokenSet>) -> std::result::Result<AuthenticationResult, DeviceCodeError> {
        let Some(refresh_token) = cached.and_then(|t| t.refresh_token).filter(|t| !t.is_empty()) else {
            return Err(DeviceCodeError::InvalidGrant("no refresh token cached".to_string()));
        };
        let response = self
            .device_codes
            .refresh_token(&self.options.tenant_id, &self.options.scopes, &refresh_token)
            .await?;
        Ok(self.accept(response, Some(refresh_token)).await)
    }

    async fn device_code_flow(&self, cancel: &CancellationToken) -> std::result::Result<AuthenticationResult, DeviceCodeError> {
        let tenant_id = &self.options.tenant_id;
        let code = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(DeviceCodeError::Cancelled),
            code = self.device_codes.request_device_code(tenant_id, &self.options.scopes) => code?,
        };

        let info = DeviceCodeInfo::from(&code);
        (self.options.device_code_callback)(&info);

        let response = self.device_codes.poll_for_token(tenant_id, &code, cancel).await?;
        Ok(self.accept(response, None).await)
    }
}

impl std::fmt::Debug for EntraAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntraAuthProvider")
            .field("options", &self.options)
            .field("cache_key", &self.cache_key)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl IdentityAuthProvider for EntraAuthProvider {
    async fn is_authenticated(&self) -> bool {
        self.load().await.is_some()
    }

    async fn token_info(&self) -> Result<Option<TokenInfo>> {
        Ok(self.load().await.map(|tokens| TokenInfo {
            access_token: tokens.access_token,
            expires_at: tokens.expires_at.map(ExpiryValue::from),
        }))
    }

    async fn access_token(&self) -> Result<Option<String>> {
        let now = self.clock.now_utc();
        Ok(self
            .load()
            .await
            .filter(|tokens| !tokens.is_expired_at(now, self.expiry_margin))
            .map(|tokens| tokens.access_token))
    }

    async fn authenticate(&self, cancel: CancellationToken, force_interactive: bool) -> AuthenticationResult {
        let connection_id = &self.options.connection_id;
        // A forced sign-in ignores the cache even when purging it failed
        let cached = if force_interactive { None } else { self.load().await };
        if cached.as_ref().is_some_and(TokenSet::has_refresh_token) {
            match self.silent_refresh(cached).await {
                Ok(result) => {
                    info!(%connection_id, tenant_id = %self.options.tenant_id, "signed in silently with cached refresh token");
                    return result;
                }
                Err(error) => {
                    debug!(%connection_id, error = %error, "silent sign-in failed; starting device code flow");
                }
            }
        }

        match self.device_code_flow(&cancel).await {
            Ok(result) => result,
            Err(error) => {
                warn!(%connection_id, tenant_id = %self.options.tenant_id, error = %error, "device code sign-in failed");
                AuthenticationResult::failed(error.to_string())
            }
        }
    }

    async fn refresh(&self) -> AuthenticationResult {
        let cached = self.load().await;
        match self.silent_refresh(cached).await {
            Ok(result) => {
                debug!(connection_id = %self.options.connection_id, "Entra token refreshed");
                result
            }
            Err(error) => AuthenticationResult::failed(error.to_string()),
        }
    }

    async fn reset_token(&self) -> Result<()> {
        info!(connection_id = %self.options.connection_id, "purging cached Entra token");
        self.secrets.delete(&self.cache_key).await
    }
}

/// Decode a cached token set, accepting epoch-millis or text expiry.
pub(crate) fn decode_token_set(raw: &str) -> Option<TokenSet> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let access_token = value.get("accessToken")?.as_str()?.to_string();
    if access_token.is_empty() {
        return None;
    }
    let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);
    let expires_at = value
        .get("expiresAt")
        .and_then(ExpiryValue::from_json)
        .and_then(|expiry| normalize_expiry(Some(&expiry)))
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single());
    let scopes = value
        .get("scopes")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();

    Some(TokenSet {
        access_token,
        refresh_token: text("refreshToken"),
        expires_at,
        scopes,
        tenant_id: text("tenantId"),
    })
}

/// Builds [`EntraAuthProvider`]s sharing one HTTP client and secret store
pub struct EntraProviderFactory {
    http: HttpClient,
    secrets: Arc<dyn SecretStore>,
    authority_url: String,
    max_wait: Duration,
    poll_timing: Option<(Duration, Duration)>,
    expiry_margin: Duration,
    clock: Arc<dyn Clock>,
}

impl EntraProviderFactory {
    pub fn new(http: HttpClient, secrets: Arc<dyn SecretStore>, authority_url: impl Into<String>) -> Self {
        let defaults = AuthSettings::default();
        Self {
            http,
            secrets,
            authority_url: authority_url.into(),
            max_wait: Duration::from_secs(defaults.device_code_timeout_secs),
            poll_timing: None,
            expiry_margin: Duration::from_secs(defaults.token_expiry_margin_secs),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn from_settings(settings: &AuthSettings, secrets: Arc<dyn SecretStore>) -> Result<Self> {
        let mut http = HttpClient::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs.max(1)))
            .max_attempts(1);
        if settings.bypass_proxy {
            http = http.bypass_proxy();
        }
        let http = http.build()?;
        Ok(Self::new(http, secrets, settings.authority_url.clone())
            .with_max_wait(Duration::from_secs(settings.device_code_timeout_secs))
            .with_expiry_margin(Duration::from_secs(settings.token_expiry_margin_secs)))
    }

    #[must_use]
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    #[must_use]
    pub fn with_poll_timing(mut self, interval: Duration, slow_down_step: Duration) -> Self {
        self.poll_timing = Some((interval, slow_down_step));
        self
    }

    #[must_use]
    pub fn with_expiry_margin(mut self, margin: Duration) -> Self {
        self.expiry_margin = margin;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Concrete provider, for hosts that need more than the trait surface.
    pub fn build(&self, options: IdentityProviderOptions) -> EntraAuthProvider {
        let mut device_codes =
            DeviceCodeClient::new(self.http.clone(), self.authority_url.clone(), options.client_id.clone())
                .with_max_wait(self.max_wait);
        if let Some((interval, step)) = self.poll_timing {
            device_codes = device_codes.with_poll_timing(interval, step);
        }
        debug!(connection_id = %options.connection_id, tenant_id = %options.tenant_id, "creating Entra provider");
        EntraAuthProvider::new(options, device_codes, Arc::clone(&self.secrets))
            .with_clock(Arc::clone(&self.clock))
            .with_expiry_margin(self.expiry_margin)
    }
}

impl IdentityProviderFactory for EntraProviderFactory {
    fn create(&self, options: IdentityProviderOptions) -> Result<Arc<dyn IdentityAuthProvider>> {
        Ok(Arc::new(self.build(options)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_prefixed_with_connection_id() {
        assert_eq!(token_cache_key("c1"), "workbridge.entra.token.c1");
    }

    #[test]
    fn decodes_serialized_token_set() {
        let tokens = TokenSet {
            access_token: "at".into(),
            refresh_token: Some("rt".into()),
            expires_at: Some(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()),
            scopes: vec!["s".into()],
            tenant_id: Some("t".into()),
        };
        let raw = serde_json::to_string(&tokens).unwrap();
        assert_eq!(decode_token_set(&raw), Some(tokens));
    }

    #[test]
    fn decodes_epoch_millis_expiry() {
        let decoded =
            decode_token_set(r#"{"accessToken":"at","expiresAt":1893456000000}"#).unwrap();
        assert_eq!(decoded.expires_at.map(|t| t.timestamp_millis()), Some(1_893_456_000_000));
        assert!(decoded.refresh_token.is_none());
        assert!(decoded.scopes.is_empty());
    }

    #[test]
    fn unusable_entries_decode_to_none() {
        assert!(decode_token_set("not json").is_none());
        assert!(decode_token_set(r#"{"accessToken":""}"#).is_none());
        assert!(decode_token_set(r#"{"refreshToken":"rt"}"#).is_none());

        let no_expiry = decode_token_set(r#"{"accessToken":"at","expiresAt":"garbage"}"#).unwrap();
        assert!(no_expiry.expires_at.is_none());
    }
}
