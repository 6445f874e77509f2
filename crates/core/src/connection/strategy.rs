//! Authentication strategies
//!
//! A connection picks one strategy from its auth method when it connects:
//! PAT reads a static secret, Entra runs tenant selection and then asks an
//! identity provider for a cached, interactive or silently refreshed token.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use workbridge_domain::constants::{
    AZURE_DEVOPS_PUBLIC_CLIENT_ID, AZURE_DEVOPS_SCOPE, MULTI_TENANT_PLACEHOLDER,
    OFFLINE_ACCESS_SCOPE,
};
use workbridge_domain::{AuthMethod, AuthSettings, ConnectionConfig, ConnectionError, Result};

use super::event::TokenGrant;
use super::ports::{
    AuthenticationResult, DeviceCodeCallback, IdentityAuthProvider, IdentityProviderFactory,
    IdentityProviderOptions, SecretStore, TenantResolver,
};

/// Identity platform parameters for the Entra strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntraOptions {
    pub client_id: String,
    pub scopes: Vec<String>,
}

impl Default for EntraOptions {
    fn default() -> Self {
        Self {
            client_id: AZURE_DEVOPS_PUBLIC_CLIENT_ID.to_string(),
            scopes: vec![AZURE_DEVOPS_SCOPE.to_string()],
        }
    }
}

impl From<&AuthSettings> for EntraOptions {
    fn from(settings: &AuthSettings) -> Self {
        Self { client_id: settings.client_id.clone(), scopes: settings.scopes.clone() }
    }
}

/// Trim and de-duplicate scopes, default to the Azure DevOps scope and make
/// sure `offline_access` is requested so a refresh token is issued.
#[must_use]
pub fn resolve_scopes(configured: &[String]) -> Vec<String> {
    let mut scopes: Vec<String> = Vec::with_capacity(configured.len() + 1);
    for scope in configured.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        if !scopes.iter().any(|existing| existing == scope) {
            scopes.push(scope.to_string());
        }
    }
    if scopes.iter().all(|s| s == OFFLINE_ACCESS_SCOPE) {
        scopes.insert(0, AZURE_DEVOPS_SCOPE.to_string());
    }
    if !scopes.iter().any(|s| s == OFFLINE_ACCESS_SCOPE) {
        scopes.push(OFFLINE_ACCESS_SCOPE.to_string());
    }
    scopes
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantSource {
    Configured,
    Discovered,
    Fallback,
}

/// Tenant chosen for one Entra sign-in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantSelection {
    pub tenant_id: String,
    pub source: TenantSource,
}

impl TenantSelection {
    /// True when the connection stored a tenant other than the one selected,
    /// in which case cached tokens belong to the wrong tenant.
    #[must_use]
    pub fn differs_from(&self, config: &ConnectionConfig) -> bool {
        config
            .tenant_id
            .as_deref()
            .map(str::trim)
            .is_some_and(|configured| !configured.is_empty() && configured != self.tenant_id)
    }
}

/// Reads the PAT stored under the connection id
#[derive(Clone)]
pub struct PatStrategy {
    secrets: Arc<dyn SecretStore>,
}

impl PatStrategy {
    pub fn new(secrets: Arc<dyn SecretStore>) -> Self {
        Self { secrets }
    }

    pub async fn authenticate(&self, connection_id: &str) -> Result<String> {
        debug!(connection_id, "authenticating with PAT");
        match self.read_pat(connection_id).await? {
            Some(pat) => Ok(pat),
            None => Err(ConnectionError::AuthFailure("PAT not found in secrets".to_string())),
        }
    }

    /// No network call; a failure means the secret was rotated or removed.
    pub async fn refresh(&self, connection_id: &str) -> Result<TokenGrant> {
        match self.read_pat(connection_id).await {
            Ok(Some(pat)) => Ok(TokenGrant::new(pat, None)),
            Ok(None) => Err(ConnectionError::RefreshFailure(
                "PAT refresh failed - no PAT found".to_string(),
            )),
            Err(error) => Err(ConnectionError::RefreshFailure(error.to_string())),
        }
    }

    async fn read_pat(&self, connection_id: &str) -> Result<Option<String>> {
        let value = self.secrets.get(connection_id).await.map_err(|error| {
            warn!(connection_id, %error, "reading PAT from secret storage failed");
            ConnectionError::AuthFailure(format!("PAT lookup failed: {error}"))
        })?;
        Ok(value.filter(|pat| !pat.trim().is_empty()))
    }
}

/// Device-code sign-in through an identity provider
#[derive(Clone)]
pub struct EntraStrategy {
    identity: Arc<dyn IdentityProviderFactory>,
    tenants: Arc<dyn TenantResolver>,
    options: EntraOptions,
    device_code_callback: DeviceCodeCallback,
}

impl EntraStrategy {
    pub fn new(
        identity: Arc<dyn IdentityProviderFactory>,
        tenants: Arc<dyn TenantResolver>,
        options: EntraOptions,
        device_code_callback: DeviceCodeCallback,
    ) -> Self {
        Self { identity, tenants, options, device_code_callback }
    }

    /// Tenant already selected in this connect cycle, or a fresh selection.
    pub async fn tenant_for(
        &self,
        connection_id: &str,
        config: &ConnectionConfig,
        known: Option<&TenantSelection>,
    ) -> TenantSelection {
        match known {
            Some(tenant) => tenant.clone(),
            None => self.select_tenant(connection_id, config).await,
        }
    }

    /// Configured tenant, else discovery from the organization URL, else the
    /// multi-tenant placeholder.
    pub async fn select_tenant(&self, connection_id: &str, config: &ConnectionConfig) -> TenantSelection {
        if let Some(tenant) = config.configured_tenant() {
            debug!(connection_id, tenant_id = tenant, "using configured tenant");
            return TenantSelection { tenant_id: tenant.to_string(), source: TenantSource::Configured };
        }

        match config.organization_url() {
            Some(url) => {
                if let Some(tenant) = self.tenants.resolve_tenant(&url).await {
                    info!(connection_id, tenant_id = %tenant, organization_url = %url, "tenant discovered");
                    return TenantSelection { tenant_id: tenant, source: TenantSource::Discovered };
                }
                warn!(connection_id, organization_url = %url, "tenant discovery inconclusive");
            }
            None => {
                warn!(connection_id, "no organization information available for tenant discovery");
            }
        }

        TenantSelection {
            tenant_id: MULTI_TENANT_PLACEHOLDER.to_string(),
            source: TenantSource::Fallback,
        }
    }

    fn provider(&self, connection_id: &str, tenant_id: &str) -> Result<Arc<dyn IdentityAuthProvider>> {
        self.identity.create(IdentityProviderOptions {
            client_id: self.options.client_id.clone(),
            tenant_id: tenant_id.to_string(),
            scopes: resolve_scopes(&self.options.scopes),
            connection_id: connection_id.to_string(),
            device_code_callback: Arc::clone(&self.device_code_callback),
        })
    }

    /// Token the provider already holds; validity is judged by the caller.
    pub async fn cached_token(
        &self,
        connection_id: &str,
        tenant: &TenantSelection,
    ) -> Result<Option<TokenGrant>> {
        let provider = self.provider(connection_id, &tenant.tenant_id)?;

        if !provider.is_authenticated().await {
            debug!(connection_id, "no cached token");
            return Ok(None);
        }
        let grant = provider
            .token_info()
            .await?
            .filter(|info| !info.access_token.is_empty())
            .map(|info| TokenGrant::new(info.access_token, info.expires_at));
        Ok(grant)
    }

    /// Device-code sign-in. Purges the cached token first when forced or when
    /// the selected tenant differs from the configured one. A forced sign-in
    /// stays interactive even if the purge fails.
    pub async fn interactive(
        &self,
        connection_id: &str,
        config: &ConnectionConfig,
        tenant: &TenantSelection,
        force_interactive: bool,
        cancel: CancellationToken,
    ) -> Result<TokenGrant> {
        let provider = self.provider(connection_id, &tenant.tenant_id).map_err(entra_failure)?;

        if force_interactive || tenant.differs_from(config) {
            info!(
                connection_id,
                tenant_id = %tenant.tenant_id,
                force_interactive,
                "clearing cached authentication before sign-in"
            );
            if let Err(error) = provider.reset_token().await {
                warn!(connection_id, %error, "failed to clear cached authentication");
            }
        }

        info!(connection_id, tenant_id = %tenant.tenant_id, source = ?tenant.source, "starting device-code sign-in");
        grant_from(provider.authenticate(cancel, force_interactive).await).map_err(entra_failure)
    }

    /// Silent renewal with the cached refresh token.
    pub async fn refresh(&self, connection_id: &str, tenant: &TenantSelection) -> Result<TokenGrant> {
        let provider = self
            .provider(connection_id, &tenant.tenant_id)
            .map_err(|error| ConnectionError::RefreshFailure(error.to_string()))?;
        grant_from(provider.refresh().await)
            .map_err(|error| ConnectionError::RefreshFailure(error.to_string()))
    }
}

fn grant_from(result: AuthenticationResult) -> Result<TokenGrant> {
    match result {
        AuthenticationResult { success: true, access_token: Some(token), expires_at, .. }
            if !token.is_empty() =>
        {
            Ok(TokenGrant::new(token, expires_at))
        }
        AuthenticationResult { error, .. } => Err(ConnectionError::AuthFailure(
            error.unwrap_or_else(|| "no access token returned".to_string()),
        )),
    }
}

fn entra_failure(error: ConnectionError) -> ConnectionError {
    let detail = match error {
        ConnectionError::AuthFailure(message) => message,
        other => other.to_string(),
    };
    ConnectionError::AuthFailure(format!("Entra authentication failed: {detail}"))
}

/// Strategy selected once per connect cycle from the auth method
#[derive(Clone)]
pub enum AuthenticationStrategy {
    Pat(PatStrategy),
    Entra(EntraStrategy),
}

impl AuthenticationStrategy {
    #[must_use]
    pub fn method(&self) -> AuthMethod {
        match self {
            Self::Pat(_) => AuthMethod::Pat,
            Self::Entra(_) => AuthMethod::Entra,
        }
    }

    pub async fn authenticate_pat(&self, connection_id: &str) -> Result<String> {
        match self {
            Self::Pat(pat) => pat.authenticate(connection_id).await,
            Self::Entra(_) => Err(mismatch("PAT authentication", AuthMethod::Entra)),
        }
    }

    /// Cached token check, paired with the tenant it was checked against.
    pub async fn cached_token(
        &self,
        connection_id: &str,
        config: &ConnectionConfig,
        known: Option<&TenantSelection>,
    ) -> (Option<TenantSelection>, Result<Option<TokenGrant>>) {
        match self {
            Self::Pat(_) => (None, Ok(None)),
            Self::Entra(entra) => {
                let tenant = entra.tenant_for(connection_id, config, known).await;
                let result = entra.cached_token(connection_id, &tenant).await;
                (Some(tenant), result)
            }
        }
    }

    /// Interactive sign-in, paired with the tenant it ran against.
    pub async fn interactive(
        &self,
        connection_id: &str,
        config: &ConnectionConfig,
        known: Option<&TenantSelection>,
        force_interactive: bool,
        cancel: CancellationToken,
    ) -> (Option<TenantSelection>, Result<TokenGrant>) {
        match self {
            Self::Pat(_) => (None, Err(mismatch("interactive sign-in", AuthMethod::Pat))),
            Self::Entra(entra) => {
                let tenant = entra.tenant_for(connection_id, config, known).await;
                let result =
                    entra.interactive(connection_id, config, &tenant, force_interactive, cancel).await;
                (Some(tenant), result)
            }
        }
    }

    pub async fn refresh(
        &self,
        connection_id: &str,
        config: &ConnectionConfig,
        known: Option<&TenantSelection>,
    ) -> Result<TokenGrant> {
        match self {
            Self::Pat(pat) => pat.refresh(connection_id).await,
            Self::Entra(entra) => {
                let tenant = entra.tenant_for(connection_id, config, known).await;
                entra.refresh(connection_id, &tenant).await
            }
        }
    }
}

fn mismatch(operation: &str, method: AuthMethod) -> ConnectionError {
    ConnectionError::Internal(format!("{operation} requested for a {method} connection"))
}
