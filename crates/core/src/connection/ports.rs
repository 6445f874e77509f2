//! Port interfaces for the connection lifecycle
//!
//! These traits define the boundaries between the state machine and the
//! infrastructure that performs authentication, discovery and construction.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use workbridge_common::auth::DeviceCodeInfo;
use workbridge_domain::{ExpiryValue, Result};

use super::client::{ClientRequest, ClientValidation, ValidatedClientConfig};
use super::notifier::FailureNotice;
use super::state::ConnectionState;

/// Secret storage keyed by connection id (PATs) or cache key (token sets)
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn store(&self, key: &str, value: &str) -> Result<()>;

    /// Idempotent.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Token currently held by an identity provider
#[derive(Debug, Clone, PartialEq)]
pub struct TokenInfo {
    pub access_token: String,
    pub expires_at: Option<ExpiryValue>,
}

/// Outcome of an interactive or silent authentication attempt
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AuthenticationResult {
    pub success: bool,
    pub access_token: Option<String>,
    pub expires_at: Option<ExpiryValue>,
    pub error: Option<String>,
}

impl AuthenticationResult {
    #[must_use]
    pub fn succeeded(access_token: impl Into<String>, expires_at: Option<ExpiryValue>) -> Self {
        Self { success: true, access_token: Some(access_token.into()), expires_at, error: None }
    }

    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self { success: false, access_token: None, expires_at: None, error: Some(error.into()) }
    }
}

/// Identity provider bound to one connection and one tenant
#[async_trait]
pub trait IdentityAuthProvider: Send + Sync {
    async fn is_authenticated(&self) -> bool;

    async fn token_info(&self) -> Result<Option<TokenInfo>>;

    async fn access_token(&self) -> Result<Option<String>>;

    /// Interactive sign-in. Invokes the device-code callback exactly once per
    /// attempt and stops early when `cancel` fires. With `force_interactive`
    /// the provider must not reuse anything it has cached, even when an
    /// earlier `reset_token` failed.
    async fn authenticate(&self, cancel: CancellationToken, force_interactive: bool) -> AuthenticationResult;

    /// Silent renewal without user interaction.
    async fn refresh(&self) -> AuthenticationResult;

    /// Drop any cached token so the next sign-in is interactive.
    async fn reset_token(&self) -> Result<()>;
}

/// Called with the device code so the host can display it
pub type DeviceCodeCallback = Arc<dyn Fn(&DeviceCodeInfo) + Send + Sync>;

/// Construction input for an identity provider
#[derive(Clone)]
pub struct IdentityProviderOptions {
    pub client_id: String,
    pub tenant_id: String,
    pub scopes: Vec<String>,
    pub connection_id: String,
    pub device_code_callback: DeviceCodeCallback,
}

impl std::fmt::Debug for IdentityProviderOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityProviderOptions")
            .field("client_id", &self.client_id)
            .field("tenant_id", &self.tenant_id)
            .field("scopes", &self.scopes)
            .field("connection_id", &self.connection_id)
            .finish_non_exhaustive()
    }
}

/// Builds identity providers; the factory owns the secret storage capability
pub trait IdentityProviderFactory: Send + Sync {
    fn create(&self, options: IdentityProviderOptions) -> Result<Arc<dyn IdentityAuthProvider>>;
}

/// Resolves an identity tenant from an organization URL
#[async_trait]
pub trait TenantResolver: Send + Sync {
    /// `None` when no strategy produced a tenant. Never fails.
    async fn resolve_tenant(&self, organization_url: &str) -> Option<String>;
}

/// Client for the work-tracking service built from a validated credential
pub trait WorkClient: Send + Sync {
    fn base_url(&self) -> &str;

    /// Lets hosts recover their concrete client type.
    fn as_any(&self) -> &dyn Any;
}

/// Work-items provider consuming a client
#[async_trait]
pub trait WorkItemsProvider: Send + Sync {
    async fn refresh(&self, query_name: &str) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
}

/// Builds clients; validation defaults to the built-in rules
#[async_trait]
pub trait ClientFactory: Send + Sync {
    fn validate_client_config(&self, request: &ClientRequest) -> ClientValidation {
        super::client::default_client_validation(request)
    }

    async fn create_client(
        &self,
        request: &ClientRequest,
        config: &ValidatedClientConfig,
    ) -> Result<Arc<dyn WorkClient>>;
}

/// Sink for messages a provider posts back to the host
pub type ProviderEmitter = Arc<dyn Fn(serde_json::Value) + Send + Sync>;

#[async_trait]
pub trait ProviderFactory: Send + Sync {
    async fn create_provider(
        &self,
        connection_id: &str,
        client: Arc<dyn WorkClient>,
        emit: ProviderEmitter,
    ) -> Result<Arc<dyn WorkItemsProvider>>;
}

/// Per-connection notifications for logging and user prompts
pub trait ConnectionNotifier: Send + Sync {
    fn state_changed(&self, _connection_id: &str, _from: ConnectionState, _to: ConnectionState) {}

    fn connected(&self, _connection_id: &str) {}

    fn connection_failed(&self, notice: &FailureNotice);

    fn device_code(&self, connection_id: &str, info: &DeviceCodeInfo);

    fn provider_message(&self, _connection_id: &str, _message: &serde_json::Value) {}
}
