//! Shared test helpers for `workbridge-core` integration tests.
//!
//! In-memory mocks for every connection port plus a harness that wires them
//! into `ConnectionServices` with a pinned clock.

#![allow(dead_code)]

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use workbridge_common::auth::DeviceCodeInfo;
use workbridge_common::resilience::MockClock;
use workbridge_core::{
    AuthenticationResult, ClientFactory, ClientRequest, ClientValidation, ConnectionManager,
    ConnectionNotifier, ConnectionServices, FailureNotice, IdentityAuthProvider,
    IdentityProviderFactory, IdentityProviderOptions, ProviderEmitter, ProviderFactory,
    SecretStore, TenantResolver, TokenInfo, ValidatedClientConfig, WorkClient, WorkItemsProvider,
};
use workbridge_domain::{ConnectionError, ExpiryValue, Result as DomainResult};

pub const NOW_MS: i64 = 1_700_000_000_000;
pub const MINUTE_MS: i64 = 60_000;
pub const WAIT: Duration = Duration::from_secs(2);

/// In-memory secret storage.
#[derive(Default)]
pub struct MockSecretStore {
    values: Mutex<HashMap<String, String>>,
}

impl MockSecretStore {
    pub fn with_secret(self, key: &str, value: &str) -> Self {
        self.values.lock().insert(key.to_string(), value.to_string());
        self
    }

    pub fn remove(&self, key: &str) {
        self.values.lock().remove(key);
    }
}

#[async_trait]
impl SecretStore for MockSecretStore {
    async fn get(&self, key: &str) -> DomainResult<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    async fn store(&self, key: &str, value: &str) -> DomainResult<()> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> DomainResult<()> {
        self.values.lock().remove(key);
        Ok(())
    }
}

/// Scriptable identity provider shared by every provider the factory builds.
pub struct MockIdentityProvider {
    cached: Mutex<Option<TokenInfo>>,
    auth_result: Mutex<AuthenticationResult>,
    refresh_result: Mutex<AuthenticationResult>,
    /// When set, `authenticate` blocks until notified or cancelled.
    gate: Mutex<Option<Arc<Notify>>>,
    reset_error: Mutex<Option<ConnectionError>>,
    pub authenticate_calls: AtomicUsize,
    pub forced_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub reset_calls: AtomicUsize,
}

impl Default for MockIdentityProvider {
    fn default() -> Self {
        Self {
            cached: Mutex::new(None),
            auth_result: Mutex::new(AuthenticationResult::succeeded(
                "interactive-token",
                Some(ExpiryValue::EpochMillis((NOW_MS + 60 * MINUTE_MS) as f64)),
            )),
            refresh_result: Mutex::new(AuthenticationResult::failed("no refresh token cached")),
            gate: Mutex::new(None),
            reset_error: Mutex::new(None),
            authenticate_calls: AtomicUsize::new(0),
            forced_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            reset_calls: AtomicUsize::new(0),
        }
    }
}

impl MockIdentityProvider {
    pub fn with_cached_token(self, token: &str, expires_at_ms: i64) -> Self {
        *self.cached.lock() = Some(TokenInfo {
            access_token: token.to_string(),
            expires_at: Some(ExpiryValue::EpochMillis(expires_at_ms as f64)),
        });
        self
    }

    pub fn with_auth_result(self, result: AuthenticationResult) -> Self {
        *self.auth_result.lock() = result;
        self
    }

    pub fn with_refresh_result(self, result: AuthenticationResult) -> Self {
        *self.refresh_result.lock() = result;
        self
    }

    /// `reset_token` fails and leaves the cached token in place.
    pub fn with_failing_reset(self, error: ConnectionError) -> Self {
        *self.reset_error.lock() = Some(error);
        self
    }

    pub fn gated(self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        *self.gate.lock() = Some(Arc::clone(&gate));
        (self, gate)
    }

    pub fn authenticate_count(&self) -> usize {
        self.authenticate_calls.load(Ordering::SeqCst)
    }

    pub fn reset_count(&self) -> usize {
        self.reset_calls.load(Ordering::SeqCst)
    }

    pub fn forced_count(&self) -> usize {
        self.forced_calls.load(Ordering::SeqCst)
    }
}

struct SharedProvider {
    inner: Arc<MockIdentityProvider>,
    callback: workbridge_core::DeviceCodeCallback,
}

#[async_trait]
impl IdentityAuthProvider for SharedProvider {
    async fn is_authenticated(&self) -> bool {
        self.inner.cached.lock().is_some()
    }

    async fn token_info(&self) -> DomainResult<Option<TokenInfo>> {
        Ok(self.inner.cached.lock().clone())
    }

    async fn access_token(&self) -> DomainResult<Option<String>> {
        Ok(self.inner.cached.lock().as_ref().map(|info| info.access_token.clone()))
    }

    async fn authenticate(&self, cancel: CancellationToken, force_interactive: bool) -> AuthenticationResult {
        self.inner.authenticate_calls.fetch_add(1, Ordering::SeqCst);
        if force_interactive {
            self.inner.forced_calls.fetch_add(1, Ordering::SeqCst);
        }
        (self.callback)(&DeviceCodeInfo {
            device_code: "device-code-secret".into(),
            user_code: "ABCD-EFGH".into(),
            verification_uri: "https://microsoft.com/devicelogin".into(),
            expires_in_secs: 900,
            message: None,
        });

        let gate = self.inner.gate.lock().clone();
        if let Some(gate) = gate {
            tokio::select! {
                () = cancel.cancelled() => return AuthenticationResult::failed("cancelled"),
                () = gate.notified() => {}
            }
        }
        self.inner.auth_result.lock().clone()
    }

    async fn refresh(&self) -> AuthenticationResult {
        self.inner.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.refresh_result.lock().clone()
    }

    async fn reset_token(&self) -> DomainResult<()> {
        self.inner.reset_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.inner.reset_error.lock().clone() {
            return Err(error);
        }
        *self.inner.cached.lock() = None;
        Ok(())
    }
}

/// Factory recording the options of every provider it builds.
pub struct MockIdentityFactory {
    pub provider: Arc<MockIdentityProvider>,
    pub created: Mutex<Vec<IdentityProviderOptions>>,
}

impl MockIdentityFactory {
    pub fn new(provider: MockIdentityProvider) -> Self {
        Self { provider: Arc::new(provider), created: Mutex::new(Vec::new()) }
    }

    pub fn tenants(&self) -> Vec<String> {
        self.created.lock().iter().map(|o| o.tenant_id.clone()).collect()
    }
}

impl IdentityProviderFactory for MockIdentityFactory {
    fn create(&self, options: IdentityProviderOptions) -> DomainResult<Arc<dyn IdentityAuthProvider>> {
        let callback = Arc::clone(&options.device_code_callback);
        self.created.lock().push(options);
        Ok(Arc::new(SharedProvider { inner: Arc::clone(&self.provider), callback }))
    }
}

/// Tenant resolver returning a fixed answer.
#[derive(Default)]
pub struct MockTenantResolver {
    tenant: Option<String>,
    pub calls: Mutex<Vec<String>>,
}

impl MockTenantResolver {
    pub fn resolving(tenant: &str) -> Self {
        Self { tenant: Some(tenant.to_string()), calls: Mutex::new(Vec::new()) }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl TenantResolver for MockTenantResolver {
    async fn resolve_tenant(&self, organization_url: &str) -> Option<String> {
        self.calls.lock().push(organization_url.to_string());
        self.tenant.clone()
    }
}

pub struct MockClient {
    pub base_url: String,
    pub credential: String,
}

impl WorkClient for MockClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Client factory with optional forced validation errors or build failure.
#[derive(Default)]
pub struct MockClientFactory {
    validation_errors: Option<Vec<String>>,
    failure: Option<ConnectionError>,
    pub created: AtomicUsize,
}

impl MockClientFactory {
    pub fn invalid(errors: &[&str]) -> Self {
        Self {
            validation_errors: Some(errors.iter().map(|e| (*e).to_string()).collect()),
            ..Self::default()
        }
    }

    pub fn failing(error: ConnectionError) -> Self {
        Self { failure: Some(error), ..Self::default() }
    }
}

#[async_trait]
impl ClientFactory for MockClientFactory {
    fn validate_client_config(&self, request: &ClientRequest) -> ClientValidation {
        match &self.validation_errors {
            Some(errors) => ClientValidation::invalid(errors.clone()),
            None => workbridge_core::default_client_validation(request),
        }
    }

    async fn create_client(
        &self,
        _request: &ClientRequest,
        config: &ValidatedClientConfig,
    ) -> DomainResult<Arc<dyn WorkClient>> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockClient {
            base_url: config.base_url.clone(),
            credential: config.credential.secret().to_string(),
        }))
    }
}

/// Provider recording every refresh it receives.
#[derive(Default)]
pub struct MockProvider {
    pub refreshes: Mutex<Vec<String>>,
}

#[async_trait]
impl WorkItemsProvider for MockProvider {
    async fn refresh(&self, query_name: &str) -> DomainResult<()> {
        self.refreshes.lock().push(query_name.to_string());
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Default)]
pub struct MockProviderFactory {
    pub providers: Mutex<Vec<Arc<MockProvider>>>,
}

impl MockProviderFactory {
    pub fn created(&self) -> usize {
        self.providers.lock().len()
    }

    pub fn total_refreshes(&self) -> Vec<String> {
        self.providers.lock().iter().flat_map(|p| p.refreshes.lock().clone()).collect()
    }
}

#[async_trait]
impl ProviderFactory for MockProviderFactory {
    async fn create_provider(
        &self,
        _connection_id: &str,
        _client: Arc<dyn WorkClient>,
        emit: ProviderEmitter,
    ) -> DomainResult<Arc<dyn WorkItemsProvider>> {
        emit(serde_json::json!({ "type": "providerReady" }));
        let provider = Arc::new(MockProvider::default());
        self.providers.lock().push(Arc::clone(&provider));
        Ok(provider)
    }
}

/// Notifier recording everything it is told.
#[derive(Default)]
pub struct RecordingNotifier {
    pub failures: Mutex<Vec<FailureNotice>>,
    pub device_codes: Mutex<Vec<(String, DeviceCodeInfo)>>,
    pub connected: Mutex<Vec<String>>,
}

impl ConnectionNotifier for RecordingNotifier {
    fn connected(&self, connection_id: &str) {
        self.connected.lock().push(connection_id.to_string());
    }

    fn connection_failed(&self, notice: &FailureNotice) {
        self.failures.lock().push(notice.clone());
    }

    fn device_code(&self, connection_id: &str, info: &DeviceCodeInfo) {
        self.device_codes.lock().push((connection_id.to_string(), info.clone()));
    }
}

/// Every mock wired into one manager.
pub struct Harness {
    pub secrets: Arc<MockSecretStore>,
    pub identity: Arc<MockIdentityFactory>,
    pub tenants: Arc<MockTenantResolver>,
    pub clients: Arc<MockClientFactory>,
    pub providers: Arc<MockProviderFactory>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: MockClock,
    pub manager: ConnectionManager,
}

pub struct HarnessBuilder {
    secrets: MockSecretStore,
    identity: MockIdentityProvider,
    tenants: MockTenantResolver,
    clients: MockClientFactory,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            secrets: MockSecretStore::default(),
            identity: MockIdentityProvider::default(),
            tenants: MockTenantResolver::default(),
            clients: MockClientFactory::default(),
        }
    }

    pub fn secret(mut self, key: &str, value: &str) -> Self {
        self.secrets = self.secrets.with_secret(key, value);
        self
    }

    pub fn identity(mut self, identity: MockIdentityProvider) -> Self {
        self.identity = identity;
        self
    }

    pub fn tenants(mut self, tenants: MockTenantResolver) -> Self {
        self.tenants = tenants;
        self
    }

    pub fn clients(mut self, clients: MockClientFactory) -> Self {
        self.clients = clients;
        self
    }

    pub fn build(self) -> Harness {
        let secrets = Arc::new(self.secrets);
        let identity = Arc::new(MockIdentityFactory::new(self.identity));
        let tenants = Arc::new(self.tenants);
        let clients = Arc::new(self.clients);
        let providers = Arc::new(MockProviderFactory::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let clock = MockClock::at_millis(NOW_MS);

        let services = ConnectionServices::new(
            Arc::clone(&secrets) as Arc<dyn SecretStore>,
            Arc::clone(&identity) as Arc<dyn IdentityProviderFactory>,
            Arc::clone(&tenants) as Arc<dyn TenantResolver>,
            Arc::clone(&clients) as Arc<dyn ClientFactory>,
            Arc::clone(&providers) as Arc<dyn ProviderFactory>,
        )
        .with_notifier(Arc::clone(&notifier) as Arc<dyn ConnectionNotifier>)
        .with_clock(Arc::new(clock.clone()));

        Harness {
            secrets,
            identity,
            tenants,
            clients,
            providers,
            notifier,
            clock,
            manager: ConnectionManager::new(services),
        }
    }
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self::new()
    }
}
