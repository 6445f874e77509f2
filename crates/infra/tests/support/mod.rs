//! Shared fixtures for infra integration tests
#![allow(dead_code)]

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};
use workbridge_common::auth::DeviceCodeInfo;
use workbridge_core::{
    ClientFactory, ClientRequest, IdentityProviderOptions, ProviderEmitter, ProviderFactory,
    ValidatedClientConfig, WorkClient, WorkItemsProvider,
};
use workbridge_domain::Result;
use workbridge_infra::{EntraProviderFactory, HttpClient, InMemorySecretStore};

pub const TENANT: &str = "11111111-2222-3333-4444-555555555555";
pub const SCOPE: &str = "499b84ac-1321-427f-aa17-267ca6975798/.default";
pub const WAIT: Duration = Duration::from_secs(5);

/// Single-attempt client talking straight to the loopback mock server.
pub fn http() -> HttpClient {
    HttpClient::builder().max_attempts(1).timeout(Duration::from_secs(5)).bypass_proxy().build().unwrap()
}

pub fn factory(server: &MockServer, secrets: &InMemorySecretStore) -> EntraProviderFactory {
    EntraProviderFactory::new(http(), Arc::new(secrets.clone()), server.uri())
        .with_poll_timing(Duration::from_millis(10), Duration::from_millis(10))
        .with_max_wait(Duration::from_secs(5))
}

/// Device codes handed to the host, in order.
#[derive(Clone, Default)]
pub struct CapturedCodes(pub Arc<Mutex<Vec<DeviceCodeInfo>>>);

impl CapturedCodes {
    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn first_user_code(&self) -> Option<String> {
        self.0.lock().first().map(|info| info.user_code.clone())
    }
}

pub fn options(connection_id: &str, tenant_id: &str, codes: &CapturedCodes) -> IdentityProviderOptions {
    let sink = codes.clone();
    IdentityProviderOptions {
        client_id: "test-client".into(),
        tenant_id: tenant_id.into(),
        scopes: vec![SCOPE.into(), "offline_access".into()],
        connection_id: connection_id.into(),
        device_code_callback: Arc::new(move |info| sink.0.lock().push(info.clone())),
    }
}

pub async fn mount_device_code(server: &MockServer, tenant_id: &str) {
    Mock::given(method("POST"))
        .and(path(format!("/{tenant_id}/oauth2/v2.0/devicecode")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device_code": "dc-123",
            "user_code": "ABCD-EFGH",
            "verification_uri": "https://microsoft.com/devicelogin",
            "expires_in": 900,
            "interval": 1
        })))
        .mount(server)
        .await;
}

pub fn oauth_error(code: &str) -> ResponseTemplate {
    ResponseTemplate::new(400).set_body_json(json!({ "error": code, "error_description": code }))
}

pub fn token_success(access_token: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "access_token": access_token,
        "refresh_token": format!("{access_token}-refresh"),
        "token_type": "Bearer",
        "expires_in": 3600
    }))
}

/// Token endpoint answering `authorization_pending` `pending` times, then success.
pub async fn mount_device_token(server: &MockServer, tenant_id: &str, pending: usize) -> Arc<AtomicUsize> {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    Mock::given(method("POST"))
        .and(path(format!("/{tenant_id}/oauth2/v2.0/token")))
        .and(body_string_contains("device_code=dc-123"))
        .respond_with(move |_req: &Request| {
            if counter.fetch_add(1, Ordering::SeqCst) < pending {
                oauth_error("authorization_pending")
            } else {
                token_success("device-token")
            }
        })
        .mount(server)
        .await;
    calls
}

pub struct StubClient {
    pub base_url: String,
}

impl WorkClient for StubClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Default)]
pub struct StubClientFactory {
    pub credentials: Mutex<Vec<String>>,
}

#[async_trait]
impl ClientFactory for StubClientFactory {
    async fn create_client(
        &self,
        _request: &ClientRequest,
        config: &ValidatedClientConfig,
    ) -> Result<Arc<dyn WorkClient>> {
        self.credentials.lock().push(config.credential.secret().to_string());
        Ok(Arc::new(StubClient { base_url: config.base_url.clone() }))
    }
}

#[derive(Default)]
pub struct StubProvider {
    pub queries: Mutex<Vec<String>>,
}

#[async_trait]
impl WorkItemsProvider for StubProvider {
    async fn refresh(&self, query_name: &str) -> Result<()> {
        self.queries.lock().push(query_name.to_string());
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Default)]
pub struct StubProviderFactory;

#[async_trait]
impl ProviderFactory for StubProviderFactory {
    async fn create_provider(
        &self,
        _connection_id: &str,
        _client: Arc<dyn WorkClient>,
        _emit: ProviderEmitter,
    ) -> Result<Arc<dyn WorkItemsProvider>> {
        Ok(Arc::new(StubProvider::default()))
    }
}
