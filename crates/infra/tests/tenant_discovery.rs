//! Tenant discovery probes against a mocked discovery surface

mod support;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use workbridge_core::TenantResolver;
use workbridge_infra::{DiscoveryEndpoints, TenantDiscoveryResolver};

use support::TENANT;

const ORG_URL: &str = "https://dev.azure.com/contoso";
const TENANT_INFO: &str = "/_apis/organization/contoso/tenantinfo";
const CONNECTION_DATA: &str = "/_apis/connectionData";

fn resolver(server: &MockServer) -> TenantDiscoveryResolver {
    TenantDiscoveryResolver::new(
        support::http(),
        DiscoveryEndpoints {
            tenant_info_base_url: server.uri(),
            management_base_url: server.uri(),
            organization_base_override: Some(server.uri()),
        },
    )
}

async fn mount_management(server: &MockServer, status: u16, expected: u64) {
    Mock::given(method("GET"))
        .and(path("/tenants"))
        .and(query_param("api-version", "2020-01-01"))
        .respond_with(ResponseTemplate::new(status))
        .expect(expected)
        .mount(server)
        .await;
}

#[tokio::test]
async fn tenant_info_answer_wins_and_stops_the_chain() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TENANT_INFO))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tenantId": format!(" {TENANT} ") })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET")).and(path(CONNECTION_DATA)).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

    let tenant = resolver(&server).resolve_tenant(ORG_URL).await;
    assert_eq!(tenant.as_deref(), Some(TENANT));
}

#[tokio::test]
async fn connection_data_descriptor_is_used_when_tenant_info_is_missing() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).and(path(TENANT_INFO)).respond_with(ResponseTemplate::new(404)).mount(&server).await;
    Mock::given(method("GET"))
        .and(path(CONNECTION_DATA))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "authenticatedUser": { "descriptor": format!("{TENANT};someone@contoso.com") }
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_management(&server, 401, 0).await;

    let tenant = resolver(&server).resolve_tenant(ORG_URL).await;
    assert_eq!(tenant.as_deref(), Some(TENANT));
}

#[tokio::test]
async fn malformed_tenant_info_body_is_treated_as_inconclusive() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TENANT_INFO))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>sign in</html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(CONNECTION_DATA))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "authenticatedUser": { "descriptor": format!("{TENANT};x") }
        })))
        .mount(&server)
        .await;

    let tenant = resolver(&server).resolve_tenant(ORG_URL).await;
    assert_eq!(tenant.as_deref(), Some(TENANT));
}

#[tokio::test]
async fn every_probe_failing_resolves_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TENANT_INFO))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tenantId": "  " })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(CONNECTION_DATA))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "authenticatedUser": { "descriptor": "Microsoft.TeamFoundation.Identity;opaque" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_management(&server, 401, 1).await;

    assert_eq!(resolver(&server).resolve_tenant(ORG_URL).await, None);
}

#[tokio::test]
async fn reachable_management_plane_still_resolves_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).and(path(TENANT_INFO)).respond_with(ResponseTemplate::new(500)).mount(&server).await;
    Mock::given(method("GET")).and(path(CONNECTION_DATA)).respond_with(ResponseTemplate::new(401)).mount(&server).await;
    mount_management(&server, 200, 1).await;

    assert_eq!(resolver(&server).resolve_tenant(ORG_URL).await, None);
}

#[tokio::test]
async fn unsupported_url_makes_no_requests() {
    let server = MockServer::start().await;
    let resolver = resolver(&server);

    assert_eq!(resolver.resolve_tenant("https://github.com/contoso").await, None);
    assert_eq!(resolver.resolve_tenant("not a url").await, None);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn visualstudio_urls_are_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TENANT_INFO))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tenantId": TENANT })))
        .mount(&server)
        .await;

    let tenant = resolver(&server).resolve_tenant("https://contoso.visualstudio.com/Fabric").await;
    assert_eq!(tenant.as_deref(), Some(TENANT));
}
