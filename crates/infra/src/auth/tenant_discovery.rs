//! HTTP tenant discovery
//!
//! Ordered probes, first tenant wins:
//! 1. per-organization tenant-info endpoint (`tenantId`)
//! 2. organization connection data (`authenticatedUser.descriptor`)
//! 3. management-plane tenants listing, which needs credentials we never
//!    have and so only ever logs
//!
//! A failing probe is logged and treated as inconclusive. Nothing is cached.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use tracing::{debug, info, warn};
use workbridge_core::{parse_organization, OrganizationRef, TenantResolver};
use workbridge_domain::{ConnectionError, DiscoverySettings, Result};

use crate::http::HttpClient;

const MANAGEMENT_TENANTS_API_VERSION: &str = "2020-01-01";

/// Base URLs of the discovery probes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryEndpoints {
    pub tenant_info_base_url: String,
    pub management_base_url: String,
    /// Replaces the organization root for the connection-data probe.
    pub organization_base_override: Option<String>,
}

impl From<&DiscoverySettings> for DiscoveryEndpoints {
    fn from(settings: &DiscoverySettings) -> Self {
        Self {
            tenant_info_base_url: settings.tenant_info_base_url.clone(),
            management_base_url: settings.management_base_url.clone(),
            organization_base_override: None,
        }
    }
}

impl Default for DiscoveryEndpoints {
    fn default() -> Self {
        Self::from(&DiscoverySettings::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Probe {
    TenantInfo,
    ConnectionData,
    ManagementPlane,
}

impl Probe {
    const ORDER: [Self; 3] = [Self::TenantInfo, Self::ConnectionData, Self::ManagementPlane];

    fn name(self) -> &'static str {
        match self {
            Self::TenantInfo => "tenant_info",
            Self::ConnectionData => "connection_data",
            Self::ManagementPlane => "management_plane",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TenantInfoBody {
    #[serde(default)]
    tenant_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionDataBody {
    #[serde(default)]
    authenticated_user: Option<AuthenticatedUser>,
}

#[derive(Debug, Deserialize)]
struct AuthenticatedUser {
    #[serde(default)]
    descriptor: Option<String>,
}

/// [`TenantResolver`] backed by the public discovery endpoints
#[derive(Debug, Clone)]
pub struct TenantDiscoveryResolver {
    http: HttpClient,
    endpoints: DiscoveryEndpoints,
}

impl TenantDiscoveryResolver {
    pub fn new(http: HttpClient, endpoints: DiscoveryEndpoints) -> Self {
        Self { http, endpoints }
    }

    pub fn from_settings(settings: &DiscoverySettings) -> Result<Self> {
        let mut http = HttpClient::builder()
            .timeout(std::time::Duration::from_secs(settings.request_timeout_secs.max(1)))
            .max_attempts(1);
        if settings.bypass_proxy {
            http = http.bypass_proxy();
        }
        let http = http.build()?;
        Ok(Self::new(http, DiscoveryEndpoints::from(settings)))
    }

    pub fn endpoints(&self) -> &DiscoveryEndpoints {
        &self.endpoints
    }

    async fn probe(&self, probe: Probe, org: &OrganizationRef) -> Result<Option<String>> {
        match probe {
            Probe::TenantInfo => self.from_tenant_info(org).await,
            Probe::ConnectionData => self.from_connection_data(org).await,
            Probe::ManagementPlane => self.from_management_plane(org).await,
        }
    }

    async fn from_tenant_info(&self, org: &OrganizationRef) -> Result<Option<String>> {
        let url = format!(
            "{}/_apis/organization/{}/tenantinfo",
            self.endpoints.tenant_info_base_url.trim_end_matches('/'),
            org.name
        );
        let Some(body) = self.get_json::<TenantInfoBody>(&url).await? else {
            return Ok(None);
        };
        Ok(body.tenant_id.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()))
    }

    async fn from_connection_data(&self, org: &OrganizationRef) -> Result<Option<String>> {
        let base = self
            .endpoints
            .organization_base_override
            .clone()
            .unwrap_or_else(|| org.base_url());
        let url = format!("{}/_apis/connectionData", base.trim_end_matches('/'));
        let Some(body) = self.get_json::<ConnectionDataBody>(&url).await? else {
            return Ok(None);
        };
        Ok(body
            .authenticated_user
            .and_then(|user| user.descriptor)
            .and_then(|descriptor| tenant_from_descriptor(&descriptor)))
    }

    async fn from_management_plane(&self, org: &OrganizationRef) -> Result<Option<String>> {
        let url = format!(
            "{}/tenants?api-version={MANAGEMENT_TENANTS_API_VERSION}",
            self.endpoints.management_base_url.trim_end_matches('/')
        );
        let response = self.http.send(self.http.get(&url).header(ACCEPT, "application/json")).await?;
        if response.status().is_success() {
            // An anonymous listing cannot be matched to one organization.
            debug!(organization = %org.name, "management plane reachable but tenant cannot be matched");
        } else {
            debug!(organization = %org.name, status = %response.status(), "management plane tenant listing refused");
        }
        Ok(None)
    }

    /// `Ok(None)` for non-success responses.
    async fn get_json<T>(&self, url: &str) -> Result<Option<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        let response = self.http.send(self.http.get(url).header(ACCEPT, "application/json")).await?;
        let status = response.status();
        if !status.is_success() {
            debug!(%url, %status, "discovery probe returned non-success status");
            return Ok(None);
        }
        let body = response.json::<T>().await.map_err(|err| {
            ConnectionError::DiscoveryInconclusive(format!("unreadable response from {url}: {err}"))
        })?;
        Ok(Some(body))
    }
}

#[async_trait]
impl TenantResolver for TenantDiscoveryResolver {
    async fn resolve_tenant(&self, organization_url: &str) -> Option<String> {
        let Some(org) = parse_organization(organization_url) else {
            debug!(organization_url, "organization url not recognised; skipping tenant discovery");
            return None;
        };

        for probe in Probe::ORDER {
            match self.probe(probe, &org).await {
                Ok(Some(tenant_id)) => {
                    info!(organization = %org.name, probe = probe.name(), tenant_id = %tenant_id, "tenant discovered");
                    return Some(tenant_id);
                }
                Ok(None) => {
                    debug!(organization = %org.name, probe = probe.name(), "tenant discovery probe inconclusive");
                }
                Err(error) => {
                    debug!(organization = %org.name, probe = probe.name(), error = %error, "tenant discovery probe failed");
                }
            }
        }

        warn!(organization = %org.name, "all tenant discovery probes failed");
        None
    }
}

/// First `;`-separated segment of a descriptor, accepted only when it looks
/// like a GUID (contains a hyphen).
pub(crate) fn tenant_from_descriptor(descriptor: &str) -> Option<String> {
    let candidate = descriptor.split(';').next()?.trim();
    (!candidate.is_empty() && candidate.contains('-')).then(|| candidate.to_string())
}
