//! Connection configuration as supplied by the host

use serde::{Deserialize, Serialize};

use crate::constants::{DEV_AZURE_HOST, MULTI_TENANT_PLACEHOLDER, VISUALSTUDIO_HOST_SUFFIX};

/// Authentication strategy selected for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    /// Personal access token read from secret storage.
    #[default]
    Pat,
    /// Interactive Entra sign-in through the device-code grant.
    Entra,
}

crate::impl_domain_status_conversions!(AuthMethod {
    Pat => "pat",
    Entra => "entra",
});

/// Immutable input of one connect attempt.
///
/// Field names follow the host's camelCase settings shape
/// (`authMethod`, `tenantId`, `apiBaseUrl`, `baseUrl`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default)]
    pub auth_method: AuthMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl ConnectionConfig {
    /// Minimal configuration for a connection id and auth method.
    pub fn new(id: impl Into<String>, auth_method: AuthMethod) -> Self {
        Self { id: id.into(), auth_method, ..Self::default() }
    }

    #[must_use]
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    #[must_use]
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    #[must_use]
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn with_api_base_url(mut self, api_base_url: impl Into<String>) -> Self {
        self.api_base_url = Some(api_base_url.into());
        self
    }

    /// URL identifying the organization.
    ///
    /// Priority: `apiBaseUrl`, then `baseUrl`, then
    /// `https://dev.azure.com/{organization}`.
    #[must_use]
    pub fn organization_url(&self) -> Option<String> {
        non_empty(self.api_base_url.as_deref())
            .or_else(|| non_empty(self.base_url.as_deref()))
            .map(str::to_string)
            .or_else(|| {
                non_empty(self.organization.as_deref())
                    .map(|org| format!("https://{DEV_AZURE_HOST}/{org}"))
            })
    }

    /// Tenant explicitly configured on the connection.
    ///
    /// The multi-tenant placeholder does not count as a configured tenant.
    #[must_use]
    pub fn configured_tenant(&self) -> Option<&str> {
        non_empty(self.tenant_id.as_deref())
            .filter(|tenant| !tenant.eq_ignore_ascii_case(MULTI_TENANT_PLACEHOLDER))
    }

    /// Fill `baseUrl` and `apiBaseUrl` for a connection that only names its
    /// organization and project.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        let Some(organization) = non_empty(self.organization.as_deref()).map(str::to_string)
        else {
            return self;
        };

        if non_empty(self.base_url.as_deref()).is_none() {
            self.base_url = Some(format!("https://{DEV_AZURE_HOST}/{organization}"));
        }

        if non_empty(self.api_base_url.as_deref()).is_none() {
            if let (Some(base), Some(project)) =
                (self.base_url.as_deref(), non_empty(self.project.as_deref()))
            {
                self.api_base_url = Some(compute_api_base_url(base, &organization, project));
            }
        }

        self
    }
}

fn compute_api_base_url(base_url: &str, organization: &str, project: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    let lower = trimmed.to_ascii_lowercase();

    if lower.contains(VISUALSTUDIO_HOST_SUFFIX) {
        return format!("{trimmed}/{project}/_apis");
    }
    if lower.ends_with(&format!("/{}", organization.to_ascii_lowercase())) {
        // dev.azure.com base already carries the organization segment
        return format!("{trimmed}/{project}/_apis");
    }
    format!("{trimmed}/{organization}/{project}/_apis")
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
