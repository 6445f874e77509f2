//! Client construction input and validation

use std::fmt;

use workbridge_domain::{AuthMethod, ConnectionConfig};

use super::state::ConnectionContext;

/// Credential handed to the client factory
#[derive(Clone, PartialEq, Eq)]
pub enum ClientCredential {
    Pat(String),
    Bearer(String),
}

impl ClientCredential {
    #[must_use]
    pub fn secret(&self) -> &str {
        match self {
            Self::Pat(value) | Self::Bearer(value) => value,
        }
    }

    #[must_use]
    pub fn auth_type(&self) -> &'static str {
        match self {
            Self::Pat(_) => "pat",
            Self::Bearer(_) => "bearer",
        }
    }
}

impl fmt::Debug for ClientCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientCredential::{}(len={})", self.auth_type(), self.secret().len())
    }
}

/// Snapshot of the context fields client construction depends on
#[derive(Debug, Clone)]
pub struct ClientRequest {
    pub connection_id: String,
    pub config: ConnectionConfig,
    pub auth_method: AuthMethod,
    pub credential: Option<String>,
}

impl ClientRequest {
    #[must_use]
    pub fn from_context(ctx: &ConnectionContext) -> Self {
        Self {
            connection_id: ctx.connection_id.clone(),
            config: ctx.config.clone(),
            auth_method: ctx.auth_method,
            credential: ctx.credential.clone().or_else(|| ctx.access_token.clone()),
        }
    }
}

/// Configuration that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedClientConfig {
    pub organization: String,
    pub project: String,
    pub base_url: String,
    pub api_base_url: Option<String>,
    pub credential: ClientCredential,
}

/// Result of `validate_client_config`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub config: Option<ValidatedClientConfig>,
}

impl ClientValidation {
    #[must_use]
    pub fn valid(config: ValidatedClientConfig) -> Self {
        Self { is_valid: true, errors: Vec::new(), config: Some(config) }
    }

    #[must_use]
    pub fn invalid(errors: Vec<String>) -> Self {
        Self { is_valid: false, errors, config: None }
    }
}

/// Built-in validation: organization, project, a non-empty credential and an
/// http(s) base URL. Reports every problem, not just the first.
#[must_use]
pub fn default_client_validation(request: &ClientRequest) -> ClientValidation {
    let config = request.config.clone().with_defaults();
    let mut errors = Vec::new();

    let organization = non_empty(config.organization.as_deref());
    if organization.is_none() {
        errors.push("organization is required".to_string());
    }
    let project = non_empty(config.project.as_deref());
    if project.is_none() {
        errors.push("project is required".to_string());
    }

    let credential = non_empty(request.credential.as_deref());
    if credential.is_none() {
        errors.push(match request.auth_method {
            AuthMethod::Pat => "personal access token is required".to_string(),
            AuthMethod::Entra => "access token is required".to_string(),
        });
    }

    let base_url = non_empty(config.base_url.as_deref());
    match base_url {
        Some(url) if is_http_url(url) => {}
        Some(_) => errors.push("base URL must be an http(s) URL".to_string()),
        None => errors.push("base URL is required".to_string()),
    }

    if !errors.is_empty() {
        return ClientValidation::invalid(errors);
    }

    // Every field was checked above
    let (Some(organization), Some(project), Some(credential), Some(base_url)) =
        (organization, project, credential, base_url)
    else {
        return ClientValidation::invalid(vec!["incomplete client configuration".to_string()]);
    };

    let credential = match request.auth_method {
        AuthMethod::Pat => ClientCredential::Pat(credential.to_string()),
        AuthMethod::Entra => ClientCredential::Bearer(credential.to_string()),
    };

    ClientValidation::valid(ValidatedClientConfig {
        organization: organization.to_string(),
        project: project.to_string(),
        base_url: base_url.trim_end_matches('/').to_string(),
        api_base_url: non_empty(config.api_base_url.as_deref()).map(str::to_string),
        credential,
    })
}

fn is_http_url(value: &str) -> bool {
    url::Url::parse(value).is_ok_and(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
