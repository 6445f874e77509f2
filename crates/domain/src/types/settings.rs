//! Application settings
//!
//! Loaded from environment variables and JSON/TOML files by the infra config
//! loader. Every field has a default so partial files are valid.

use serde::{Deserialize, Serialize};

use super::connection::ConnectionConfig;
use crate::constants::{
    AZURE_DEVOPS_PUBLIC_CLIENT_ID, AZURE_DEVOPS_SCOPE, DEFAULT_AUTHORITY_URL,
    DEFAULT_DEVICE_CODE_EXPIRES_SECS, DEFAULT_KEYCHAIN_SERVICE, DEFAULT_MANAGEMENT_BASE_URL,
    DEFAULT_TENANT_INFO_BASE_URL, DEFAULT_TOKEN_EXPIRY_MARGIN_SECS,
};

/// Root settings document
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkbridgeSettings {
    pub connections: Vec<ConnectionConfig>,
    pub auth: AuthSettings,
    pub discovery: DiscoverySettings,
    pub secrets: SecretSettings,
    pub logging: LoggingSettings,
}

/// Identity platform settings for the Entra strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub client_id: String,
    pub scopes: Vec<String>,
    pub authority_url: String,
    /// Near-expiry margin used by the token validity guard.
    pub token_expiry_margin_secs: u64,
    /// Upper bound on one device-code attempt when the server omits `expires_in`.
    pub device_code_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Ignore `HTTPS_PROXY`/`HTTP_PROXY` for identity platform calls.
    pub bypass_proxy: bool,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            client_id: AZURE_DEVOPS_PUBLIC_CLIENT_ID.to_string(),
            scopes: vec![AZURE_DEVOPS_SCOPE.to_string()],
            authority_url: DEFAULT_AUTHORITY_URL.to_string(),
            token_expiry_margin_secs: DEFAULT_TOKEN_EXPIRY_MARGIN_SECS,
            device_code_timeout_secs: DEFAULT_DEVICE_CODE_EXPIRES_SECS,
            request_timeout_secs: 30,
            bypass_proxy: false,
        }
    }
}

/// Tenant discovery endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverySettings {
    pub tenant_info_base_url: String,
    pub management_base_url: String,
    pub request_timeout_secs: u64,
    pub bypass_proxy: bool,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            tenant_info_base_url: DEFAULT_TENANT_INFO_BASE_URL.to_string(),
            management_base_url: DEFAULT_MANAGEMENT_BASE_URL.to_string(),
            request_timeout_secs: 10,
            bypass_proxy: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretSettings {
    pub keychain_service: String,
}

impl Default for SecretSettings {
    fn default() -> Self {
        Self { keychain_service: DEFAULT_KEYCHAIN_SERVICE.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive, e.g. `info` or `workbridge_core=debug`.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let settings: WorkbridgeSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, WorkbridgeSettings::default());
        assert_eq!(settings.auth.client_id, AZURE_DEVOPS_PUBLIC_CLIENT_ID);
        assert_eq!(settings.auth.token_expiry_margin_secs, 300);
        assert_eq!(settings.auth.scopes, vec![AZURE_DEVOPS_SCOPE.to_string()]);
        assert!(!settings.auth.bypass_proxy);
        assert!(!settings.discovery.bypass_proxy);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let settings: WorkbridgeSettings =
            serde_json::from_str(r#"{"auth":{"token_expiry_margin_secs":60},"logging":{"json":true}}"#)
                .unwrap();
        assert_eq!(settings.auth.token_expiry_margin_secs, 60);
        assert_eq!(settings.auth.authority_url, DEFAULT_AUTHORITY_URL);
        assert!(settings.logging.json);
        assert_eq!(settings.logging.level, "info");
    }
}
