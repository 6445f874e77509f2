//! Domain constants
//!
//! Centralized identifiers and limits used by the connection lifecycle.

// Identity platform
/// Public client id used for every device-code flow against Azure DevOps.
pub const AZURE_DEVOPS_PUBLIC_CLIENT_ID: &str = "872cd9fa-d31f-45e0-9eab-6e460a02d1f1";
/// Azure DevOps service principal (resource) id.
pub const AZURE_DEVOPS_RESOURCE_ID: &str = "499b84ac-1321-427f-aa17-267ca6975798";
/// Default scope requested for Azure DevOps access.
pub const AZURE_DEVOPS_SCOPE: &str = "499b84ac-1321-427f-aa17-267ca6975798/.default";
/// Scope that makes the identity provider issue a refresh token.
pub const OFFLINE_ACCESS_SCOPE: &str = "offline_access";
/// Multi-tenant placeholder; lets the identity provider route the sign-in.
pub const MULTI_TENANT_PLACEHOLDER: &str = "organizations";
pub const DEFAULT_AUTHORITY_URL: &str = "https://login.microsoftonline.com";
pub const DEFAULT_VERIFICATION_URI: &str = "https://microsoft.com/devicelogin";
pub const DEFAULT_DEVICE_CODE_EXPIRES_SECS: u64 = 900;

// Tenant discovery endpoints
pub const DEFAULT_TENANT_INFO_BASE_URL: &str = "https://app.vssps.visualstudio.com";
pub const DEFAULT_MANAGEMENT_BASE_URL: &str = "https://management.azure.com";
pub const DEV_AZURE_HOST: &str = "dev.azure.com";
pub const VISUALSTUDIO_HOST_SUFFIX: &str = ".visualstudio.com";

// Lifecycle limits
/// Maximum RETRY transitions per CONNECT cycle.
pub const MAX_RETRY_ATTEMPTS: u32 = 3;
pub const REFRESH_BACKOFF_BASE_MINUTES: u64 = 5;
pub const REFRESH_BACKOFF_CAP_MINUTES: u64 = 60;
/// Default near-expiry margin applied by the token validity guard.
pub const DEFAULT_TOKEN_EXPIRY_MARGIN_SECS: u64 = 300;

/// Query refreshed by the provider when a connection comes up.
pub const DEFAULT_INITIAL_QUERY: &str = "My Activity";

// Secret storage
pub const DEFAULT_KEYCHAIN_SERVICE: &str = "Workbridge.connections";
pub const ENTRA_TOKEN_CACHE_PREFIX: &str = "workbridge.entra.token.";
