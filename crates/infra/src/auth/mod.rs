//! Entra authentication adapters
//!
//! - `tenant_discovery`: organization URL → tenant id over public endpoints
//! - `device_code`: device authorization and refresh grants
//! - `entra_provider`: `IdentityAuthProvider` with a persisted token cache

pub mod device_code;
pub mod entra_provider;
pub mod tenant_discovery;

pub use device_code::{DeviceCodeClient, DeviceCodeError};
pub use entra_provider::{token_cache_key, EntraAuthProvider, EntraProviderFactory};
pub use tenant_discovery::{DiscoveryEndpoints, TenantDiscoveryResolver};
