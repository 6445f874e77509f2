//! # Workbridge Infrastructure
//!
//! Infrastructure implementations of the `workbridge-core` ports.
//!
//! This crate contains:
//! - HTTP tenant discovery and the Entra device-code identity provider
//! - Keychain-backed and in-memory secret stores
//! - Configuration loading and tracing initialisation
//! - Wiring of the adapters into `ConnectionServices`
//!
//! ## Architecture
//! - Implements traits defined in `workbridge-core`
//! - Contains all "impure" code (HTTP, keychain, files, environment)

pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod errors;
pub mod http;
pub mod observability;
pub mod secrets;

// Re-export commonly used items
pub use auth::{
    DeviceCodeClient, DeviceCodeError, DiscoveryEndpoints, EntraAuthProvider, EntraProviderFactory,
    TenantDiscoveryResolver,
};
pub use bootstrap::{build_services, build_services_with_secrets, start_manager};
pub use errors::InfraError;
pub use http::{HttpClient, HttpClientBuilder, RetryPolicy};
pub use observability::init_tracing;
pub use secrets::{InMemorySecretStore, KeychainSecretStore};
