//! Wiring of the production adapters into [`ConnectionServices`]
//!
//! Client and provider factories belong to the host, so they are passed in.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use workbridge_core::{
    ClientFactory, ConnectionManager, ConnectionServices, EntraOptions, ExpiryMarginValidator,
    ProviderFactory, SecretStore,
};
use workbridge_domain::{Result, WorkbridgeSettings};

use crate::auth::{EntraProviderFactory, TenantDiscoveryResolver};
use crate::secrets::KeychainSecretStore;

/// Services backed by the platform keychain.
///
/// # Errors
/// Returns an error if an HTTP client cannot be built.
pub fn build_services(
    settings: &WorkbridgeSettings,
    clients: Arc<dyn ClientFactory>,
    providers: Arc<dyn ProviderFactory>,
) -> Result<ConnectionServices> {
    let secrets: Arc<dyn SecretStore> = Arc::new(KeychainSecretStore::from_settings(&settings.secrets));
    build_services_with_secrets(settings, secrets, clients, providers)
}

/// Services over a caller-supplied secret store.
///
/// # Errors
/// Returns an error if an HTTP client cannot be built.
pub fn build_services_with_secrets(
    settings: &WorkbridgeSettings,
    secrets: Arc<dyn SecretStore>,
    clients: Arc<dyn ClientFactory>,
    providers: Arc<dyn ProviderFactory>,
) -> Result<ConnectionServices> {
    let identity = EntraProviderFactory::from_settings(&settings.auth, Arc::clone(&secrets))?;
    let tenants = TenantDiscoveryResolver::from_settings(&settings.discovery)?;
    let margin = Duration::from_secs(settings.auth.token_expiry_margin_secs);

    info!(
        authority = %settings.auth.authority_url,
        expiry_margin_secs = settings.auth.token_expiry_margin_secs,
        "connection services configured"
    );

    Ok(ConnectionServices::new(secrets, Arc::new(identity), Arc::new(tenants), clients, providers)
        .with_validator(Arc::new(ExpiryMarginValidator::new(margin)))
        .with_entra_options(EntraOptions::from(&settings.auth)))
}

/// Manager with every connection from `settings` started. Must be called
/// inside a tokio runtime.
///
/// # Errors
/// Returns the first error from building services or starting a connection.
pub fn start_manager(
    settings: &WorkbridgeSettings,
    services: ConnectionServices,
) -> Result<ConnectionManager> {
    let manager = ConnectionManager::new(services);
    for connection in &settings.connections {
        manager.connect(connection.clone().with_defaults(), false)?;
    }
    Ok(manager)
}
