//! [`SecretStore`] implementations
//!
//! - [`KeychainSecretStore`]: platform keychain, used in production
//! - [`InMemorySecretStore`]: process-local map for tests and headless hosts

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;
use workbridge_common::security::KeychainProvider;
use workbridge_core::SecretStore;
use workbridge_domain::{ConnectionError, Result, SecretSettings};

use crate::errors::InfraError;

/// Secret store backed by the platform keychain.
///
/// Keychain calls block, so each one runs on the blocking pool.
#[derive(Debug, Clone)]
pub struct KeychainSecretStore {
    keychain: Arc<KeychainProvider>,
}

impl KeychainSecretStore {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { keychain: Arc::new(KeychainProvider::new(service_name)) }
    }

    pub fn from_settings(settings: &SecretSettings) -> Self {
        Self::new(settings.keychain_service.clone())
    }

    pub fn service_name(&self) -> &str {
        self.keychain.service_name()
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&KeychainProvider) -> Result<T> + Send + 'static,
    {
        let keychain = Arc::clone(&self.keychain);
        tokio::task::spawn_blocking(move || op(&keychain))
            .await
            .map_err(|e| ConnectionError::Internal(format!("keychain task failed: {e}")))?
    }
}

#[async_trait]
impl SecretStore for KeychainSecretStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.blocking(move |keychain| {
            keychain.find_secret(&key).map_err(|e| ConnectionError::from(InfraError::from(e)))
        })
        .await
    }

    async fn store(&self, key: &str, value: &str) -> Result<()> {
        let key = key.to_string();
        let value = value.to_string();
        self.blocking(move |keychain| {
            keychain.set_secret(&key, &value).map_err(|e| ConnectionError::from(InfraError::from(e)))
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.blocking(move |keychain| {
            keychain.delete_secret(&key).map_err(|e| ConnectionError::from(InfraError::from(e)))
        })
        .await
    }
}

/// Process-local secret store
#[derive(Debug, Clone, Default)]
pub struct InMemorySecretStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an entry; chainable for test setup.
    #[must_use]
    pub fn with_secret(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.write().insert(key.into(), value.into());
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn store(&self, key: &str, value: &str) -> Result<()> {
        debug!(key, "storing secret in memory");
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}
