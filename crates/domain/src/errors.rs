//! Error types used throughout the connection lifecycle

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure taxonomy for connecting to the work-tracking service.
///
/// Every asynchronous step of the lifecycle converts its failure into one of
/// these variants; the state machine stores the rendered message as
/// `lastError` and picks the failure state from the step that failed.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum ConnectionError {
    #[error("Client configuration validation failed: {}", .0.join(", "))]
    ConfigInvalid(Vec<String>),

    #[error("{0}")]
    AuthFailure(String),

    #[error("network_error: {0}")]
    Network(String),

    /// Tenant discovery step produced nothing usable. Never surfaces alone.
    #[error("Tenant discovery inconclusive: {0}")]
    DiscoveryInconclusive(String),

    #[error("Client creation failed: {0}")]
    ClientConstructionFailure(String),

    #[error("Provider creation failed: {0}")]
    ProviderConstructionFailure(String),

    #[error("Token refresh failed: {0}")]
    RefreshFailure(String),

    #[error("Connection error: {0}")]
    GenericConnectionError(String),

    #[error("Secret storage error: {0}")]
    SecretStore(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConnectionError {
    /// True for failures caused by the network rather than by credentials.
    #[must_use]
    pub fn is_network(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::AuthFailure(msg) | Self::RefreshFailure(msg) => msg.contains("network_error"),
            _ => false,
        }
    }

    /// Short machine-readable kind, used as a structured log field.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigInvalid(_) => "config_invalid",
            Self::AuthFailure(_) => "auth_failure",
            Self::Network(_) => "network",
            Self::DiscoveryInconclusive(_) => "discovery_inconclusive",
            Self::ClientConstructionFailure(_) => "client_construction_failure",
            Self::ProviderConstructionFailure(_) => "provider_construction_failure",
            Self::RefreshFailure(_) => "refresh_failure",
            Self::GenericConnectionError(_) => "generic_connection_error",
            Self::SecretStore(_) => "secret_store",
            Self::Config(_) => "config",
            Self::Internal(_) => "internal",
        }
    }
}

/// Result type alias for connection operations
pub type Result<T> = std::result::Result<T, ConnectionError>;
