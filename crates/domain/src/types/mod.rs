//! Domain types and models

pub mod connection;
pub mod settings;

pub use connection::{AuthMethod, ConnectionConfig};
pub use settings::{
    AuthSettings, DiscoverySettings, LoggingSettings, SecretSettings, WorkbridgeSettings,
};
