//! Multi-connection registry
//!
//! One independent machine per connection id. Connections never share state
//! beyond the [`ConnectionServices`] collaborators.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{debug, info};
use workbridge_domain::{ConnectionConfig, ConnectionError, Result};

use super::driver::{ConnectionHandle, ConnectionServices};
use super::event::ConnectionEvent;
use super::ports::{WorkClient, WorkItemsProvider};
use super::state::{ConnectionSnapshot, ConnectionState};

pub struct ConnectionManager {
    services: Arc<ConnectionServices>,
    connections: DashMap<String, ConnectionHandle>,
}

impl ConnectionManager {
    pub fn new(services: ConnectionServices) -> Self {
        Self { services: Arc::new(services), connections: DashMap::new() }
    }

    pub fn services(&self) -> &Arc<ConnectionServices> {
        &self.services
    }

    /// Start (or restart) a connection, spawning its machine on first use.
    pub fn connect(&self, mut config: ConnectionConfig, force_interactive: bool) -> Result<()> {
        let id = config.id.trim().to_string();
        config.id.clone_from(&id);
        if id.is_empty() {
            return Err(ConnectionError::Config("connection id is required".to_string()));
        }
        info!(connection_id = %id, auth_method = %config.auth_method, force_interactive, "connect requested");

        let handle = self
            .connections
            .entry(id.clone())
            .or_insert_with(|| ConnectionHandle::spawn(id, Arc::clone(&self.services)))
            .clone();
        handle.send(ConnectionEvent::Connect { config, force_interactive })
    }

    pub fn disconnect(&self, connection_id: &str) -> Result<()> {
        self.send(connection_id, ConnectionEvent::Disconnect)
    }

    pub fn retry(&self, connection_id: &str) -> Result<()> {
        self.send(connection_id, ConnectionEvent::Retry)
    }

    pub fn reset(&self, connection_id: &str) -> Result<()> {
        self.send(connection_id, ConnectionEvent::Reset)
    }

    pub fn token_expired(&self, connection_id: &str) -> Result<()> {
        self.send(connection_id, ConnectionEvent::TokenExpired)
    }

    pub fn refresh_auth(&self, connection_id: &str) -> Result<()> {
        self.send(connection_id, ConnectionEvent::RefreshAuth)
    }

    pub fn connection_failed(&self, connection_id: &str, reason: Option<String>) -> Result<()> {
        self.send(connection_id, ConnectionEvent::ConnectionFailed { reason })
    }

    pub fn send(&self, connection_id: &str, event: ConnectionEvent) -> Result<()> {
        self.handle(connection_id)?.send(event)
    }

    pub fn handle(&self, connection_id: &str) -> Result<ConnectionHandle> {
        self.connections
            .get(connection_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ConnectionError::Config(format!("unknown connection: {connection_id}")))
    }

    pub fn state(&self, connection_id: &str) -> Option<ConnectionState> {
        self.connections.get(connection_id).map(|entry| entry.state())
    }

    pub fn snapshot(&self, connection_id: &str) -> Option<ConnectionSnapshot> {
        self.connections.get(connection_id).map(|entry| entry.snapshot())
    }

    pub fn is_connected(&self, connection_id: &str) -> bool {
        self.snapshot(connection_id).is_some_and(|s| s.is_connected())
    }

    pub fn client(&self, connection_id: &str) -> Option<Arc<dyn WorkClient>> {
        self.snapshot(connection_id).and_then(|s| s.context.client)
    }

    pub fn provider(&self, connection_id: &str) -> Option<Arc<dyn WorkItemsProvider>> {
        self.snapshot(connection_id).and_then(|s| s.context.provider)
    }

    /// Current state of every known connection, ordered by id.
    pub fn all_states(&self) -> BTreeMap<String, ConnectionState> {
        self.connections
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().state()))
            .collect()
    }

    pub async fn wait_for<F>(
        &self,
        connection_id: &str,
        predicate: F,
        timeout: Duration,
    ) -> Result<ConnectionSnapshot>
    where
        F: FnMut(&ConnectionSnapshot) -> bool,
    {
        // Clone out of the map so no shard lock is held across the await
        let handle = self.handle(connection_id)?;
        handle.wait_for(predicate, timeout).await
    }

    /// Stop and forget one connection.
    pub fn remove(&self, connection_id: &str) -> bool {
        match self.connections.remove(connection_id) {
            Some((_, handle)) => {
                handle.shutdown();
                debug!(connection_id, "connection removed");
                true
            }
            None => false,
        }
    }

    pub fn shutdown(&self) {
        let ids: Vec<String> = self.connections.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.remove(&id);
        }
        info!("connection manager shut down");
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        for entry in &self.connections {
            entry.value().shutdown();
        }
    }
}
