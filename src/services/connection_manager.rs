use std::sync::Arc;
use tokio::sync::Mutex;

use crate::api::middleware::AppError;
use crate::models::{ConnectionState, ConnectionStatus, Credentials};
use crate::services::database::{AdapterRegistry, ConnectionHandle};

/// Holds at most one live connection for the session.
/// The slot stays locked across "close old, open new" so concurrent
/// connect/disconnect calls never leave two handles open.
pub struct ConnectionManager {
    registry: Arc<AdapterRegistry>,
    slot: Mutex<Option<ConnectionHandle>>,
}

impl ConnectionManager {
    pub fn new(registry: Arc<AdapterRegistry>) -> Self {
        Self {
            registry,
            slot: Mutex::new(None),
        }
    }

    /// Replace the held connection with a fresh one for `credentials`.
    /// On failure the manager is left not connected.
    pub async fn connect(&self, credentials: &Credentials) -> Result<ConnectionState, AppError> {
        let mut slot = self.slot.lock().await;

        if let Some(previous) = slot.take() {
            tracing::info!(
                "Releasing {} connection {} before reconnecting",
                previous.engine(),
                previous.id()
            );
            previous.close_quietly().await;
        }

        let handle = self.registry.open(credentials).await.map_err(|e| {
            tracing::error!(
                "Failed to connect to {} at {}:{}: {}",
                credentials.engine,
                credentials.host,
                credentials.port,
                e
            );
            e
        })?;

        tracing::info!(
            "Connected to {} database {} at {}:{} ({})",
            credentials.engine,
            credentials.database,
            credentials.host,
            credentials.port,
            handle.id()
        );

        let state = Self::state_of(&handle);
        *slot = Some(handle);
        Ok(state)
    }

    /// Release the held connection. Returns whether there was one.
    pub async fn disconnect(&self) -> bool {
        let mut slot = self.slot.lock().await;
        match slot.take() {
            Some(handle) => {
                tracing::info!("Disconnecting {} connection {}", handle.engine(), handle.id());
                handle.close_quietly().await;
                true
            }
            None => false,
        }
    }

    pub async fn status(&self) -> ConnectionState {
        let slot = self.slot.lock().await;
        slot.as_ref()
            .map(Self::state_of)
            .unwrap_or_else(ConnectionState::disconnected)
    }

    fn state_of(handle: &ConnectionHandle) -> ConnectionState {
        ConnectionState {
            status: ConnectionStatus::Connected,
            engine_kind: Some(handle.engine()),
            connection_id: Some(handle.id().to_string()),
        }
    }
}
