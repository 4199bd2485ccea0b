// Database abstraction layer for multi-database support
pub mod adapter;
pub mod mssql;
pub mod mysql;
pub mod postgresql;

#[cfg(test)]
pub(crate) mod fake;

pub use adapter::{ConnectionHandle, EngineAdapter, EngineSession};
pub use mssql::SqlServerAdapter;
pub use mysql::MySQLAdapter;
pub use postgresql::PostgreSQLAdapter;

use crate::api::middleware::AppError;
use crate::models::{Credentials, EngineKind};
use std::collections::HashMap;
use std::sync::Arc;

/// Factory function to create the native adapter for an engine
pub fn create_adapter(engine: EngineKind) -> Arc<dyn EngineAdapter> {
    match engine {
        EngineKind::Postgres => Arc::new(PostgreSQLAdapter),
        EngineKind::Mysql => Arc::new(MySQLAdapter),
        EngineKind::Mssql => Arc::new(SqlServerAdapter),
    }
}

/// Engine adapters keyed by engine kind. Callers resolve an adapter once per
/// operation instead of branching on the engine at every step.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<EngineKind, Arc<dyn EngineAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the Postgres, MySQL and SQL Server drivers
    pub fn native() -> Self {
        EngineKind::ALL
            .into_iter()
            .fold(Self::new(), |registry, engine| registry.with(create_adapter(engine)))
    }

    pub fn with(mut self, adapter: Arc<dyn EngineAdapter>) -> Self {
        self.register(adapter);
        self
    }

    /// Register an adapter, replacing any previous one for the same engine
    pub fn register(&mut self, adapter: Arc<dyn EngineAdapter>) {
        self.adapters.insert(adapter.engine(), adapter);
    }

    pub fn get(&self, engine: EngineKind) -> Result<Arc<dyn EngineAdapter>, AppError> {
        self.adapters
            .get(&engine)
            .cloned()
            .ok_or_else(|| AppError::UnsupportedEngine(engine.to_string()))
    }

    /// Open a connection through the adapter registered for the credentials' engine
    pub async fn open(&self, credentials: &Credentials) -> Result<ConnectionHandle, AppError> {
        self.get(credentials.engine)?.open(credentials).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::database::fake::{credentials, FakeAdapter};

    #[test]
    fn test_native_registry_has_every_engine() {
        let registry = AdapterRegistry::native();
        for engine in EngineKind::ALL {
            assert_eq!(registry.get(engine).unwrap().engine(), engine);
        }
    }

    #[tokio::test]
    async fn test_open_without_adapter_is_unsupported() {
        let registry = AdapterRegistry::new().with(Arc::new(FakeAdapter::new(EngineKind::Postgres)));

        let result = registry.open(&credentials(EngineKind::Mssql)).await;
        assert!(matches!(result, Err(AppError::UnsupportedEngine(e)) if e == "mssql"));
    }

    #[tokio::test]
    async fn test_open_dispatches_on_engine() {
        let registry = AdapterRegistry::new()
            .with(Arc::new(FakeAdapter::new(EngineKind::Postgres)))
            .with(Arc::new(FakeAdapter::new(EngineKind::Mysql)));

        let handle = registry.open(&credentials(EngineKind::Mysql)).await.unwrap();
        assert_eq!(handle.engine(), EngineKind::Mysql);
    }
}
