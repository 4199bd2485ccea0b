use std::sync::Arc;

use crate::api::middleware::AppError;
use crate::models::{Credentials, SchemaDescription};
use crate::services::database::AdapterRegistry;

/// Reads table/column metadata over a connection that lives for one call.
/// Independent of whatever the connection manager currently holds.
pub struct SchemaIntrospector {
    registry: Arc<AdapterRegistry>,
}

impl SchemaIntrospector {
    pub fn new(registry: Arc<AdapterRegistry>) -> Self {
        Self { registry }
    }

    pub async fn introspect(&self, credentials: &Credentials) -> Result<SchemaDescription, AppError> {
        let mut handle = self.registry.open(credentials).await.map_err(into_schema_error)?;

        let result = handle.introspect_schema().await.map_err(into_schema_error);
        handle.close_quietly().await;

        let schema = result?;
        tracing::debug!(
            "Introspected {} tables ({} columns) from {} database {}",
            schema.tables().len(),
            schema.column_count(),
            credentials.engine,
            credentials.database
        );
        Ok(schema)
    }
}

// Connect and read failures surface the same way to callers
fn into_schema_error(e: AppError) -> AppError {
    match e {
        AppError::Connection(detail) | AppError::Query(detail) => AppError::Schema(detail),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EngineKind;
    use crate::services::database::fake::{credentials, FakeAdapter};

    fn users_schema() -> SchemaDescription {
        SchemaDescription::from_rows(vec![
            ("users".to_string(), "id".to_string(), "int".to_string()),
            ("users".to_string(), "name".to_string(), "text".to_string()),
        ])
    }

    fn introspector(adapter: &FakeAdapter) -> SchemaIntrospector {
        SchemaIntrospector::new(Arc::new(AdapterRegistry::new().with(Arc::new(adapter.clone()))))
    }

    #[tokio::test]
    async fn test_introspect_closes_transient_connection() {
        let adapter = FakeAdapter::new(EngineKind::Postgres).with_schema(users_schema());

        let schema = introspector(&adapter)
            .introspect(&credentials(EngineKind::Postgres))
            .await
            .unwrap();

        assert_eq!(schema, users_schema());
        assert_eq!(adapter.events(), vec!["open:shop", "introspect", "close"]);
        assert_eq!(adapter.live(), 0);
    }

    #[tokio::test]
    async fn test_connect_failure_is_schema_error() {
        let adapter = FakeAdapter::new(EngineKind::Mysql).failing_open();

        let result = introspector(&adapter).introspect(&credentials(EngineKind::Mysql)).await;

        match result {
            Err(AppError::Schema(detail)) => assert_eq!(detail.code.as_deref(), Some("ECONNREFUSED")),
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_introspection_failure_still_closes() {
        let adapter = FakeAdapter::new(EngineKind::Mssql).failing_introspect().failing_close();

        let result = introspector(&adapter).introspect(&credentials(EngineKind::Mssql)).await;

        assert!(matches!(result, Err(AppError::Schema(_))));
        assert_eq!(adapter.events(), vec!["open:shop", "introspect", "close"]);
    }
}
