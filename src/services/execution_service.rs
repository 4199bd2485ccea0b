use std::sync::Arc;

use crate::api::middleware::AppError;
use crate::models::{Credentials, ExecuteRequest, ExecutionResult, SqlStatement};
use crate::services::database::AdapterRegistry;

/// Runs one statement per call on a connection opened just for that call
pub struct ExecutionService {
    registry: Arc<AdapterRegistry>,
}

impl ExecutionService {
    pub fn new(registry: Arc<AdapterRegistry>) -> Self {
        Self { registry }
    }

    /// Validate a wire request, then execute it. Nothing touches the
    /// network until both inputs are present and well-formed.
    pub async fn execute_request(&self, request: ExecuteRequest) -> Result<ExecutionResult, AppError> {
        let credentials = request
            .credentials
            .ok_or_else(|| AppError::Validation("credentials are required".to_string()))?
            .validate()?;
        let statement_text = request
            .statement_text
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| AppError::Validation("statementText is required".to_string()))?;

        self.execute(&credentials, &statement_text).await
    }

    /// The statement text is sent to the engine as-is; classification only
    /// decides the shape of the result.
    pub async fn execute(&self, credentials: &Credentials, statement_text: &str) -> Result<ExecutionResult, AppError> {
        let statement = SqlStatement::new(statement_text);

        let mut handle = self.registry.open(credentials).await.map_err(|e| match e {
            AppError::Connection(detail) => AppError::Query(detail),
            other => other,
        })?;

        tracing::info!(
            "Executing {} statement on {} database {} ({})",
            statement.kind,
            credentials.engine,
            credentials.database,
            handle.id()
        );

        let result = handle.execute(&statement).await;
        handle.close_quietly().await;

        match &result {
            Ok(ExecutionResult::Rows(rows)) => tracing::debug!("{} returned {} rows", statement.kind, rows.len()),
            Ok(ExecutionResult::Status(_)) => tracing::debug!("{} completed", statement.kind),
            Err(e) => tracing::error!("{} statement failed: {}", statement.kind, e),
        }

        result
    }
}
