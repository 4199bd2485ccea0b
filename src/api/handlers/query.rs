use axum::{extract::State, Json};

use crate::api::extract::AppJson;
use crate::api::handlers::connection::AppState;
use crate::api::middleware::AppError;
use crate::models::{ExecuteRequest, ExecuteResponse};

/// Execute a SQL statement on a connection opened for this request only
pub async fn execute_query(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ExecuteRequest>,
) -> Result<Json<ExecuteResponse>, AppError> {
    tracing::info!(
        "Executing SQL statement ({} chars)",
        payload.statement_text.as_deref().map(str::len).unwrap_or(0)
    );

    let result = state.execution.execute_request(payload).await?;

    Ok(Json(result.into()))
}
