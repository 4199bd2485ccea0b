use axum::{extract::State, Json};

use crate::api::extract::AppJson;
use crate::api::handlers::connection::AppState;
use crate::api::middleware::AppError;
use crate::models::{TranslateRequest, TranslateResponse};

/// Translate a natural-language request into SQL for the described database
pub async fn translate(
    State(state): State<AppState>,
    AppJson(payload): AppJson<TranslateRequest>,
) -> Result<Json<TranslateResponse>, AppError> {
    let result = state.translation.translate_request(payload).await?;

    Ok(Json(TranslateResponse { result }))
}
