use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api::handlers::connection::{self, AppState};
use crate::api::handlers::{query, translate};

/// Create router with application state
pub fn create_router_with_state(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/connect", post(connection::connect))
        .route("/api/disconnect", post(connection::disconnect))
        .route("/api/status", get(connection::status))
        .route("/api/translate", post(translate::translate))
        .route("/api/execute", post(query::execute_query))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
