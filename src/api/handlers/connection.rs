use axum::{extract::State, Json};

use crate::api::extract::AppJson;
use std::sync::Arc;

use crate::api::middleware::AppError;
use crate::config::Config;
use crate::models::{ConnectRequest, ConnectResponse, ConnectionState};
use crate::services::database::AdapterRegistry;
use crate::services::{
    CompletionProvider, ConnectionManager, ExecutionService, SchemaIntrospector, TranslationService,
};

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub connection_manager: Arc<ConnectionManager>,
    pub execution: Arc<ExecutionService>,
    pub translation: Arc<TranslationService>,
}

impl AppState {
    /// Wire every service to one adapter registry and one language-model provider
    pub fn new(
        config: Config,
        registry: Arc<AdapterRegistry>,
        provider: Arc<dyn CompletionProvider>,
    ) -> Self {
        let translation = TranslationService::new(
            SchemaIntrospector::new(registry.clone()),
            provider,
            &config.llm,
        );

        Self {
            connection_manager: Arc::new(ConnectionManager::new(registry.clone())),
            execution: Arc::new(ExecutionService::new(registry)),
            translation: Arc::new(translation),
            config,
        }
    }
}

/// Open the session connection, replacing any previous one
pub async fn connect(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ConnectRequest>,
) -> Result<Json<ConnectResponse>, AppError> {
    tracing::info!("Connect requested: {:?}", payload);

    let credentials = payload.validate()?;
    state.connection_manager.connect(&credentials).await?;

    Ok(Json(ConnectResponse {
        success: true,
        message: "Database connected successfully!".to_string(),
    }))
}

pub async fn disconnect(State(state): State<AppState>) -> Json<ConnectResponse> {
    let released = state.connection_manager.disconnect().await;

    let message = if released {
        "Database disconnected"
    } else {
        "No active database connection"
    };

    Json(ConnectResponse {
        success: true,
        message: message.to_string(),
    })
}

pub async fn status(State(state): State<AppState>) -> Json<ConnectionState> {
    Json(state.connection_manager.status().await)
}
