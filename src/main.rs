use anyhow::Context;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

use nl2sql_backend::api::handlers::connection::AppState;
use nl2sql_backend::api::routes::create_router_with_state;
use nl2sql_backend::config::Config;
use nl2sql_backend::services::database::AdapterRegistry;
use nl2sql_backend::services::OpenAiProvider;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&config.logging.level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if config.llm.api_key.is_none() {
        info!("No language model API key configured; requests to {} are sent unauthenticated", config.llm.api_url);
    }

    let registry = Arc::new(AdapterRegistry::native());
    let provider = Arc::new(OpenAiProvider::new(&config.llm)?);
    let state = AppState::new(config.clone(), registry, provider);

    // Create router with state
    let app: Router = create_router_with_state(state);

    // Start server
    let addr: SocketAddr = config
        .server_address()
        .parse()
        .with_context(|| format!("Invalid server address {}", config.server_address()))?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        error!("Failed to bind {}: {}", addr, e);
        e
    })?;
    axum::serve(listener, app).await?;

    Ok(())
}
