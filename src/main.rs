use anyhow::Context;
use axum::http::HeaderValue;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use lipa_backend::api::{self, AppState};
use lipa_backend::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;

    tracing::info!("Starting Lipa Backend");
    tracing::info!("Environment: {}", config.server.environment);
    tracing::info!(
        "Card simulation: {}",
        if config.card.simulation_enabled { "enabled" } else { "disabled" }
    );

    let cors_origin: HeaderValue = config
        .server
        .frontend_origin
        .parse()
        .context("FRONTEND_URL is not a valid origin")?;

    // Build adapters, dispatcher, and router
    let state = Arc::new(AppState::from_config(&config));
    let app = api::router(state, cors_origin);

    // Start server
    let addr = SocketAddr::new(
        config
            .server
            .host
            .parse()
            .context("HOST must be a valid IP address")?,
        config.server.port,
    );
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
