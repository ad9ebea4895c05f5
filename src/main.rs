use anyhow::Context;
use clap::Parser;

use govdocs::app::{build_router, init_state};
use govdocs::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "govdocs=info,tower_http=info".into()),
        )
        .init();

    let config = ServerConfig::parse();

    tracing::info!(backend = ?config.backend, "Starting govdocs server...");

    // Missing configuration or an unreachable backend is fatal here.
    let state = init_state(&config)
        .await
        .context("Failed to initialize document stores")?;

    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.addr))?;

    tracing::info!("Listening on http://{}", config.addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        return;
    }
    tracing::info!("Shutting down");
}
