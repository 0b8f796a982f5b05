mod api;
mod auth;
mod config;
mod dto;
mod error;
mod middleware;
mod state;

use std::net::SocketAddr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut config = ServerConfig::load()?;

    let default_filter = if config.app.debug {
        "gomen_web=debug,gomen_core=debug,tower_http=debug"
    } else {
        "gomen_web=info,gomen_core=info,tower_http=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    config.validate()?;
    if config.users.is_empty() {
        tracing::info!("No users configured; accounts must be created via /api/v1/auth/register");
    }
    if !config.rate_limit.trusted_proxies.is_empty() {
        tracing::info!(
            proxies = ?config.rate_limit.trusted_proxies,
            "Forwarded client addresses accepted from trusted proxies"
        );
    }

    let bind_addr = config.bind_addr;
    let sweep_interval = config.rate_limit.sweep_interval();
    let state = AppState::new(config);

    // Stale visitor cleanup
    let sweeper = state.rate_limiter.spawn_sweeper(sweep_interval);

    let app = api::app(state.clone());

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(
        app = %state.config.app.name,
        env = %state.config.app.env,
        "listening on http://{}",
        bind_addr
    );
    tracing::info!(
        "Rate limit: {} requests per {} seconds",
        state.rate_limiter.rate_limit(),
        state.rate_limiter.window().as_secs()
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.shutdown().await;
    tracing::info!("server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
