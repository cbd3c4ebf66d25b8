use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;

mod app;
mod auth;
mod config;
mod db;
mod error;
mod handlers;
mod models;
mod providers;
mod services;
mod validation;

use config::{Config, StorageBackend};
use db::{MemoryStore, PgStore};
use providers::{OuraClient, ProviderApi};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "balanced_life_api=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    let config = Arc::new(Config::from_env()?);

    let provider: Arc<dyn ProviderApi> =
        Arc::new(OuraClient::from_config(&config).context("Failed to build Oura client")?);
    if config.oura_client_id.is_empty() {
        tracing::warn!("OURA_CLIENT_ID is empty; the Oura handshake will be rejected upstream");
    }

    let (state, pg) = match config.storage_backend {
        StorageBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set when STORAGE_BACKEND=postgres")?;
            let pool = db::pool::create_pool(url).await?;
            db::pool::run_migrations(&pool).await?;
            tracing::info!("Database migrations applied");

            let store = PgStore::new(pool);
            (
                app::AppState::new(store.clone(), provider, config.clone()),
                Some(store),
            )
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            (
                app::AppState::new(MemoryStore::new(), provider, config.clone()),
                None,
            )
        }
    };

    let router = app::build_router(state);

    let addr = config.listen_addr();
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    // Connect info feeds the per-IP login limiter
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    if let Some(pg) = pg {
        pg.close().await;
    }
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
