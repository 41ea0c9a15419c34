//! # Plinth API Server
//!
//! This is the main API server for Plinth, providing the control plane
//! (accounts, projects, memberships) and the per-project data plane
//! (tables, rows, files).
//!
//! ## Architecture
//!
//! The API server is built with Axum and provides:
//! - Authentication (JWT + per-project API keys)
//! - Project registry with quota enforcement
//! - Generic table and row endpoints backed by per-project schemas
//! - Object storage endpoints backed by per-project buckets
//! - Per-project rate limiting on the data plane
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p plinth-api
//! ```

use plinth_api::{
    app::{build_router, AppState},
    config::Config,
};
use plinth_shared::{db, storage::ObjectStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plinth_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Plinth API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let pool = db::pool::create_pool(db::pool::DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        ..Default::default()
    })
    .await?;

    db::migrations::run_migrations(&pool).await?;

    let storage = ObjectStore::connect(&config.storage).await;

    let bind_address = config.bind_address();
    let state = AppState::new(pool, config, storage);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");

    Ok(())
}

/// Resolves when SIGINT or SIGTERM arrives
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => tracing::error!(error = %err, "Failed to install SIGTERM handler"),
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
