//! # Plinth Worker
//!
//! This is the background worker for Plinth, responsible for provisioning
//! project data spaces and expiring stale invitations.
//!
//! ## Architecture
//!
//! The worker runs two independent loops:
//! - The provisioner claims pending projects and allocates their PostgreSQL
//!   schema and storage bucket
//! - The invitation sweeper expires pending invitations older than the TTL
//!
//! Both loops stop cleanly on SIGINT/SIGTERM.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p plinth-worker
//! ```

use plinth_shared::db;
use plinth_shared::notify::WebhookNotifier;
use plinth_shared::storage::ObjectStore;
use plinth_worker::config::WorkerConfig;
use plinth_worker::provisioner::{Provisioner, ProvisionerConfig};
use plinth_worker::sweeper::{InvitationSweeper, SweeperConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plinth_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Plinth Worker v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = WorkerConfig::from_env()?;

    let pool = db::pool::create_pool(db::pool::DatabaseConfig {
        url: config.database_url.clone(),
        max_connections: config.database_max_connections,
        ..Default::default()
    })
    .await?;
    tracing::info!("Database pool initialized");

    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let storage = ObjectStore::connect(&config.storage).await;
    tracing::info!("Object storage connected");

    let notifier = WebhookNotifier::new(config.webhook_signing_secret.clone());

    let provisioner = Provisioner::with_config(
        pool.clone(),
        storage,
        notifier,
        ProvisionerConfig {
            poll_interval_secs: config.provision_poll_interval_secs,
        },
    );
    let provisioner_token = provisioner.shutdown_token();

    let sweeper = InvitationSweeper::with_config(
        pool,
        SweeperConfig {
            interval_secs: config.invitation_sweep_interval_secs,
            ttl_days: config.invitation_ttl_days,
        },
    );
    let sweeper_token = sweeper.shutdown_token();

    let provisioner_handle = tokio::spawn(async move { provisioner.run().await });
    let sweeper_handle = tokio::spawn(async move { sweeper.run().await });

    tracing::info!("Worker ready");

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, stopping loops");

    provisioner_token.cancel();
    sweeper_token.cancel();

    provisioner_handle.await??;
    sweeper_handle.await??;

    tracing::info!("Worker stopped");

    Ok(())
}

/// Waits for a shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .unwrap_or_else(|e| tracing::error!(error = %e, "Failed to install Ctrl+C handler"));
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
