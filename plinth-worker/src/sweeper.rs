/// Invitation expiry sweeper
///
/// Pending invitations do not stay open forever. This module runs a periodic
/// sweep that moves pending membership rows older than the configured TTL to
/// the `expired` status. Expired invitations can no longer be accepted or
/// rejected, but the inviter may re-invite, which resets the row to
/// `pending`.
///
/// # Example
///
/// ```no_run
/// use plinth_worker::sweeper::InvitationSweeper;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> anyhow::Result<()> {
/// let sweeper = InvitationSweeper::new(pool);
///
/// // Start sweep loop
/// sweeper.run().await?;
/// # Ok(())
/// # }
/// ```

use plinth_shared::models::membership::ProjectMembership;
use sqlx::PgPool;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

/// Sweeper configuration
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Seconds between sweeps
    pub interval_secs: u64,

    /// Days a pending invitation stays open before expiring
    pub ttl_days: i32,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        SweeperConfig {
            interval_secs: 3600,
            ttl_days: 14,
        }
    }
}

/// Invitation expiry sweeper
///
/// Periodically expires pending invitations older than the TTL.
pub struct InvitationSweeper {
    /// Database connection pool
    db: PgPool,

    /// Configuration
    config: SweeperConfig,

    /// Shutdown token
    shutdown_token: CancellationToken,
}

impl InvitationSweeper {
    /// Creates a new sweeper with default configuration
    pub fn new(db: PgPool) -> Self {
        InvitationSweeper {
            db,
            config: SweeperConfig::default(),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Creates a new sweeper with custom configuration
    pub fn with_config(db: PgPool, config: SweeperConfig) -> Self {
        InvitationSweeper {
            db,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Gets shutdown token
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Runs the sweep loop
    ///
    /// Sweeps once at startup, then on every interval until shutdown.
    pub async fn run(&self) -> anyhow::Result<()> {
        tracing::info!(
            interval_secs = self.config.interval_secs,
            ttl_days = self.config.ttl_days,
            "Invitation sweeper starting"
        );

        loop {
            if self.shutdown_token.is_cancelled() {
                tracing::info!("Invitation sweeper shut down");
                break;
            }

            match ProjectMembership::expire_stale(&self.db, self.config.ttl_days).await {
                Ok(0) => {}
                Ok(count) => {
                    tracing::info!(count = count, "Expired stale invitations");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Invitation sweep failed");
                }
            }

            tokio::select! {
                _ = self.shutdown_token.cancelled() => {}
                _ = sleep(Duration::from_secs(self.config.interval_secs)) => {}
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweeper_config_default() {
        let config = SweeperConfig::default();
        assert_eq!(config.interval_secs, 3600);
        assert_eq!(config.ttl_days, 14);
    }

    // Integration tests that exercise expiry against a real database are in
    // the tests/ directory.
}
