/// Worker configuration
///
/// Loads configuration from environment variables:
///
/// - `DATABASE_URL`: PostgreSQL connection URL (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default 5)
/// - `STORAGE_ENDPOINT`, `STORAGE_REGION`, `STORAGE_ACCESS_KEY`,
///   `STORAGE_SECRET_KEY`: object storage backend (required)
/// - `WEBHOOK_SIGNING_SECRET`: optional HMAC secret for webhook deliveries
/// - `PROVISION_POLL_INTERVAL_SECS`: provisioner poll interval (default 1)
/// - `INVITATION_SWEEP_INTERVAL_SECS`: expiry sweep interval (default 3600)
/// - `INVITATION_TTL_DAYS`: days before pending invitations expire
///   (default 14)

use plinth_shared::storage::StorageConfig;
use std::env;

/// Complete worker configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// PostgreSQL connection URL
    pub database_url: String,

    /// Maximum number of connections in pool
    pub database_max_connections: u32,

    /// Object storage backend
    pub storage: StorageConfig,

    /// Optional HMAC secret for signing webhook deliveries
    pub webhook_signing_secret: Option<String>,

    /// Provisioner poll interval in seconds
    pub provision_poll_interval_secs: u64,

    /// Invitation sweep interval in seconds
    pub invitation_sweep_interval_secs: u64,

    /// Days before pending invitations expire
    pub invitation_ttl_days: i32,
}

impl WorkerConfig {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or
    /// have invalid values
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()?;

        let storage = StorageConfig::from_env()
            .map_err(|var| anyhow::anyhow!("{} environment variable is required", var))?;

        let webhook_signing_secret = env::var("WEBHOOK_SIGNING_SECRET").ok();

        let provision_poll_interval_secs = env::var("PROVISION_POLL_INTERVAL_SECS")
            .unwrap_or_else(|_| "1".to_string())
            .parse::<u64>()?;

        let invitation_sweep_interval_secs = env::var("INVITATION_SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse::<u64>()?;

        let invitation_ttl_days = env::var("INVITATION_TTL_DAYS")
            .unwrap_or_else(|_| "14".to_string())
            .parse::<i32>()?;

        if invitation_ttl_days <= 0 {
            anyhow::bail!("INVITATION_TTL_DAYS must be positive");
        }

        Ok(Self {
            database_url,
            database_max_connections,
            storage,
            webhook_signing_secret,
            provision_poll_interval_secs,
            invitation_sweep_interval_secs,
            invitation_ttl_days,
        })
    }
}

