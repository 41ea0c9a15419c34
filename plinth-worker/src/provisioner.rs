/// Project provisioner
///
/// This module implements the worker loop that turns newly created projects
/// into usable data spaces. It polls the registry for projects in the
/// `pending` provisioning state, creates the project's PostgreSQL schema and
/// storage bucket, and writes the terminal status back.
///
/// # Architecture
///
/// ```text
/// Provisioner
///   ├─> projects table: claim one pending project (FOR UPDATE SKIP LOCKED)
///   ├─> data::tables: CREATE SCHEMA for the project
///   ├─> ObjectStore: create the project bucket
///   ├─> projects table: provisioning_status -> completed | failed
///   └─> WebhookNotifier: project.provisioned | project.provisioning_failed
/// ```
///
/// # Concurrency
///
/// Claims use `FOR UPDATE SKIP LOCKED`, so multiple worker instances can run
/// side by side without provisioning the same project twice. The row lock is
/// held for the duration of one project's provisioning; schema and bucket
/// creation are both idempotent, so a crash between the side effects and the
/// status write is repaired on the next claim.
///
/// # Example
///
/// ```no_run
/// use plinth_worker::provisioner::Provisioner;
/// use plinth_shared::{notify::WebhookNotifier, storage::ObjectStore};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool, storage: ObjectStore) -> anyhow::Result<()> {
/// let notifier = WebhookNotifier::new(None);
/// let provisioner = Provisioner::new(pool, storage, notifier);
///
/// // Start provisioning loop
/// provisioner.run().await?;
/// # Ok(())
/// # }
/// ```

use plinth_shared::data::tables;
use plinth_shared::models::project::Project;
use plinth_shared::notify::{WebhookEvent, WebhookNotifier};
use plinth_shared::storage::ObjectStore;
use sqlx::PgPool;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

/// Provisioner configuration
#[derive(Debug, Clone)]
pub struct ProvisionerConfig {
    /// Poll interval in seconds when no pending projects are found
    pub poll_interval_secs: u64,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        ProvisionerConfig {
            poll_interval_secs: 1,
        }
    }
}

/// Project provisioner
///
/// Polls the registry for pending projects and allocates their schema and
/// bucket.
pub struct Provisioner {
    /// Database connection pool
    db: PgPool,

    /// Object storage backend
    storage: ObjectStore,

    /// Webhook delivery for provisioning events
    notifier: WebhookNotifier,

    /// Configuration
    config: ProvisionerConfig,

    /// Shutdown token
    shutdown_token: CancellationToken,
}

impl Provisioner {
    /// Creates a new provisioner with default configuration
    ///
    /// # Arguments
    ///
    /// * `db` - Database connection pool
    /// * `storage` - Object storage backend
    /// * `notifier` - Webhook notifier for provisioning events
    pub fn new(db: PgPool, storage: ObjectStore, notifier: WebhookNotifier) -> Self {
        Provisioner {
            db,
            storage,
            notifier,
            config: ProvisionerConfig::default(),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Creates a new provisioner with custom configuration
    pub fn with_config(
        db: PgPool,
        storage: ObjectStore,
        notifier: WebhookNotifier,
        config: ProvisionerConfig,
    ) -> Self {
        Provisioner {
            db,
            storage,
            notifier,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Gets shutdown token
    ///
    /// Used to signal graceful shutdown from external handlers.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Runs the provisioning loop
    ///
    /// Continuously claims and provisions pending projects until shutdown.
    ///
    /// # Errors
    ///
    /// Returns error only on unrecoverable failures; transient errors are
    /// logged and retried after the poll interval
    pub async fn run(&self) -> anyhow::Result<()> {
        tracing::info!("Provisioner starting");

        loop {
            if self.shutdown_token.is_cancelled() {
                tracing::info!("Provisioner shut down");
                break;
            }

            match self.provision_next().await {
                // Processed a project; immediately check for another
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(error = %e, "Provisioning pass failed");
                }
            }

            tokio::select! {
                _ = self.shutdown_token.cancelled() => {}
                _ = sleep(Duration::from_secs(self.config.poll_interval_secs)) => {}
            }
        }

        Ok(())
    }

    /// Claims and provisions one pending project
    ///
    /// The claim transaction holds the project row lock until the terminal
    /// status is written, so concurrent workers skip the row.
    ///
    /// # Returns
    ///
    /// `true` if a project was processed, `false` if none were pending
    pub async fn provision_next(&self) -> anyhow::Result<bool> {
        let mut tx = self.db.begin().await?;

        let project = sqlx::query_as::<_, Project>(
            r#"
            SELECT id, owner_id, name, description, slug, api_key_hash, api_key_prefix,
                   schema_name, bucket_name, max_items, storage_limit_mb, api_rate_limit,
                   webhook_url, is_public, backup_enabled, backup_retention_days,
                   provisioning_status, provisioning_error, created_at, updated_at
            FROM projects
            WHERE provisioning_status = 'pending'
            ORDER BY created_at ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .fetch_optional(&mut *tx)
        .await?;

        let Some(project) = project else {
            return Ok(false);
        };

        tracing::info!(
            project_id = %project.id,
            slug = %project.slug,
            "Provisioning project"
        );

        match self.provision(&project).await {
            Ok(()) => {
                sqlx::query(
                    r#"
                    UPDATE projects
                    SET provisioning_status = 'completed', provisioning_error = NULL, updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(project.id)
                .execute(&mut *tx)
                .await?;
                tx.commit().await?;

                tracing::info!(
                    project_id = %project.id,
                    schema = %project.schema_name,
                    bucket = %project.bucket_name,
                    "Project provisioned"
                );

                self.notifier.notify(
                    &project,
                    WebhookEvent::ProjectProvisioned,
                    serde_json::json!({
                        "schema": project.schema_name,
                        "bucket": project.bucket_name,
                    }),
                );
            }
            Err(e) => {
                let message = e.to_string();

                sqlx::query(
                    r#"
                    UPDATE projects
                    SET provisioning_status = 'failed', provisioning_error = $2, updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(project.id)
                .bind(&message)
                .execute(&mut *tx)
                .await?;
                tx.commit().await?;

                tracing::warn!(
                    project_id = %project.id,
                    error = %message,
                    "Project provisioning failed"
                );

                self.notifier.notify(
                    &project,
                    WebhookEvent::ProjectProvisioningFailed,
                    serde_json::json!({ "error": message }),
                );
            }
        }

        Ok(true)
    }

    /// Allocates the project's schema and bucket
    ///
    /// Both operations are idempotent, so a retry after a partial failure
    /// picks up where it left off.
    async fn provision(&self, project: &Project) -> anyhow::Result<()> {
        tables::create_schema(&self.db, &project.schema_name).await?;
        self.storage.create_bucket(&project.bucket_name).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provisioner_config_default() {
        let config = ProvisionerConfig::default();
        assert_eq!(config.poll_interval_secs, 1);
    }

    // Integration tests with an actual database and object store are in the
    // tests/ directory.
}
