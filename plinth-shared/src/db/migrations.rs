/// Control-plane schema migrations
///
/// Wraps sqlx's embedded migrator. Migration files live in this
/// crate's `migrations/` directory as ordered `{timestamp}_{name}.sql`
/// files and are compiled into the binary, so the API and the worker
/// can both bring a fresh database up to the current schema without a
/// separate migration step in the deploy.
///
/// Per-project data schemas are NOT handled here; the worker creates
/// those at provisioning time.
///
/// # Example
///
/// ```no_run
/// use plinth_shared::db::migrations::run_migrations;
/// use plinth_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig {
///     url: std::env::var("DATABASE_URL")?,
///     ..Default::default()
/// })
/// .await?;
///
/// run_migrations(&pool).await?;
/// # Ok(())
/// # }
/// ```

use sqlx::{migrate::MigrateDatabase, postgres::PgPool, Postgres};
use tracing::{debug, info, warn};

/// Applied-migration summary
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    pub applied_migrations: usize,

    /// Timestamp version of the newest applied migration
    pub latest_version: Option<i64>,

    pub is_up_to_date: bool,
}

/// Applies every pending migration in order
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Starting database migrations");

    match sqlx::migrate!("./migrations").run(pool).await {
        Ok(()) => {
            info!("All database migrations completed");
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "Migration failed");
            Err(e)
        }
    }
}

/// Reads the applied-migration state from `_sqlx_migrations`
///
/// On a database that has never been migrated the bookkeeping table is
/// absent; that reports as zero applied rather than an error.
/// `is_up_to_date` reflects whether anything has been applied, not a
/// comparison against the migration files on disk.
pub async fn get_migration_status(pool: &PgPool) -> Result<MigrationStatus, sqlx::Error> {
    let table_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (
            SELECT FROM information_schema.tables
            WHERE table_schema = 'public'
            AND table_name = '_sqlx_migrations'
        )",
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        debug!("Migrations table does not exist yet");
        return Ok(MigrationStatus {
            applied_migrations: 0,
            latest_version: None,
            is_up_to_date: false,
        });
    }

    let (count, latest_version): (i64, Option<i64>) = sqlx::query_as(
        "SELECT COUNT(*), MAX(version)
         FROM _sqlx_migrations
         WHERE success = true",
    )
    .fetch_one(pool)
    .await?;

    debug!(
        applied_migrations = count,
        latest_version = ?latest_version,
        "Migration status retrieved"
    );

    Ok(MigrationStatus {
        applied_migrations: count as usize,
        latest_version,
        is_up_to_date: count > 0,
    })
}

/// Creates the database named in the URL if it is missing
///
/// Safe to call repeatedly. Intended for development and the test
/// harness; production databases are expected to exist already.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), sqlx::Error> {
    if Postgres::database_exists(database_url).await? {
        debug!("Database already exists");
        return Ok(());
    }

    info!("Database does not exist, creating it");
    Postgres::create_database(database_url).await?;
    info!("Database created");

    Ok(())
}

/// Drops the database named in the URL, data and all
///
/// Development and test environments only. Fails while other
/// connections hold the database open.
pub async fn drop_database(database_url: &str) -> Result<(), sqlx::Error> {
    if !Postgres::database_exists(database_url).await? {
        debug!("Database does not exist, nothing to drop");
        return Ok(());
    }

    warn!("Dropping database");
    Postgres::drop_database(database_url).await?;
    info!("Database dropped");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_reports_fresh_database_shape() {
        let fresh = MigrationStatus {
            applied_migrations: 0,
            latest_version: None,
            is_up_to_date: false,
        };

        assert_eq!(fresh.applied_migrations, 0);
        assert!(fresh.latest_version.is_none());
        assert!(!fresh.is_up_to_date);
    }

    // Everything that touches a live database is in tests/db_migrations_tests.rs
}
