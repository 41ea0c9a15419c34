/// Quota enforcement for per-project resource limits
///
/// Every project carries its own limits as columns: `max_items` (rows per
/// table), `storage_limit_mb` (bucket size), and `api_rate_limit`
/// (requests/hour, enforced by the API rate limiter, not here). This module
/// checks current usage against those limits.
///
/// # Quota Types
///
/// - **Table rows**: counted live against the project table on insert
/// - **Storage bytes**: measured bucket usage plus the incoming upload size
///
/// # Example
///
/// ```no_run
/// use plinth_shared::quota::QuotaEnforcer;
/// use plinth_shared::models::project::Project;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool, project: Project) -> Result<(), Box<dyn std::error::Error>> {
/// let enforcer = QuotaEnforcer::new(pool);
///
/// // Check before inserting a row
/// let result = enforcer.check_table_rows(&project, "notes").await?;
/// if !result.allowed {
///     return Err("row limit reached".into());
/// }
/// # Ok(())
/// # }
/// ```

use sqlx::PgPool;
use std::fmt;

use crate::data::validate_identifier;
use crate::models::project::Project;

/// Quota enforcement error
#[derive(Debug)]
pub enum QuotaError {
    /// Quota limit exceeded
    LimitExceeded {
        quota_type: QuotaType,
        limit: i64,
        current: i64,
    },

    /// Database error
    DatabaseError(sqlx::Error),
}

impl fmt::Display for QuotaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotaError::LimitExceeded {
                quota_type,
                limit,
                current,
            } => write!(
                f,
                "{} limit exceeded ({}/{})",
                quota_type.as_str(),
                current,
                limit
            ),
            QuotaError::DatabaseError(err) => write!(f, "Database error: {}", err),
        }
    }
}

impl std::error::Error for QuotaError {}

impl From<sqlx::Error> for QuotaError {
    fn from(err: sqlx::Error) -> Self {
        QuotaError::DatabaseError(err)
    }
}

/// Type of quota to check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaType {
    /// Maximum rows per project table
    TableRows,

    /// Maximum bytes stored in the project bucket
    StorageBytes,
}

impl QuotaType {
    /// Human-readable name
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaType::TableRows => "Row",
            QuotaType::StorageBytes => "Storage",
        }
    }
}

/// Result of a quota check
#[derive(Debug, Clone)]
pub struct QuotaCheckResult {
    /// Whether the request is within quota
    pub allowed: bool,

    /// Current usage
    pub current: i64,

    /// Maximum allowed
    pub limit: i64,

    /// Remaining quota
    pub remaining: i64,
}

impl QuotaCheckResult {
    /// Creates a result indicating quota is available
    pub fn allowed(current: i64, limit: i64) -> Self {
        QuotaCheckResult {
            allowed: true,
            current,
            limit,
            remaining: limit.saturating_sub(current),
        }
    }

    /// Creates a result indicating quota is exceeded
    pub fn exceeded(current: i64, limit: i64) -> Self {
        QuotaCheckResult {
            allowed: false,
            current,
            limit,
            remaining: 0,
        }
    }
}

/// Converts a project's storage limit to bytes
pub fn storage_limit_bytes(project: &Project) -> i64 {
    project.storage_limit_mb.saturating_mul(1024 * 1024)
}

/// Quota enforcement service
///
/// Checks resource usage against the owning project's limits.
pub struct QuotaEnforcer {
    db: PgPool,
}

impl QuotaEnforcer {
    /// Creates a new quota enforcer
    pub fn new(db: PgPool) -> Self {
        QuotaEnforcer { db }
    }

    /// Checks whether a table has room for one more row
    ///
    /// Counts live rows in the project table and compares against the
    /// project's `max_items`.
    ///
    /// # Arguments
    ///
    /// * `project` - Project owning the table
    /// * `table` - Table name inside the project schema
    ///
    /// # Returns
    ///
    /// Result with quota status
    ///
    /// # Errors
    ///
    /// Returns an error if the table name fails identifier validation or
    /// the count query fails
    pub async fn check_table_rows(
        &self,
        project: &Project,
        table: &str,
    ) -> Result<QuotaCheckResult, QuotaError> {
        let current = self.count_table_rows(project, table).await?;
        let limit = project.max_items;

        if current >= limit {
            Ok(QuotaCheckResult::exceeded(current, limit))
        } else {
            Ok(QuotaCheckResult::allowed(current, limit))
        }
    }

    /// Enforces the row quota, erroring when the table is full
    ///
    /// # Errors
    ///
    /// Returns `QuotaError::LimitExceeded` if inserting one more row would
    /// exceed `max_items`
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use plinth_shared::quota::QuotaEnforcer;
    /// # use plinth_shared::models::project::Project;
    /// # use sqlx::PgPool;
    /// # async fn example(pool: PgPool, project: Project) -> Result<(), Box<dyn std::error::Error>> {
    /// let enforcer = QuotaEnforcer::new(pool);
    /// enforcer.enforce_table_rows(&project, "notes").await?;
    /// // Proceed with the insert...
    /// # Ok(())
    /// # }
    /// ```
    pub async fn enforce_table_rows(
        &self,
        project: &Project,
        table: &str,
    ) -> Result<(), QuotaError> {
        let result = self.check_table_rows(project, table).await?;

        if !result.allowed {
            return Err(QuotaError::LimitExceeded {
                quota_type: QuotaType::TableRows,
                limit: result.limit,
                current: result.current,
            });
        }

        Ok(())
    }

    /// Checks whether an upload fits in the project's storage limit
    ///
    /// Pure comparison; measuring bucket usage is the storage client's job.
    ///
    /// # Arguments
    ///
    /// * `project` - Project owning the bucket
    /// * `current_bytes` - Measured bucket usage
    /// * `incoming_bytes` - Size of the upload being checked
    pub fn check_storage(
        &self,
        project: &Project,
        current_bytes: i64,
        incoming_bytes: i64,
    ) -> QuotaCheckResult {
        let limit = storage_limit_bytes(project);
        let projected = current_bytes.saturating_add(incoming_bytes);

        if projected > limit {
            QuotaCheckResult::exceeded(current_bytes, limit)
        } else {
            QuotaCheckResult::allowed(projected, limit)
        }
    }

    /// Enforces the storage quota, erroring when the upload would not fit
    ///
    /// # Errors
    ///
    /// Returns `QuotaError::LimitExceeded` if measured usage plus the
    /// incoming size exceeds `storage_limit_mb`
    pub fn enforce_storage(
        &self,
        project: &Project,
        current_bytes: i64,
        incoming_bytes: i64,
    ) -> Result<(), QuotaError> {
        let result = self.check_storage(project, current_bytes, incoming_bytes);

        if !result.allowed {
            return Err(QuotaError::LimitExceeded {
                quota_type: QuotaType::StorageBytes,
                limit: result.limit,
                current: result.current,
            });
        }

        Ok(())
    }

    /// Returns the largest live row count across the project's tables
    ///
    /// Used when a quota update tries to lower `max_items`: the new limit
    /// must still cover the fullest existing table.
    pub async fn max_table_rows(&self, project: &Project) -> Result<i64, QuotaError> {
        let tables: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT table_name
            FROM information_schema.tables
            WHERE table_schema = $1 AND table_type = 'BASE TABLE'
            "#,
        )
        .bind(&project.schema_name)
        .fetch_all(&self.db)
        .await?;

        let mut max = 0i64;
        for table in &tables {
            let count = self.count_table_rows(project, table).await?;
            max = max.max(count);
        }

        Ok(max)
    }

    /// Counts live rows in a project table
    async fn count_table_rows(&self, project: &Project, table: &str) -> Result<i64, QuotaError> {
        validate_identifier(table)
            .map_err(|_| QuotaError::DatabaseError(sqlx::Error::RowNotFound))?;

        let sql = format!(
            "SELECT COUNT(*) FROM \"{}\".\"{}\"",
            project.schema_name, table
        );

        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.db).await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::project::ProvisioningStatus;
    use chrono::Utc;
    use uuid::Uuid;

    fn test_project(max_items: i64, storage_limit_mb: i64) -> Project {
        Project {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Test".to_string(),
            description: None,
            slug: "test-00000000".to_string(),
            api_key_hash: String::new(),
            api_key_prefix: String::new(),
            schema_name: "project_test_00000000".to_string(),
            bucket_name: "project-test-00000000".to_string(),
            max_items,
            storage_limit_mb,
            api_rate_limit: 1000,
            webhook_url: None,
            is_public: false,
            backup_enabled: true,
            backup_retention_days: 30,
            provisioning_status: ProvisioningStatus::Completed,
            provisioning_error: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_storage_limit_bytes() {
        let project = test_project(1000, 100);
        assert_eq!(storage_limit_bytes(&project), 100 * 1024 * 1024);
    }

    #[test]
    fn test_check_storage_allowed() {
        let project = test_project(1000, 1);
        let enforcer = QuotaEnforcer {
            db: PgPool::connect_lazy("postgres://localhost/unused").unwrap(),
        };

        // 512 KB used, 256 KB incoming, 1 MB limit
        let result = enforcer.check_storage(&project, 512 * 1024, 256 * 1024);
        assert!(result.allowed);
        assert_eq!(result.limit, 1024 * 1024);
        assert_eq!(result.remaining, 256 * 1024);
    }

    #[test]
    fn test_check_storage_exceeded() {
        let project = test_project(1000, 1);
        let enforcer = QuotaEnforcer {
            db: PgPool::connect_lazy("postgres://localhost/unused").unwrap(),
        };

        // 900 KB used, 200 KB incoming, 1 MB limit
        let result = enforcer.check_storage(&project, 900 * 1024, 200 * 1024);
        assert!(!result.allowed);
        assert_eq!(result.remaining, 0);
    }

    #[test]
    fn test_check_storage_exact_fit() {
        let project = test_project(1000, 1);
        let enforcer = QuotaEnforcer {
            db: PgPool::connect_lazy("postgres://localhost/unused").unwrap(),
        };

        let result = enforcer.check_storage(&project, 512 * 1024, 512 * 1024);
        assert!(result.allowed);
        assert_eq!(result.remaining, 0);
    }

    #[test]
    fn test_quota_check_result_allowed() {
        let result = QuotaCheckResult::allowed(5, 10);
        assert!(result.allowed);
        assert_eq!(result.current, 5);
        assert_eq!(result.limit, 10);
        assert_eq!(result.remaining, 5);
    }

    #[test]
    fn test_quota_check_result_exceeded() {
        let result = QuotaCheckResult::exceeded(15, 10);
        assert!(!result.allowed);
        assert_eq!(result.current, 15);
        assert_eq!(result.limit, 10);
        assert_eq!(result.remaining, 0);
    }

    #[test]
    fn test_quota_type_as_str() {
        assert_eq!(QuotaType::TableRows.as_str(), "Row");
        assert_eq!(QuotaType::StorageBytes.as_str(), "Storage");
    }

    #[test]
    fn test_quota_error_display() {
        let err = QuotaError::LimitExceeded {
            quota_type: QuotaType::TableRows,
            limit: 10,
            current: 15,
        };
        assert_eq!(err.to_string(), "Row limit exceeded (15/10)");
    }
}
