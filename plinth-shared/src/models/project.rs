/// Project model and database operations
///
/// This module provides the Project model, the unit of tenancy in Plinth.
/// Each project owns an isolated Postgres schema and an object-storage
/// bucket, carries its own API key, and enforces per-project quotas.
///
/// Creating a project allocates a unique slug, schema name, bucket name,
/// and API key, and inserts an accepted owner membership in the same
/// transaction. Allocation is retried a bounded number of times on
/// uniqueness collisions before giving up.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE projects (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     owner_id UUID NOT NULL REFERENCES users(id),
///     name VARCHAR(255) NOT NULL,
///     description TEXT,
///     slug VARCHAR(255) NOT NULL UNIQUE,
///     api_key_hash VARCHAR(64) NOT NULL UNIQUE,
///     api_key_prefix VARCHAR(16) NOT NULL,
///     schema_name VARCHAR(63) NOT NULL UNIQUE,
///     bucket_name VARCHAR(63) NOT NULL UNIQUE,
///     max_items BIGINT NOT NULL DEFAULT 1000,
///     storage_limit_mb BIGINT NOT NULL DEFAULT 100,
///     api_rate_limit BIGINT NOT NULL DEFAULT 1000,
///     webhook_url TEXT,
///     is_public BOOLEAN NOT NULL DEFAULT FALSE,
///     backup_enabled BOOLEAN NOT NULL DEFAULT TRUE,
///     backup_retention_days INTEGER NOT NULL DEFAULT 30,
///     provisioning_status provisioning_status NOT NULL DEFAULT 'pending',
///     provisioning_error TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use plinth_shared::models::project::{Project, CreateProject};
/// use plinth_shared::db::pool::{create_pool, DatabaseConfig};
/// use uuid::Uuid;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
/// let owner_id = Uuid::new_v4();
///
/// let (project, api_key) = Project::create(&pool, CreateProject {
///     owner_id,
///     name: "My App".to_string(),
///     description: Some("Mobile backend".to_string()),
///     ..Default::default()
/// }).await?;
///
/// // IMPORTANT: Save api_key now - it's never shown again!
/// println!("Project {} key: {}", project.slug, api_key);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Row};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::api_key::{extract_key_prefix, generate_api_key, hash_api_key};
use crate::models::membership::ProjectRole;

/// Default quota: rows across all project tables
pub const DEFAULT_MAX_ITEMS: i64 = 1000;

/// Default quota: object storage in megabytes
pub const DEFAULT_STORAGE_LIMIT_MB: i64 = 100;

/// Default quota: API requests per hour
pub const DEFAULT_API_RATE_LIMIT: i64 = 1000;

/// Default backup retention window in days
pub const DEFAULT_BACKUP_RETENTION_DAYS: i32 = 30;

/// How many times slug/key allocation is retried on uniqueness collisions
const MAX_ALLOCATION_ATTEMPTS: usize = 5;

/// Longest slug base before the random suffix is appended.
/// Keeps `project_{slug}` within Postgres's 63-char identifier limit.
const MAX_SLUG_BASE_LENGTH: usize = 46;

/// Errors from project registry operations
#[derive(Debug, Error)]
pub enum ProjectError {
    /// Slug or API key allocation kept colliding with existing projects
    #[error("failed to allocate unique project identifiers after {MAX_ALLOCATION_ATTEMPTS} attempts")]
    AllocationExhausted,

    /// A quota value is out of range
    #[error("invalid quota: {0}")]
    InvalidQuota(String),

    /// Underlying database error
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Provisioning lifecycle of a project's schema and bucket
///
/// New projects start as `Pending`. The provisioning worker moves them to
/// `Completed` once the schema and bucket exist, or `Failed` with an error
/// message recorded on the project row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "provisioning_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProvisioningStatus {
    Pending,
    Completed,
    Failed,
}

impl ProvisioningStatus {
    /// Returns the status as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisioningStatus::Pending => "pending",
            ProvisioningStatus::Completed => "completed",
            ProvisioningStatus::Failed => "failed",
        }
    }

    /// Parses a status from a string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ProvisioningStatus::Pending),
            "completed" => Some(ProvisioningStatus::Completed),
            "failed" => Some(ProvisioningStatus::Failed),
            _ => None,
        }
    }
}

/// Project model representing a tenant data space
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    /// Unique project ID (UUID v4)
    pub id: Uuid,

    /// User who owns the project
    pub owner_id: Uuid,

    /// Display name
    pub name: String,

    /// Optional description
    pub description: Option<String>,

    /// URL-safe unique identifier (slugified name + random suffix)
    pub slug: String,

    /// SHA-256 hash of the project API key (never store plaintext!)
    #[serde(skip_serializing)]
    pub api_key_hash: String,

    /// First characters of the key for display (e.g. "plinth_abc12")
    pub api_key_prefix: String,

    /// Postgres schema holding this project's tables
    pub schema_name: String,

    /// Object-storage bucket holding this project's files
    pub bucket_name: String,

    /// Maximum number of rows per project table
    pub max_items: i64,

    /// Object storage quota in megabytes
    pub storage_limit_mb: i64,

    /// API requests allowed per hour
    pub api_rate_limit: i64,

    /// Optional webhook endpoint notified on data changes
    pub webhook_url: Option<String>,

    /// Whether anonymous callers get read access
    pub is_public: bool,

    /// Whether nightly backups are taken for this project
    pub backup_enabled: bool,

    /// How long backups are retained
    pub backup_retention_days: i32,

    /// Current provisioning state
    pub provisioning_status: ProvisioningStatus,

    /// Error message from the last failed provisioning attempt
    pub provisioning_error: Option<String>,

    /// When the project was created
    pub created_at: DateTime<Utc>,

    /// When the project was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProject {
    /// Owning user
    pub owner_id: Uuid,

    /// Display name (also the basis for the slug)
    pub name: String,

    /// Optional description
    pub description: Option<String>,

    /// Row quota override (defaults to 1000)
    pub max_items: Option<i64>,

    /// Storage quota override in MB (defaults to 100)
    pub storage_limit_mb: Option<i64>,

    /// Rate limit override in requests/hour (defaults to 1000)
    pub api_rate_limit: Option<i64>,

    /// Optional webhook endpoint
    pub webhook_url: Option<String>,

    /// Whether anonymous callers get read access
    #[serde(default)]
    pub is_public: bool,
}

impl Default for CreateProject {
    fn default() -> Self {
        Self {
            owner_id: Uuid::nil(),
            name: String::new(),
            description: None,
            max_items: None,
            storage_limit_mb: None,
            api_rate_limit: None,
            webhook_url: None,
            is_public: false,
        }
    }
}

/// Input for updating an existing project
///
/// All fields are optional. Only non-None fields will be updated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProject {
    /// New display name (the slug never changes)
    pub name: Option<String>,

    /// New description (use Some(None) to clear)
    pub description: Option<Option<String>>,

    /// New row quota
    pub max_items: Option<i64>,

    /// New storage quota in MB
    pub storage_limit_mb: Option<i64>,

    /// New rate limit in requests/hour
    pub api_rate_limit: Option<i64>,

    /// New webhook endpoint (use Some(None) to clear)
    pub webhook_url: Option<Option<String>>,

    /// Change public read access
    pub is_public: Option<bool>,

    /// Toggle nightly backups
    pub backup_enabled: Option<bool>,

    /// Change backup retention window
    pub backup_retention_days: Option<i32>,
}

impl Project {
    /// Turns a display name into a slug base
    ///
    /// Lowercases, replaces runs of non-alphanumeric characters with a
    /// single hyphen, and truncates so the derived schema name stays
    /// within Postgres's identifier limit. Falls back to "project" when
    /// nothing usable remains.
    ///
    /// # Example
    ///
    /// ```
    /// use plinth_shared::models::project::Project;
    ///
    /// assert_eq!(Project::slugify("My App"), "my-app");
    /// assert_eq!(Project::slugify("  Crème brûlée!  "), "cr-me-br-l-e");
    /// assert_eq!(Project::slugify("???"), "project");
    /// ```
    pub fn slugify(name: &str) -> String {
        let mut slug = String::with_capacity(name.len());
        let mut last_was_hyphen = true;

        for c in name.chars() {
            if c.is_ascii_alphanumeric() {
                slug.push(c.to_ascii_lowercase());
                last_was_hyphen = false;
            } else if !last_was_hyphen {
                slug.push('-');
                last_was_hyphen = true;
            }
        }

        while slug.ends_with('-') {
            slug.pop();
        }

        slug.truncate(MAX_SLUG_BASE_LENGTH);
        while slug.ends_with('-') {
            slug.pop();
        }

        if slug.is_empty() {
            slug.push_str("project");
        }

        slug
    }

    /// Generates a candidate slug: slugified name plus an 8-hex-char suffix
    ///
    /// The suffix keeps slugs unique across projects with the same name.
    /// Collisions are still possible and handled by the allocation retry
    /// loop in [`Project::create`].
    pub fn generate_slug(name: &str) -> String {
        let suffix: u32 = rand::thread_rng().gen();
        format!("{}-{:08x}", Self::slugify(name), suffix)
    }

    /// Derives the Postgres schema name for a slug
    ///
    /// # Example
    ///
    /// ```
    /// use plinth_shared::models::project::Project;
    ///
    /// assert_eq!(Project::schema_name_for("my-app-1a2b3c4d"), "project_my_app_1a2b3c4d");
    /// ```
    pub fn schema_name_for(slug: &str) -> String {
        format!("project_{}", slug.replace('-', "_"))
    }

    /// Derives the object-storage bucket name for a slug
    ///
    /// # Example
    ///
    /// ```
    /// use plinth_shared::models::project::Project;
    ///
    /// assert_eq!(Project::bucket_name_for("my-app-1a2b3c4d"), "project-my-app-1a2b3c4d");
    /// ```
    pub fn bucket_name_for(slug: &str) -> String {
        format!("project-{}", slug)
    }

    /// Validates quota values
    ///
    /// All quotas must be strictly positive.
    ///
    /// # Errors
    ///
    /// Returns `ProjectError::InvalidQuota` naming the offending field
    pub fn validate_quotas(
        max_items: Option<i64>,
        storage_limit_mb: Option<i64>,
        api_rate_limit: Option<i64>,
    ) -> Result<(), ProjectError> {
        if let Some(v) = max_items {
            if v <= 0 {
                return Err(ProjectError::InvalidQuota(format!(
                    "max_items must be positive, got {}",
                    v
                )));
            }
        }
        if let Some(v) = storage_limit_mb {
            if v <= 0 {
                return Err(ProjectError::InvalidQuota(format!(
                    "storage_limit_mb must be positive, got {}",
                    v
                )));
            }
        }
        if let Some(v) = api_rate_limit {
            if v <= 0 {
                return Err(ProjectError::InvalidQuota(format!(
                    "api_rate_limit must be positive, got {}",
                    v
                )));
            }
        }
        Ok(())
    }

    /// Creates a new project with an accepted owner membership
    ///
    /// Allocates a slug, schema name, bucket name, and API key, then
    /// inserts the project row and the owner's membership in a single
    /// transaction. On a uniqueness collision the whole allocation is
    /// retried with fresh random values, up to 5 attempts.
    ///
    /// The project starts with `provisioning_status = 'pending'`; the
    /// provisioning worker creates the schema and bucket asynchronously.
    ///
    /// Returns both the project record and the plaintext API key.
    /// **IMPORTANT**: The plaintext key is only returned once and never stored!
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A quota override is not strictly positive (`InvalidQuota`)
    /// - Allocation keeps colliding after 5 attempts (`AllocationExhausted`)
    /// - The owner does not exist or the database fails (`Database`)
    pub async fn create(pool: &PgPool, data: CreateProject) -> Result<(Self, String), ProjectError> {
        Self::validate_quotas(data.max_items, data.storage_limit_mb, data.api_rate_limit)?;

        let max_items = data.max_items.unwrap_or(DEFAULT_MAX_ITEMS);
        let storage_limit_mb = data.storage_limit_mb.unwrap_or(DEFAULT_STORAGE_LIMIT_MB);
        let api_rate_limit = data.api_rate_limit.unwrap_or(DEFAULT_API_RATE_LIMIT);

        for _ in 0..MAX_ALLOCATION_ATTEMPTS {
            let slug = Self::generate_slug(&data.name);
            let schema_name = Self::schema_name_for(&slug);
            let bucket_name = Self::bucket_name_for(&slug);
            let (plaintext_key, key_hash) = generate_api_key();
            let key_prefix = extract_key_prefix(&plaintext_key);

            let mut tx = pool.begin().await?;

            let inserted = sqlx::query_as::<_, Project>(
                r#"
                INSERT INTO projects (owner_id, name, description, slug, api_key_hash,
                                      api_key_prefix, schema_name, bucket_name, max_items,
                                      storage_limit_mb, api_rate_limit, webhook_url, is_public)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                RETURNING id, owner_id, name, description, slug, api_key_hash, api_key_prefix,
                          schema_name, bucket_name, max_items, storage_limit_mb, api_rate_limit,
                          webhook_url, is_public, backup_enabled, backup_retention_days,
                          provisioning_status, provisioning_error, created_at, updated_at
                "#,
            )
            .bind(data.owner_id)
            .bind(&data.name)
            .bind(&data.description)
            .bind(&slug)
            .bind(&key_hash)
            .bind(&key_prefix)
            .bind(&schema_name)
            .bind(&bucket_name)
            .bind(max_items)
            .bind(storage_limit_mb)
            .bind(api_rate_limit)
            .bind(&data.webhook_url)
            .bind(data.is_public)
            .fetch_one(&mut *tx)
            .await;

            let project = match inserted {
                Ok(project) => project,
                Err(e) => {
                    tx.rollback().await?;
                    if is_unique_violation(&e) {
                        continue;
                    }
                    return Err(e.into());
                }
            };

            // The owner joins as an accepted member in the same transaction,
            // so a project is never visible without its owner membership
            sqlx::query(
                r#"
                INSERT INTO project_memberships (project_id, user_id, role, status, responded_at)
                VALUES ($1, $2, 'owner', 'accepted', NOW())
                "#,
            )
            .bind(project.id)
            .bind(data.owner_id)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;

            return Ok((project, plaintext_key));
        }

        Err(ProjectError::AllocationExhausted)
    }

    /// Finds a project by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let project = sqlx::query_as::<_, Project>(
            r#"
            SELECT id, owner_id, name, description, slug, api_key_hash, api_key_prefix,
                   schema_name, bucket_name, max_items, storage_limit_mb, api_rate_limit,
                   webhook_url, is_public, backup_enabled, backup_retention_days,
                   provisioning_status, provisioning_error, created_at, updated_at
            FROM projects
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(project)
    }

    /// Finds a project by slug
    pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Self>, sqlx::Error> {
        let project = sqlx::query_as::<_, Project>(
            r#"
            SELECT id, owner_id, name, description, slug, api_key_hash, api_key_prefix,
                   schema_name, bucket_name, max_items, storage_limit_mb, api_rate_limit,
                   webhook_url, is_public, backup_enabled, backup_retention_days,
                   provisioning_status, provisioning_error, created_at, updated_at
            FROM projects
            WHERE slug = $1
            "#,
        )
        .bind(slug)
        .fetch_optional(pool)
        .await?;

        Ok(project)
    }

    /// Finds a project by its plaintext API key
    ///
    /// Hashes the key and looks it up. A rotated key stops matching the
    /// moment the rotation commits, since only the current hash is stored.
    pub async fn find_by_api_key(
        pool: &PgPool,
        plaintext_key: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let key_hash = hash_api_key(plaintext_key);

        let project = sqlx::query_as::<_, Project>(
            r#"
            SELECT id, owner_id, name, description, slug, api_key_hash, api_key_prefix,
                   schema_name, bucket_name, max_items, storage_limit_mb, api_rate_limit,
                   webhook_url, is_public, backup_enabled, backup_retention_days,
                   provisioning_status, provisioning_error, created_at, updated_at
            FROM projects
            WHERE api_key_hash = $1
            "#,
        )
        .bind(key_hash)
        .fetch_optional(pool)
        .await?;

        Ok(project)
    }

    /// Updates an existing project
    ///
    /// Only non-None fields in `data` are updated. The `updated_at`
    /// timestamp is always set to the current time. The slug, schema name,
    /// and bucket name are immutable after creation.
    ///
    /// # Returns
    ///
    /// The updated project if found, None if the project doesn't exist
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuota` if a quota field is not strictly positive,
    /// or `Database` if the query fails
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateProject,
    ) -> Result<Option<Self>, ProjectError> {
        Self::validate_quotas(data.max_items, data.storage_limit_mb, data.api_rate_limit)?;

        if let Some(v) = data.backup_retention_days {
            if v <= 0 {
                return Err(ProjectError::InvalidQuota(format!(
                    "backup_retention_days must be positive, got {}",
                    v
                )));
            }
        }

        // Build dynamic update query based on which fields are present
        let mut query = String::from("UPDATE projects SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", name = ${}", bind_count));
        }
        if data.description.is_some() {
            bind_count += 1;
            query.push_str(&format!(", description = ${}", bind_count));
        }
        if data.max_items.is_some() {
            bind_count += 1;
            query.push_str(&format!(", max_items = ${}", bind_count));
        }
        if data.storage_limit_mb.is_some() {
            bind_count += 1;
            query.push_str(&format!(", storage_limit_mb = ${}", bind_count));
        }
        if data.api_rate_limit.is_some() {
            bind_count += 1;
            query.push_str(&format!(", api_rate_limit = ${}", bind_count));
        }
        if data.webhook_url.is_some() {
            bind_count += 1;
            query.push_str(&format!(", webhook_url = ${}", bind_count));
        }
        if data.is_public.is_some() {
            bind_count += 1;
            query.push_str(&format!(", is_public = ${}", bind_count));
        }
        if data.backup_enabled.is_some() {
            bind_count += 1;
            query.push_str(&format!(", backup_enabled = ${}", bind_count));
        }
        if data.backup_retention_days.is_some() {
            bind_count += 1;
            query.push_str(&format!(", backup_retention_days = ${}", bind_count));
        }

        query.push_str(
            " WHERE id = $1 RETURNING id, owner_id, name, description, slug, api_key_hash, \
             api_key_prefix, schema_name, bucket_name, max_items, storage_limit_mb, \
             api_rate_limit, webhook_url, is_public, backup_enabled, backup_retention_days, \
             provisioning_status, provisioning_error, created_at, updated_at",
        );

        let mut q = sqlx::query_as::<_, Project>(&query).bind(id);

        if let Some(name) = data.name {
            q = q.bind(name);
        }
        if let Some(description_opt) = data.description {
            q = q.bind(description_opt);
        }
        if let Some(max_items) = data.max_items {
            q = q.bind(max_items);
        }
        if let Some(storage_limit_mb) = data.storage_limit_mb {
            q = q.bind(storage_limit_mb);
        }
        if let Some(api_rate_limit) = data.api_rate_limit {
            q = q.bind(api_rate_limit);
        }
        if let Some(webhook_url_opt) = data.webhook_url {
            q = q.bind(webhook_url_opt);
        }
        if let Some(is_public) = data.is_public {
            q = q.bind(is_public);
        }
        if let Some(backup_enabled) = data.backup_enabled {
            q = q.bind(backup_enabled);
        }
        if let Some(backup_retention_days) = data.backup_retention_days {
            q = q.bind(backup_retention_days);
        }

        let project = q.fetch_optional(pool).await?;

        Ok(project)
    }

    /// Rotates the project's API key
    ///
    /// Generates a fresh key and replaces the stored hash. The old key is
    /// invalid as soon as this commits.
    ///
    /// Returns the updated project and the new plaintext key, or None if
    /// the project doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if database connection fails
    pub async fn rotate_api_key(
        pool: &PgPool,
        id: Uuid,
    ) -> Result<Option<(Self, String)>, sqlx::Error> {
        let (plaintext_key, key_hash) = generate_api_key();
        let key_prefix = extract_key_prefix(&plaintext_key);

        let project = sqlx::query_as::<_, Project>(
            r#"
            UPDATE projects
            SET api_key_hash = $2, api_key_prefix = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING id, owner_id, name, description, slug, api_key_hash, api_key_prefix,
                      schema_name, bucket_name, max_items, storage_limit_mb, api_rate_limit,
                      webhook_url, is_public, backup_enabled, backup_retention_days,
                      provisioning_status, provisioning_error, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(key_hash)
        .bind(key_prefix)
        .fetch_optional(pool)
        .await?;

        Ok(project.map(|p| (p, plaintext_key)))
    }

    /// Marks provisioning as completed
    ///
    /// Clears any previous provisioning error.
    pub async fn mark_provisioning_completed(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE projects
            SET provisioning_status = 'completed', provisioning_error = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Marks provisioning as failed with an error message
    pub async fn mark_provisioning_failed(
        pool: &PgPool,
        id: Uuid,
        error: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE projects
            SET provisioning_status = 'failed', provisioning_error = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes a project by ID
    ///
    /// Memberships are removed by the ON DELETE CASCADE on
    /// project_memberships. The caller is responsible for dropping the
    /// project's schema and bucket before deleting the row.
    ///
    /// # Returns
    ///
    /// True if the project was deleted, false if it didn't exist
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists all projects with pagination
    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Self>, sqlx::Error> {
        let projects = sqlx::query_as::<_, Project>(
            r#"
            SELECT id, owner_id, name, description, slug, api_key_hash, api_key_prefix,
                   schema_name, bucket_name, max_items, storage_limit_mb, api_rate_limit,
                   webhook_url, is_public, backup_enabled, backup_retention_days,
                   provisioning_status, provisioning_error, created_at, updated_at
            FROM projects
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(projects)
    }

    /// Lists projects owned by a user
    pub async fn list_by_owner(pool: &PgPool, owner_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let projects = sqlx::query_as::<_, Project>(
            r#"
            SELECT id, owner_id, name, description, slug, api_key_hash, api_key_prefix,
                   schema_name, bucket_name, max_items, storage_limit_mb, api_rate_limit,
                   webhook_url, is_public, backup_enabled, backup_retention_days,
                   provisioning_status, provisioning_error, created_at, updated_at
            FROM projects
            WHERE owner_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(pool)
        .await?;

        Ok(projects)
    }

    /// Lists projects where the user holds an accepted membership,
    /// paired with the role they hold on each
    pub async fn list_for_member(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<(Self, ProjectRole)>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.owner_id, p.name, p.description, p.slug, p.api_key_hash,
                   p.api_key_prefix, p.schema_name, p.bucket_name, p.max_items,
                   p.storage_limit_mb, p.api_rate_limit, p.webhook_url, p.is_public,
                   p.backup_enabled, p.backup_retention_days, p.provisioning_status,
                   p.provisioning_error, p.created_at, p.updated_at, m.role
            FROM projects p
            JOIN project_memberships m ON m.project_id = p.id
            WHERE m.user_id = $1 AND m.status = 'accepted'
            ORDER BY p.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        rows.iter()
            .map(|row| {
                let project = Project::from_row(row)?;
                let role: ProjectRole = row.try_get("role")?;
                Ok((project, role))
            })
            .collect()
    }

    /// Counts total number of projects
    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM projects")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }
}

/// Checks whether a sqlx error is a Postgres unique constraint violation
fn is_unique_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(Project::slugify("My App"), "my-app");
        assert_eq!(Project::slugify("hello world 42"), "hello-world-42");
        assert_eq!(Project::slugify("  spaced  out  "), "spaced-out");
        assert_eq!(Project::slugify("UPPER_case.name"), "upper-case-name");
    }

    #[test]
    fn test_slugify_empty_falls_back() {
        assert_eq!(Project::slugify(""), "project");
        assert_eq!(Project::slugify("???"), "project");
        assert_eq!(Project::slugify("---"), "project");
    }

    #[test]
    fn test_slugify_truncates_long_names() {
        let long_name = "a".repeat(200);
        let slug = Project::slugify(&long_name);
        assert!(slug.len() <= 46);
    }

    #[test]
    fn test_generate_slug_format() {
        let slug = Project::generate_slug("My App");
        assert!(slug.starts_with("my-app-"));

        let suffix = slug.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_slug_is_random() {
        let slug1 = Project::generate_slug("My App");
        let slug2 = Project::generate_slug("My App");
        assert_ne!(slug1, slug2);
    }

    #[test]
    fn test_schema_name_stays_within_identifier_limit() {
        let long_name = "x".repeat(200);
        let slug = Project::generate_slug(&long_name);
        let schema = Project::schema_name_for(&slug);
        assert!(schema.len() <= 63, "schema name too long: {}", schema);

        let bucket = Project::bucket_name_for(&slug);
        assert!(bucket.len() <= 63, "bucket name too long: {}", bucket);
    }

    #[test]
    fn test_schema_and_bucket_derivation() {
        assert_eq!(
            Project::schema_name_for("my-app-1a2b3c4d"),
            "project_my_app_1a2b3c4d"
        );
        assert_eq!(
            Project::bucket_name_for("my-app-1a2b3c4d"),
            "project-my-app-1a2b3c4d"
        );
    }

    #[test]
    fn test_validate_quotas_accepts_positive() {
        assert!(Project::validate_quotas(Some(1), Some(100), Some(50)).is_ok());
        assert!(Project::validate_quotas(None, None, None).is_ok());
    }

    #[test]
    fn test_validate_quotas_rejects_zero_and_negative() {
        assert!(matches!(
            Project::validate_quotas(Some(0), None, None),
            Err(ProjectError::InvalidQuota(_))
        ));
        assert!(matches!(
            Project::validate_quotas(None, Some(-5), None),
            Err(ProjectError::InvalidQuota(_))
        ));
        assert!(matches!(
            Project::validate_quotas(None, None, Some(-1)),
            Err(ProjectError::InvalidQuota(_))
        ));
    }

    #[test]
    fn test_provisioning_status_as_str() {
        assert_eq!(ProvisioningStatus::Pending.as_str(), "pending");
        assert_eq!(ProvisioningStatus::Completed.as_str(), "completed");
        assert_eq!(ProvisioningStatus::Failed.as_str(), "failed");
    }

    #[test]
    fn test_provisioning_status_from_str() {
        assert_eq!(
            ProvisioningStatus::from_str("pending"),
            Some(ProvisioningStatus::Pending)
        );
        assert_eq!(
            ProvisioningStatus::from_str("completed"),
            Some(ProvisioningStatus::Completed)
        );
        assert_eq!(
            ProvisioningStatus::from_str("failed"),
            Some(ProvisioningStatus::Failed)
        );
        assert_eq!(ProvisioningStatus::from_str("bogus"), None);
    }

    #[test]
    fn test_update_project_default() {
        let update = UpdateProject::default();
        assert!(update.name.is_none());
        assert!(update.max_items.is_none());
        assert!(update.is_public.is_none());
    }

    // Integration tests for database operations are in the tests/ directory
}
