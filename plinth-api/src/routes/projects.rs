/// Project registry endpoints
///
/// This module provides project lifecycle endpoints: creation, listing,
/// settings updates, deletion, and API key rotation. All endpoints require
/// JWT authentication; what a caller may do with a given project is decided
/// by their capabilities on it.
///
/// # Endpoints
///
/// - `POST /v1/projects` - Create project
/// - `GET /v1/projects` - List the caller's projects
/// - `GET /v1/projects/:project_id` - Get one project
/// - `PATCH /v1/projects/:project_id` - Update settings and quotas
/// - `DELETE /v1/projects/:project_id` - Delete project and everything in it
/// - `POST /v1/projects/:project_id/rotate-key` - Rotate the API key

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use plinth_shared::{
    auth::{
        authorization::{capabilities_of, require_user, Capabilities},
        middleware::AuthContext,
    },
    data::tables,
    models::membership::ProjectRole,
    models::project::{CreateProject, Project, ProvisioningStatus, UpdateProject},
    quota::QuotaEnforcer,
    storage::StorageError,
};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Create project request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    /// Project display name
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    /// Optional description
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,

    /// Row quota override
    pub max_items: Option<i64>,

    /// Storage quota override in MB
    pub storage_limit_mb: Option<i64>,

    /// Rate limit override in requests/hour
    pub api_rate_limit: Option<i64>,

    /// Optional webhook endpoint for project events
    #[validate(url(message = "Webhook URL must be a valid URL"))]
    pub webhook_url: Option<String>,

    /// Whether anonymous callers get read access
    #[serde(default)]
    pub is_public: bool,
}

/// Update project request
///
/// All fields optional; only the provided fields change. Double-option
/// fields (`description`, `webhook_url`) distinguish "leave alone" from
/// "clear".
#[derive(Debug, Deserialize)]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub max_items: Option<i64>,
    pub storage_limit_mb: Option<i64>,
    pub api_rate_limit: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    pub webhook_url: Option<Option<String>>,
    pub is_public: Option<bool>,
    pub backup_enabled: Option<bool>,
    pub backup_retention_days: Option<i32>,
}

/// Deserializes a present field into `Some(inner)`, so an explicit JSON
/// `null` becomes `Some(None)` (clear) while a missing field stays `None`
/// (leave alone)
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

/// Project representation returned by all project endpoints
///
/// The API key never appears here; the plaintext is only in
/// [`CreateProjectResponse`] and [`RotateKeyResponse`], and only once.
#[derive(Debug, Serialize)]
pub struct ProjectResponse {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    pub slug: String,
    pub api_key_prefix: String,
    pub max_items: i64,
    pub storage_limit_mb: i64,
    pub api_rate_limit: i64,
    pub webhook_url: Option<String>,
    pub is_public: bool,
    pub backup_enabled: bool,
    pub backup_retention_days: i32,
    pub provisioning_status: ProvisioningStatus,
    pub provisioning_error: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Project> for ProjectResponse {
    fn from(project: Project) -> Self {
        ProjectResponse {
            id: project.id.to_string(),
            owner_id: project.owner_id.to_string(),
            name: project.name,
            description: project.description,
            slug: project.slug,
            api_key_prefix: project.api_key_prefix,
            max_items: project.max_items,
            storage_limit_mb: project.storage_limit_mb,
            api_rate_limit: project.api_rate_limit,
            webhook_url: project.webhook_url,
            is_public: project.is_public,
            backup_enabled: project.backup_enabled,
            backup_retention_days: project.backup_retention_days,
            provisioning_status: project.provisioning_status,
            provisioning_error: project.provisioning_error,
            created_at: project.created_at,
            updated_at: project.updated_at,
        }
    }
}

/// Create project response
#[derive(Debug, Serialize)]
pub struct CreateProjectResponse {
    /// The created project
    pub project: ProjectResponse,

    /// The plaintext API key (ONLY returned on creation)
    ///
    /// IMPORTANT: This is the only time the plaintext key is shown.
    /// Store it securely as it cannot be retrieved later.
    pub api_key: String,
}

/// One entry in the project listing: the project plus the caller's role on it
#[derive(Debug, Serialize)]
pub struct ProjectWithRole {
    #[serde(flatten)]
    pub project: ProjectResponse,
    pub role: ProjectRole,
}

/// List projects response
#[derive(Debug, Serialize)]
pub struct ListProjectsResponse {
    pub projects: Vec<ProjectWithRole>,
}

/// Rotate key response
#[derive(Debug, Serialize)]
pub struct RotateKeyResponse {
    /// The updated project
    pub project: ProjectResponse,

    /// The new plaintext API key (the old key is already invalid)
    pub api_key: String,
}

/// Loads a project or reports 404
async fn load_project(state: &AppState, project_id: Uuid) -> Result<Project, ApiError> {
    Project::find_by_id(&state.db, project_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found".to_string()))
}

/// Error for a caller whose capabilities don't cover the operation
///
/// Callers with no access at all get 404, so project existence doesn't
/// leak; members without the capability get 403.
fn denied(caps: &Capabilities) -> ApiError {
    if caps.is_empty() {
        ApiError::NotFound("Project not found".to_string())
    } else {
        ApiError::InsufficientRole("Not authorized for this operation".to_string())
    }
}

/// Create a new project
///
/// Allocates slug, schema name, bucket name, and API key; the caller
/// becomes the owner with an accepted membership. Provisioning of the
/// schema and bucket happens asynchronously, so the project is returned
/// with `provisioning_status = "pending"`.
///
/// # Endpoint
///
/// ```text
/// POST /v1/projects
/// Authorization: Bearer <jwt_token>
/// Content-Type: application/json
///
/// {
///   "name": "My App",
///   "description": "Mobile backend",
///   "max_items": 5000,
///   "is_public": false
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed or a quota is not positive
/// - `401 Unauthorized`: Missing or invalid token
/// - `500 Internal Server Error`: Slug/key allocation kept colliding
pub async fn create_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateProjectRequest>,
) -> ApiResult<Json<CreateProjectResponse>> {
    let user_id = require_user(Some(&auth))?;
    req.validate()?;

    let (project, api_key) = Project::create(
        &state.db,
        CreateProject {
            owner_id: user_id,
            name: req.name,
            description: req.description,
            max_items: req.max_items,
            storage_limit_mb: req.storage_limit_mb,
            api_rate_limit: req.api_rate_limit,
            webhook_url: req.webhook_url,
            is_public: req.is_public,
        },
    )
    .await?;

    tracing::info!(
        project_id = %project.id,
        slug = %project.slug,
        owner_id = %user_id,
        "Project created, provisioning pending"
    );

    Ok(Json(CreateProjectResponse {
        project: project.into(),
        api_key,
    }))
}

/// List projects the caller belongs to
///
/// Returns every project where the caller has an accepted membership,
/// owned projects included. Each entry carries the caller's role on
/// that project.
///
/// # Endpoint
///
/// ```text
/// GET /v1/projects
/// Authorization: Bearer <jwt_token>
/// ```
pub async fn list_projects(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<ListProjectsResponse>> {
    let user_id = require_user(Some(&auth))?;

    let projects = Project::list_for_member(&state.db, user_id).await?;

    Ok(Json(ListProjectsResponse {
        projects: projects
            .into_iter()
            .map(|(project, role)| ProjectWithRole {
                project: project.into(),
                role,
            })
            .collect(),
    }))
}

/// Get a single project
///
/// # Endpoint
///
/// ```text
/// GET /v1/projects/:project_id
/// Authorization: Bearer <jwt_token>
/// ```
///
/// # Errors
///
/// - `404 Not Found`: No such project, or the caller has no access to it
pub async fn get_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<ProjectResponse>> {
    let project = load_project(&state, project_id).await?;

    let caps = capabilities_of(&state.db, &project, Some(&auth)).await?;
    if !caps.read {
        return Err(denied(&caps));
    }

    Ok(Json(project.into()))
}

/// Update project settings and quotas
///
/// Requires the `manage_settings` capability (owner). Quota reductions
/// below current usage are rejected with `invalid_quota` rather than
/// leaving the project permanently over limit.
///
/// # Endpoint
///
/// ```text
/// PATCH /v1/projects/:project_id
/// Authorization: Bearer <jwt_token>
/// Content-Type: application/json
///
/// {
///   "name": "Renamed App",
///   "max_items": 2000,
///   "webhook_url": null
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: A quota is not positive or below current usage
/// - `403 Forbidden`: Caller is a member without `manage_settings`
/// - `404 Not Found`: No such project, or the caller has no access to it
pub async fn update_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<UpdateProjectRequest>,
) -> ApiResult<Json<ProjectResponse>> {
    let project = load_project(&state, project_id).await?;

    let caps = capabilities_of(&state.db, &project, Some(&auth)).await?;
    if !caps.manage_settings {
        return Err(denied(&caps));
    }

    if let Some(new_max) = req.max_items {
        let enforcer = QuotaEnforcer::new(state.db.clone());
        let fullest = enforcer.max_table_rows(&project).await?;
        if new_max < fullest {
            return Err(ApiError::InvalidQuota(format!(
                "max_items cannot be reduced below current usage ({} rows)",
                fullest
            )));
        }
    }

    if let Some(new_limit_mb) = req.storage_limit_mb {
        let used = match state.storage.usage(&project.bucket_name).await {
            Ok(bytes) => bytes,
            // A project that never finished provisioning has no bucket
            Err(StorageError::BucketNotFound(_)) => 0,
            Err(e) => return Err(e.into()),
        };

        if new_limit_mb.saturating_mul(1024 * 1024) < used {
            return Err(ApiError::InvalidQuota(format!(
                "storage_limit_mb cannot be reduced below current usage ({} bytes)",
                used
            )));
        }
    }

    let updated = Project::update(
        &state.db,
        project_id,
        UpdateProject {
            name: req.name,
            description: req.description,
            max_items: req.max_items,
            storage_limit_mb: req.storage_limit_mb,
            api_rate_limit: req.api_rate_limit,
            webhook_url: req.webhook_url,
            is_public: req.is_public,
            backup_enabled: req.backup_enabled,
            backup_retention_days: req.backup_retention_days,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Project not found".to_string()))?;

    Ok(Json(updated.into()))
}

/// Delete a project and everything in it
///
/// Requires the `delete_project` capability (owner). Drops the project
/// schema, deletes the storage bucket, and removes the project row; the
/// database cascades to memberships.
///
/// # Endpoint
///
/// ```text
/// DELETE /v1/projects/:project_id
/// Authorization: Bearer <jwt_token>
/// ```
///
/// # Errors
///
/// - `403 Forbidden`: Caller is a member without `delete_project`
/// - `404 Not Found`: No such project, or the caller has no access to it
pub async fn delete_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let project = load_project(&state, project_id).await?;

    let caps = capabilities_of(&state.db, &project, Some(&auth)).await?;
    if !caps.delete_project {
        return Err(denied(&caps));
    }

    tables::drop_schema(&state.db, &project.schema_name).await?;

    match state.storage.delete_bucket(&project.bucket_name).await {
        Ok(()) => {}
        // Nothing to clean up when provisioning never created the bucket
        Err(StorageError::BucketNotFound(_)) => {}
        Err(e) => return Err(e.into()),
    }

    Project::delete(&state.db, project_id).await?;

    tracing::info!(project_id = %project_id, slug = %project.slug, "Project deleted");

    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// Rotate the project's API key
///
/// Requires the `manage_settings` capability (owner). The previous key is
/// invalid the moment this returns; the new plaintext key is shown exactly
/// once.
///
/// # Endpoint
///
/// ```text
/// POST /v1/projects/:project_id/rotate-key
/// Authorization: Bearer <jwt_token>
/// ```
///
/// # Errors
///
/// - `403 Forbidden`: Caller is a member without `manage_settings`
/// - `404 Not Found`: No such project, or the caller has no access to it
pub async fn rotate_api_key(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<RotateKeyResponse>> {
    let project = load_project(&state, project_id).await?;

    let caps = capabilities_of(&state.db, &project, Some(&auth)).await?;
    if !caps.manage_settings {
        return Err(denied(&caps));
    }

    let (project, api_key) = Project::rotate_api_key(&state.db, project_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found".to_string()))?;

    tracing::info!(project_id = %project.id, "API key rotated");

    Ok(Json(RotateKeyResponse {
        project: project.into(),
        api_key,
    }))
}
