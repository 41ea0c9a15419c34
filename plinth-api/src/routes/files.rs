/// Object storage endpoints for the data plane
///
/// Files live in the project's own bucket and are addressed by key. Keys may
/// contain `/` to form folder-like prefixes, so the routes capture the rest
/// of the path as the key.
///
/// Uploads are checked against the project's `storage_limit_mb` before the
/// object is written: measured bucket usage plus the incoming size must fit
/// within the limit.
///
/// # Endpoints
///
/// - `PUT /v1/projects/:project_id/files/*key` - Upload a file
/// - `GET /v1/projects/:project_id/files/*key` - Download a file
/// - `GET /v1/projects/:project_id/files` - List files
/// - `DELETE /v1/projects/:project_id/files/*key` - Delete a file

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use plinth_shared::{
    auth::{
        authorization::{require_read, require_write},
        middleware::AuthContext,
    },
    data::ensure_provisioned,
    models::project::Project,
    quota::QuotaEnforcer,
    storage::{StorageError, StoredObject},
};
use serde::Deserialize;
use uuid::Uuid;

/// Query parameters for file listings
#[derive(Debug, Deserialize)]
pub struct ListFilesQuery {
    /// Optional key prefix filter
    pub prefix: Option<String>,
}

/// Upload a file
///
/// The request body is the raw file content; the `Content-Type` header, if
/// present, is stored with the object and returned on download.
///
/// # Endpoint
///
/// ```text
/// PUT /v1/projects/:project_id/files/reports/2026/summary.pdf
/// ```
///
/// # Response
///
/// The stored object's key and size.
///
/// # Errors
///
/// Returns 409 `quota_exceeded` when measured bucket usage plus the upload
/// size exceeds the project's storage limit.
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(project): Extension<Project>,
    Path((_, key)): Path<(Uuid, String)>,
    auth: Option<Extension<AuthContext>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<StoredObject>> {
    let auth = auth.as_ref().map(|Extension(ctx)| ctx);
    require_write(&state.db, &project, auth).await?;
    ensure_provisioned(&project)?;

    let used = state.storage.usage(&project.bucket_name).await?;

    let enforcer = QuotaEnforcer::new(state.db.clone());
    enforcer.enforce_storage(&project, used, body.len() as i64)?;

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());

    let stored = state
        .storage
        .upload(&project.bucket_name, &key, body, content_type)
        .await?;

    tracing::info!(
        project_id = %project.id,
        key = %stored.key,
        size = stored.size,
        "File uploaded"
    );

    Ok(Json(stored))
}

/// Download a file
///
/// # Endpoint
///
/// ```text
/// GET /v1/projects/:project_id/files/reports/2026/summary.pdf
/// ```
///
/// # Response
///
/// The file content with its stored `Content-Type`, or
/// `application/octet-stream` if none was recorded.
pub async fn download_file(
    State(state): State<AppState>,
    Extension(project): Extension<Project>,
    Path((_, key)): Path<(Uuid, String)>,
    auth: Option<Extension<AuthContext>>,
) -> ApiResult<Response> {
    let auth = auth.as_ref().map(|Extension(ctx)| ctx);
    require_read(&state.db, &project, auth).await?;
    ensure_provisioned(&project)?;

    let (body, content_type) = state
        .storage
        .download(&project.bucket_name, &key)
        .await?
        .ok_or_else(|| ApiError::NotFound("File not found".to_string()))?;

    let content_type = content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type)],
        body,
    )
        .into_response())
}

/// List files
///
/// # Endpoint
///
/// ```text
/// GET /v1/projects/:project_id/files?prefix=reports/
/// ```
///
/// # Response
///
/// Object keys with sizes, plus the project's total bucket usage.
pub async fn list_files(
    State(state): State<AppState>,
    Extension(project): Extension<Project>,
    Query(query): Query<ListFilesQuery>,
    auth: Option<Extension<AuthContext>>,
) -> ApiResult<Json<serde_json::Value>> {
    let auth = auth.as_ref().map(|Extension(ctx)| ctx);
    require_read(&state.db, &project, auth).await?;
    ensure_provisioned(&project)?;

    let files = state
        .storage
        .list(&project.bucket_name, query.prefix.as_deref())
        .await?;

    let total_bytes: i64 = files.iter().map(|f| f.size).sum();

    Ok(Json(serde_json::json!({
        "files": files,
        "total_bytes": total_bytes,
    })))
}

/// Delete a file
///
/// # Endpoint
///
/// ```text
/// DELETE /v1/projects/:project_id/files/reports/2026/summary.pdf
/// ```
pub async fn delete_file(
    State(state): State<AppState>,
    Extension(project): Extension<Project>,
    Path((_, key)): Path<(Uuid, String)>,
    auth: Option<Extension<AuthContext>>,
) -> ApiResult<Json<serde_json::Value>> {
    let auth = auth.as_ref().map(|Extension(ctx)| ctx);
    require_write(&state.db, &project, auth).await?;
    ensure_provisioned(&project)?;

    let deleted = match state.storage.delete(&project.bucket_name, &key).await {
        Ok(deleted) => deleted,
        Err(StorageError::BucketNotFound(_)) => false,
        Err(err) => return Err(err.into()),
    };

    if !deleted {
        return Err(ApiError::NotFound("File not found".to_string()));
    }

    tracing::info!(project_id = %project.id, key = %key, "File deleted");

    Ok(Json(serde_json::json!({ "deleted": true })))
}

// Integration tests that exercise uploads and quota enforcement against a
// real bucket are in the tests/ directory.
