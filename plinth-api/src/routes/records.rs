/// Row CRUD endpoints for the data plane
///
/// Rows travel as JSON objects keyed by column name. The payload is bound
/// column by column against the table's catalog types, so callers get a
/// `validation_error` for unknown keys or mismatched values rather than a
/// database error.
///
/// # Endpoints
///
/// - `POST /v1/projects/:project_id/tables/:table/rows` - Insert a row
/// - `GET /v1/projects/:project_id/tables/:table/rows` - List rows
/// - `GET /v1/projects/:project_id/tables/:table/rows/:row_id` - Get one row
/// - `PATCH /v1/projects/:project_id/tables/:table/rows/:row_id` - Update a row
/// - `DELETE /v1/projects/:project_id/tables/:table/rows/:row_id` - Delete a row

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use plinth_shared::{
    auth::{
        authorization::{require_read, require_write},
        middleware::AuthContext,
    },
    data::rows,
    models::project::Project,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Pagination parameters for row listings
#[derive(Debug, Deserialize)]
pub struct ListRowsQuery {
    /// Page size (default 50, max 200)
    pub limit: Option<i64>,

    /// Rows to skip (default 0)
    pub offset: Option<i64>,
}

/// Insert a row
///
/// # Endpoint
///
/// ```text
/// POST /v1/projects/:project_id/tables/:table/rows
/// ```
///
/// # Request Body
///
/// ```json
/// {
///   "title": "hello",
///   "pinned": true
/// }
/// ```
///
/// # Response
///
/// The inserted row, surrogate columns included.
///
/// # Errors
///
/// Returns 409 `quota_exceeded` when the table already holds `max_items`
/// rows.
pub async fn insert_row(
    State(state): State<AppState>,
    Extension(project): Extension<Project>,
    Path((_, table)): Path<(Uuid, String)>,
    auth: Option<Extension<AuthContext>>,
    Json(values): Json<Map<String, Value>>,
) -> ApiResult<Json<Value>> {
    let auth = auth.as_ref().map(|Extension(ctx)| ctx);
    require_write(&state.db, &project, auth).await?;

    let row = rows::insert_row(&state.db, &project, &table, &values).await?;

    Ok(Json(row))
}

/// List rows
///
/// Rows come back oldest first.
///
/// # Endpoint
///
/// ```text
/// GET /v1/projects/:project_id/tables/:table/rows?limit=50&offset=0
/// ```
pub async fn list_rows(
    State(state): State<AppState>,
    Extension(project): Extension<Project>,
    Path((_, table)): Path<(Uuid, String)>,
    Query(query): Query<ListRowsQuery>,
    auth: Option<Extension<AuthContext>>,
) -> ApiResult<Json<Value>> {
    let auth = auth.as_ref().map(|Extension(ctx)| ctx);
    require_read(&state.db, &project, auth).await?;

    let rows = rows::list_rows(&state.db, &project, &table, query.limit, query.offset).await?;

    Ok(Json(serde_json::json!({ "rows": rows })))
}

/// Get one row
///
/// # Endpoint
///
/// ```text
/// GET /v1/projects/:project_id/tables/:table/rows/:row_id
/// ```
pub async fn get_row(
    State(state): State<AppState>,
    Extension(project): Extension<Project>,
    Path((_, table, row_id)): Path<(Uuid, String, Uuid)>,
    auth: Option<Extension<AuthContext>>,
) -> ApiResult<Json<Value>> {
    let auth = auth.as_ref().map(|Extension(ctx)| ctx);
    require_read(&state.db, &project, auth).await?;

    let row = rows::get_row(&state.db, &project, &table, row_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Row not found".to_string()))?;

    Ok(Json(row))
}

/// Update a row
///
/// Only the provided columns change; `updated_at` is refreshed on every
/// update.
///
/// # Endpoint
///
/// ```text
/// PATCH /v1/projects/:project_id/tables/:table/rows/:row_id
/// ```
pub async fn update_row(
    State(state): State<AppState>,
    Extension(project): Extension<Project>,
    Path((_, table, row_id)): Path<(Uuid, String, Uuid)>,
    auth: Option<Extension<AuthContext>>,
    Json(values): Json<Map<String, Value>>,
) -> ApiResult<Json<Value>> {
    let auth = auth.as_ref().map(|Extension(ctx)| ctx);
    require_write(&state.db, &project, auth).await?;

    let row = rows::update_row(&state.db, &project, &table, row_id, &values)
        .await?
        .ok_or_else(|| ApiError::NotFound("Row not found".to_string()))?;

    Ok(Json(row))
}

/// Delete a row
///
/// # Endpoint
///
/// ```text
/// DELETE /v1/projects/:project_id/tables/:table/rows/:row_id
/// ```
pub async fn delete_row(
    State(state): State<AppState>,
    Extension(project): Extension<Project>,
    Path((_, table, row_id)): Path<(Uuid, String, Uuid)>,
    auth: Option<Extension<AuthContext>>,
) -> ApiResult<Json<Value>> {
    let auth = auth.as_ref().map(|Extension(ctx)| ctx);
    require_write(&state.db, &project, auth).await?;

    let deleted = rows::delete_row(&state.db, &project, &table, row_id).await?;

    if !deleted {
        return Err(ApiError::NotFound("Row not found".to_string()));
    }

    Ok(Json(serde_json::json!({ "deleted": true })))
}

// Integration tests that exercise row CRUD through the router are in the
// tests/ directory.
