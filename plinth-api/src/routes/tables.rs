/// Table DDL endpoints for the data plane
///
/// Data-plane routes are nested under `/v1/projects/:project_id/...` and are
/// rate limited per project. The rate limiter resolves the project from the
/// path and stores it as a request extension, so handlers here extract
/// [`Project`] directly instead of repeating the lookup.
///
/// Access is capability-based: anonymous callers can read public projects,
/// the project's own API key can read and write, and members act according
/// to their role.
///
/// # Endpoints
///
/// - `POST /v1/projects/:project_id/tables` - Create a table
/// - `GET /v1/projects/:project_id/tables` - List tables
/// - `GET /v1/projects/:project_id/tables/:table` - Get one table
/// - `DELETE /v1/projects/:project_id/tables/:table` - Drop a table

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
        authorization::{require_read, require_write},
        middleware::AuthContext,
    },
    data::{tables, ColumnDef},
    models::project::Project,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Create table request
#[derive(Debug, Deserialize)]
pub struct CreateTableRequest {
    /// Table name (lowercase identifier, at most 63 characters)
    pub name: String,

    /// User-defined columns
    pub columns: Vec<ColumnDef>,
}

/// Table listing response
#[derive(Debug, Serialize)]
pub struct ListTablesResponse {
    pub tables: Vec<tables::TableInfo>,
}

/// Create table
///
/// # Endpoint
///
/// ```text
/// POST /v1/projects/:project_id/tables
/// ```
///
/// # Request Body
///
/// ```json
/// {
///   "name": "notes",
///   "columns": [
///     {"name": "title", "type": "text", "nullable": false},
///     {"name": "pinned", "type": "boolean"}
///   ]
/// }
/// ```
///
/// # Response
///
/// The created table with its full column list, including the surrogate
/// `id`, `created_at`, and `updated_at` columns.
pub async fn create_table(
    State(state): State<AppState>,
    Extension(project): Extension<Project>,
    auth: Option<Extension<AuthContext>>,
    Json(req): Json<CreateTableRequest>,
) -> ApiResult<Json<tables::TableInfo>> {
    let auth = auth.as_ref().map(|Extension(ctx)| ctx);
    require_write(&state.db, &project, auth).await?;

    let table = tables::create_table(&state.db, &project, &req.name, &req.columns).await?;

    tracing::info!(
        project_id = %project.id,
        table = %table.name,
        "Table created"
    );

    Ok(Json(table))
}

/// List tables
///
/// # Endpoint
///
/// ```text
/// GET /v1/projects/:project_id/tables
/// ```
///
/// # Response
///
/// All tables in the project with their columns, in name order.
pub async fn list_tables(
    State(state): State<AppState>,
    Extension(project): Extension<Project>,
    auth: Option<Extension<AuthContext>>,
) -> ApiResult<Json<ListTablesResponse>> {
    let auth = auth.as_ref().map(|Extension(ctx)| ctx);
    require_read(&state.db, &project, auth).await?;

    let tables = tables::list_tables(&state.db, &project).await?;

    Ok(Json(ListTablesResponse { tables }))
}

/// Get one table
///
/// # Endpoint
///
/// ```text
/// GET /v1/projects/:project_id/tables/:table
/// ```
pub async fn get_table(
    State(state): State<AppState>,
    Extension(project): Extension<Project>,
    Path((_, table)): Path<(Uuid, String)>,
    auth: Option<Extension<AuthContext>>,
) -> ApiResult<Json<tables::TableInfo>> {
    let auth = auth.as_ref().map(|Extension(ctx)| ctx);
    require_read(&state.db, &project, auth).await?;

    let table = tables::get_table(&state.db, &project, &table)
        .await?
        .ok_or_else(|| ApiError::NotFound("Table not found".to_string()))?;

    Ok(Json(table))
}

/// Drop a table
///
/// Removes the table and all its rows.
///
/// # Endpoint
///
/// ```text
/// DELETE /v1/projects/:project_id/tables/:table
/// ```
pub async fn drop_table(
    State(state): State<AppState>,
    Extension(project): Extension<Project>,
    Path((_, table)): Path<(Uuid, String)>,
    auth: Option<Extension<AuthContext>>,
) -> ApiResult<Json<serde_json::Value>> {
    let auth = auth.as_ref().map(|Extension(ctx)| ctx);
    require_write(&state.db, &project, auth).await?;

    let dropped = tables::drop_table(&state.db, &project, &table).await?;

    if !dropped {
        return Err(ApiError::NotFound("Table not found".to_string()));
    }

    tracing::info!(project_id = %project.id, table = %table, "Table dropped");

    Ok(Json(serde_json::json!({ "dropped": true })))
}

// Integration tests that exercise table DDL through the router are in the
// tests/ directory.
