/// Health check endpoint
///
/// Reports whether the API can reach its two backends: PostgreSQL and the
/// object store. The endpoint is unauthenticated so load balancers and
/// uptime probes can hit it directly.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "checks": {
///     "database": "ok",
///     "storage": "ok"
///   }
/// }
/// ```

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub checks: HealthChecks,
}

/// Per-backend probe results
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub database: &'static str,
    pub storage: &'static str,
}

/// Probes the database and object store and reports overall status
///
/// Returns `"healthy"` only when both backends respond; otherwise
/// `"degraded"` with the failing check marked. The response is always
/// 200 so probes distinguish "unhealthy" from "unreachable".
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let database = match sqlx::query("SELECT 1").fetch_one(&state.db).await {
        Ok(_) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "Health check: database unreachable");
            "unreachable"
        }
    };

    // A bucket lookup exercises credentials and connectivity without
    // touching project data
    let storage = match state.storage.bucket_exists("plinth-healthcheck").await {
        Ok(_) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "Health check: object store unreachable");
            "unreachable"
        }
    };

    let status = if database == "ok" && storage == "ok" {
        "healthy"
    } else {
        "degraded"
    };

    Ok(Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        checks: HealthChecks { database, storage },
    }))
}
