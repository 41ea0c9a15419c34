/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use plinth_api::{app::AppState, config::Config};
/// use plinth_shared::storage::ObjectStore;
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let storage = ObjectStore::connect(&config.storage).await;
/// let state = AppState::new(pool, config, storage);
/// let app = plinth_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    middleware::{rate_limit::RateLimiterStore, security::SecurityHeadersLayer},
};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use plinth_shared::{
    auth::middleware::{create_data_auth_middleware, create_jwt_middleware},
    notify::WebhookNotifier,
    storage::ObjectStore,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Per-project token buckets for the data plane
    pub rate_limiter: RateLimiterStore,

    /// Object storage backend
    pub storage: ObjectStore,

    /// Webhook delivery for project events
    pub notifier: WebhookNotifier,
}

impl AppState {
    /// Creates new application state
    pub fn new(db: PgPool, config: Config, storage: ObjectStore) -> Self {
        let notifier = WebhookNotifier::new(config.webhook_signing_secret.clone());

        Self {
            db,
            config: Arc::new(config),
            rate_limiter: RateLimiterStore::new(),
            storage,
            notifier,
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// The router is organized as follows:
/// ```text
/// /
/// ├── /health                              # Health check (public)
/// ├── /v1/                                 # API v1 (versioned)
/// │   ├── /auth/                           # Authentication (public)
/// │   │   ├── POST /register
/// │   │   ├── POST /login
/// │   │   └── POST /refresh
/// │   ├── /projects/                       # Control plane (JWT required)
/// │   │   ├── POST   /                     # Create project
/// │   │   ├── GET    /                     # List the caller's projects
/// │   │   ├── GET    /:project_id
/// │   │   ├── PATCH  /:project_id
/// │   │   ├── DELETE /:project_id
/// │   │   ├── POST   /:project_id/rotate-key
/// │   │   ├── POST   /:project_id/members
/// │   │   ├── GET    /:project_id/members
/// │   │   ├── DELETE /:project_id/members/:membership_id
/// │   │   └── PATCH  /:project_id/members/:membership_id
/// │   ├── /projects/:project_id/           # Data plane (JWT, API key, or
/// │   │   │                                # anonymous; rate limited)
/// │   │   ├── /tables                      # Table DDL
/// │   │   ├── /tables/:table/rows          # Row CRUD
/// │   │   └── /files/*key                  # Object storage
/// │   └── /invitations/                    # Invitation responses (JWT)
/// │       ├── GET  /
/// │       ├── POST /:membership_id/accept
/// │       └── POST /:membership_id/reject
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Logging (tower-http TraceLayer)
/// 2. CORS (tower-http CorsLayer)
/// 3. Security headers
/// 4. Authentication and rate limiting (per-subtree)
///
/// On the data plane, authentication runs before the rate limiter so the
/// limiter can store the path-resolved project for handlers.
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    // Health check (public, no auth)
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Auth routes (public, no auth required)
    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh));

    // Control plane: project registry and membership (JWT required)
    let project_routes = Router::new()
        .route(
            "/",
            post(routes::projects::create_project).get(routes::projects::list_projects),
        )
        .route(
            "/:project_id",
            get(routes::projects::get_project)
                .patch(routes::projects::update_project)
                .delete(routes::projects::delete_project),
        )
        .route(
            "/:project_id/rotate-key",
            post(routes::projects::rotate_api_key),
        )
        .route(
            "/:project_id/members",
            post(routes::members::invite_member).get(routes::members::list_members),
        )
        .route(
            "/:project_id/members/:membership_id",
            axum::routing::delete(routes::members::revoke_member)
                .patch(routes::members::change_member_role),
        )
        .layer(axum::middleware::from_fn(create_jwt_middleware(
            state.jwt_secret().to_string(),
        )));

    // Invitation responses (JWT required)
    let invitation_routes = Router::new()
        .route("/", get(routes::members::list_invitations))
        .route(
            "/:membership_id/accept",
            post(routes::members::accept_invitation),
        )
        .route(
            "/:membership_id/reject",
            post(routes::members::reject_invitation),
        )
        .layer(axum::middleware::from_fn(create_jwt_middleware(
            state.jwt_secret().to_string(),
        )));

    // Data plane: tables, rows, and files (JWT, API key, or anonymous).
    // Rate limited per project; the limiter stores the resolved project as
    // a request extension.
    let data_routes = Router::new()
        .route(
            "/:project_id/tables",
            post(routes::tables::create_table).get(routes::tables::list_tables),
        )
        .route(
            "/:project_id/tables/:table",
            get(routes::tables::get_table).delete(routes::tables::drop_table),
        )
        .route(
            "/:project_id/tables/:table/rows",
            post(routes::records::insert_row).get(routes::records::list_rows),
        )
        .route(
            "/:project_id/tables/:table/rows/:row_id",
            get(routes::records::get_row)
                .patch(routes::records::update_row)
                .delete(routes::records::delete_row),
        )
        .route("/:project_id/files", get(routes::files::list_files))
        .route(
            "/:project_id/files/*key",
            put(routes::files::upload_file)
                .get(routes::files::download_file)
                .delete(routes::files::delete_file),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::rate_limit::rate_limit_layer,
        ))
        .layer(axum::middleware::from_fn(create_data_auth_middleware(
            state.db.clone(),
            state.jwt_secret().to_string(),
        )));

    // Build complete v1 API
    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/projects", project_routes.merge(data_routes))
        .nest("/invitations", invitation_routes);

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.contains(&"*".to_string()) {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        // Production mode: configure allowed origins
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([
                header::AUTHORIZATION,
                header::CONTENT_TYPE,
                header::HeaderName::from_static("x-api-key"),
            ])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    // Combine all routes with middleware stack
    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}
