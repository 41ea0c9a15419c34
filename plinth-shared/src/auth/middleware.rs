/// Authentication middleware for Axum
///
/// This module provides middleware for JWT and API key authentication in Axum
/// applications. Middleware extracts credentials from requests, validates them,
/// and adds authentication context to request extensions.
///
/// # Middleware Types
///
/// - **JWT Middleware**: Validates Bearer tokens from the Authorization header
/// - **API Key Middleware**: Validates project API keys from the X-Api-Key header
/// - **Optional JWT Middleware**: Like JWT middleware, but lets unauthenticated
///   requests through without an `AuthContext`, so public projects can serve
///   anonymous reads
///
/// # Request Extensions
///
/// After successful authentication, middleware adds:
/// - `AuthContext`: Contains the authenticated user (JWT) or project (API key)
///   and the authentication method
///
/// # Example
///
/// ```no_run
/// use axum::{Router, routing::get, middleware, Extension};
/// use plinth_shared::auth::middleware::{create_jwt_middleware, AuthContext};
///
/// async fn protected_handler(Extension(auth): Extension<AuthContext>) -> String {
///     format!("Hello, {:?}!", auth.user_id)
/// }
///
/// let app: Router = Router::new()
///     .route("/protected", get(protected_handler))
///     .layer(middleware::from_fn(create_jwt_middleware("your-jwt-secret")));
/// ```

use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::jwt::{validate_access_token, JwtError};
use crate::models::project::Project;

/// Authentication method used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    /// JWT token authentication
    Jwt,

    /// Project API key authentication
    ApiKey,
}

/// Authentication context added to request extensions
///
/// This struct is added to the request after successful authentication.
/// Handlers can extract it using Axum's `Extension` extractor, or
/// `Option<Extension<AuthContext>>` on routes that also serve anonymous
/// callers.
///
/// JWT authentication identifies a user; which projects that user can touch
/// is resolved per request from memberships. API key authentication
/// identifies a single project and carries no user identity.
///
/// # Example
///
/// ```
/// use axum::Extension;
/// use plinth_shared::auth::middleware::AuthContext;
///
/// async fn handler(Extension(auth): Extension<AuthContext>) -> String {
///     format!("User: {:?}, Project: {:?}", auth.user_id, auth.project_id)
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    /// Authenticated user ID (None for API key auth)
    pub user_id: Option<Uuid>,

    /// Project the credential is bound to (None for JWT auth)
    pub project_id: Option<Uuid>,

    /// Authentication method used
    pub method: AuthMethod,
}

impl AuthContext {
    /// Creates auth context from JWT claims
    pub fn from_jwt(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            project_id: None,
            method: AuthMethod::Jwt,
        }
    }

    /// Creates auth context from a project API key lookup
    pub fn from_api_key(project: &Project) -> Self {
        Self {
            user_id: None,
            project_id: Some(project.id),
            method: AuthMethod::ApiKey,
        }
    }

    /// Returns true if this context is bound to the given project's key
    pub fn is_key_for_project(&self, project_id: Uuid) -> bool {
        self.method == AuthMethod::ApiKey && self.project_id == Some(project_id)
    }
}

/// Error type for authentication middleware
#[derive(Debug)]
pub enum AuthError {
    /// Missing authorization header
    MissingCredentials,

    /// Invalid authorization header format
    InvalidFormat(String),

    /// Token validation failed
    InvalidToken(String),

    /// API key validation failed
    InvalidApiKey(String),

    /// Database error
    DatabaseError(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::MissingCredentials => {
                (StatusCode::UNAUTHORIZED, "Missing credentials").into_response()
            }
            AuthError::InvalidFormat(msg) => {
                (StatusCode::BAD_REQUEST, msg).into_response()
            }
            AuthError::InvalidToken(msg) => {
                (StatusCode::UNAUTHORIZED, msg).into_response()
            }
            AuthError::InvalidApiKey(msg) => {
                (StatusCode::UNAUTHORIZED, msg).into_response()
            }
            AuthError::DatabaseError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

fn bearer_token(req: &Request) -> Result<Option<&str>, AuthError> {
    let Some(auth_header) = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    else {
        return Ok(None);
    };

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))?;

    Ok(Some(token))
}

fn validate_bearer(token: &str, secret: &str) -> Result<AuthContext, AuthError> {
    let claims = validate_access_token(token, secret).map_err(|e| match e {
        JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
        JwtError::InvalidIssuer { .. } => AuthError::InvalidToken("Invalid issuer".to_string()),
        _ => AuthError::InvalidToken(format!("Invalid token: {}", e)),
    })?;

    Ok(AuthContext::from_jwt(claims.sub))
}

/// JWT authentication middleware
///
/// Validates JWT tokens from the `Authorization: Bearer <token>` header.
///
/// # Arguments
///
/// * `secret` - JWT secret for validation
/// * `req` - Request
/// * `next` - Next middleware/handler
///
/// # Returns
///
/// Response with `AuthContext` extension added on success
///
/// # Errors
///
/// Returns 401 Unauthorized if:
/// - Authorization header is missing
/// - Token format is invalid
/// - Token validation fails
/// - Token has expired
///
/// # Example
///
/// ```no_run
/// use axum::{Router, routing::get, middleware};
/// use plinth_shared::auth::middleware::create_jwt_middleware;
///
/// async fn handler() -> &'static str {
///     "Protected route"
/// }
///
/// let app: Router = Router::new()
///     .route("/protected", get(handler))
///     .layer(middleware::from_fn(create_jwt_middleware("secret")));
/// ```
pub async fn jwt_auth_middleware(
    secret: String,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(&req)?.ok_or(AuthError::MissingCredentials)?;
    let auth_context = validate_bearer(token, &secret)?;

    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}

/// Optional JWT authentication middleware
///
/// Like [`jwt_auth_middleware`], but a missing Authorization header is not an
/// error: the request proceeds without an `AuthContext` extension. A header
/// that is present but invalid is still rejected, so expired tokens do not
/// silently degrade into anonymous access.
///
/// Use on routes where public projects serve anonymous reads. Handlers
/// extract `Option<Extension<AuthContext>>` and pass it to
/// `capabilities_of` to decide what the caller may do.
///
/// # Example
///
/// ```no_run
/// use axum::{Router, routing::get, middleware, Extension};
/// use plinth_shared::auth::middleware::{create_optional_jwt_middleware, AuthContext};
///
/// async fn handler(auth: Option<Extension<AuthContext>>) -> &'static str {
///     match auth {
///         Some(_) => "Authenticated",
///         None => "Anonymous",
///     }
/// }
///
/// let app: Router = Router::new()
///     .route("/public", get(handler))
///     .layer(middleware::from_fn(create_optional_jwt_middleware("secret")));
/// ```
pub async fn optional_jwt_auth_middleware(
    secret: String,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if let Some(token) = bearer_token(&req)? {
        let auth_context = validate_bearer(token, &secret)?;
        req.extensions_mut().insert(auth_context);
    }

    Ok(next.run(req).await)
}

/// API key authentication middleware
///
/// Validates project API keys from the `X-Api-Key` header.
/// Performs a database lookup against the stored key hash to resolve the
/// owning project.
///
/// # Arguments
///
/// * `pool` - Database connection pool
/// * `req` - Request
/// * `next` - Next middleware/handler
///
/// # Returns
///
/// Response with `AuthContext` extension added on success
///
/// # Errors
///
/// Returns 401 Unauthorized if:
/// - X-Api-Key header is missing
/// - API key format is invalid
/// - No project matches the key (including keys rotated away)
/// - Database error occurs
///
/// # Example
///
/// ```no_run
/// use axum::{Router, routing::get, middleware};
/// use plinth_shared::auth::middleware::create_api_key_middleware;
/// use sqlx::PgPool;
///
/// async fn handler() -> &'static str {
///     "Protected route"
/// }
///
/// async fn setup(pool: PgPool) -> Router {
///     Router::new()
///         .route("/api/rows", get(handler))
///         .layer(middleware::from_fn(create_api_key_middleware(pool)))
/// }
/// ```
pub async fn api_key_auth_middleware(
    pool: PgPool,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let api_key_header = req
        .headers()
        .get("X-Api-Key")
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    if !super::api_key::validate_api_key_format(api_key_header) {
        return Err(AuthError::InvalidFormat("Invalid API key format".to_string()));
    }

    // Keys rotated away no longer match any stored hash.
    let project = Project::find_by_api_key(&pool, api_key_header)
        .await
        .map_err(|e| AuthError::DatabaseError(format!("Database error: {}", e)))?
        .ok_or_else(|| AuthError::InvalidApiKey("Invalid API key".to_string()))?;

    if !super::api_key::verify_api_key(api_key_header, &project.api_key_hash) {
        return Err(AuthError::InvalidApiKey("Invalid API key".to_string()));
    }

    let auth_context = AuthContext::from_api_key(&project);
    req.extensions_mut().insert(project);
    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}

/// Combined data-plane authentication middleware
///
/// Data-plane routes accept either credential, or none at all for public
/// projects. Resolution order:
///
/// 1. `X-Api-Key` header, when present
/// 2. `Authorization: Bearer <token>`, when present
/// 3. Anonymous (no `AuthContext` extension)
///
/// A credential that is present but invalid is rejected rather than
/// degraded to anonymous.
pub async fn data_auth_middleware(
    pool: PgPool,
    secret: String,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if req.headers().contains_key("X-Api-Key") {
        return api_key_auth_middleware(pool, req, next).await;
    }

    optional_jwt_auth_middleware(secret, req, next).await
}

/// Creates a JWT authentication middleware closure
///
/// Helper function that captures the JWT secret and returns a middleware function.
///
/// # Example
///
/// ```no_run
/// use axum::{Router, routing::get, middleware};
/// use plinth_shared::auth::middleware::create_jwt_middleware;
///
/// let app: Router = Router::new()
///     .route("/protected", get(|| async { "OK" }))
///     .layer(middleware::from_fn(create_jwt_middleware("secret")));
/// ```
pub fn create_jwt_middleware(
    secret: impl Into<String>,
) -> impl Fn(Request, Next) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, AuthError>> + Send>> + Clone {
    let secret = secret.into();
    move |req, next| {
        let secret = secret.clone();
        Box::pin(jwt_auth_middleware(secret, req, next))
    }
}

/// Creates an optional JWT authentication middleware closure
///
/// # Example
///
/// ```no_run
/// use axum::{Router, routing::get, middleware};
/// use plinth_shared::auth::middleware::create_optional_jwt_middleware;
///
/// let app: Router = Router::new()
///     .route("/public", get(|| async { "OK" }))
///     .layer(middleware::from_fn(create_optional_jwt_middleware("secret")));
/// ```
pub fn create_optional_jwt_middleware(
    secret: impl Into<String>,
) -> impl Fn(Request, Next) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, AuthError>> + Send>> + Clone {
    let secret = secret.into();
    move |req, next| {
        let secret = secret.clone();
        Box::pin(optional_jwt_auth_middleware(secret, req, next))
    }
}

/// Creates an API key authentication middleware closure
///
/// Helper function that captures the database pool and returns a middleware function.
///
/// # Example
///
/// ```no_run
/// use axum::{Router, routing::get, middleware};
/// use plinth_shared::auth::middleware::create_api_key_middleware;
/// use sqlx::PgPool;
///
/// async fn setup(pool: PgPool) -> Router {
///     Router::new()
///         .route("/api/rows", get(|| async { "OK" }))
///         .layer(middleware::from_fn(create_api_key_middleware(pool)))
/// }
/// ```
pub fn create_api_key_middleware(
    pool: PgPool,
) -> impl Fn(Request, Next) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, AuthError>> + Send>> + Clone {
    move |req, next| {
        let pool = pool.clone();
        Box::pin(api_key_auth_middleware(pool, req, next))
    }
}

/// Creates a combined data-plane authentication middleware closure
///
/// # Example
///
/// ```no_run
/// use axum::{Router, routing::get, middleware};
/// use plinth_shared::auth::middleware::create_data_auth_middleware;
/// use sqlx::PgPool;
///
/// async fn setup(pool: PgPool) -> Router {
///     Router::new()
///         .route("/api/rows", get(|| async { "OK" }))
///         .layer(middleware::from_fn(create_data_auth_middleware(pool, "secret")))
/// }
/// ```
pub fn create_data_auth_middleware(
    pool: PgPool,
    secret: impl Into<String>,
) -> impl Fn(Request, Next) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, AuthError>> + Send>> + Clone {
    let secret = secret.into();
    move |req, next| {
        let pool = pool.clone();
        let secret = secret.clone();
        Box::pin(data_auth_middleware(pool, secret, req, next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_context_from_jwt() {
        let user_id = Uuid::new_v4();

        let context = AuthContext::from_jwt(user_id);

        assert_eq!(context.user_id, Some(user_id));
        assert!(context.project_id.is_none());
        assert_eq!(context.method, AuthMethod::Jwt);
    }

    #[test]
    fn test_is_key_for_project() {
        let project_id = Uuid::new_v4();
        let context = AuthContext {
            user_id: None,
            project_id: Some(project_id),
            method: AuthMethod::ApiKey,
        };

        assert!(context.is_key_for_project(project_id));
        assert!(!context.is_key_for_project(Uuid::new_v4()));

        // JWT contexts are never key-bound
        let jwt_context = AuthContext::from_jwt(Uuid::new_v4());
        assert!(!jwt_context.is_key_for_project(project_id));
    }

    #[test]
    fn test_auth_error_into_response() {
        let err = AuthError::MissingCredentials;
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let err = AuthError::InvalidFormat("test".to_string());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let err = AuthError::DatabaseError("test".to_string());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
