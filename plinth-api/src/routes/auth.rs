/// Account endpoints: register, login, token refresh
///
/// Registration and login both end in the same place, a token pair for
/// the user, so they share one response shape and one issuance helper.
/// Login deliberately returns the same message for an unknown email and
/// a wrong password so the endpoint cannot be used to enumerate
/// accounts.
///
/// # Endpoints
///
/// - `POST /v1/auth/register`
/// - `POST /v1/auth/login`
/// - `POST /v1/auth/refresh`

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
};
use axum::{extract::State, Json};
use plinth_shared::{
    auth::{jwt, password},
    models::user::{CreateUser, User},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Checked against the strength rules beyond the length floor
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Token pair returned by both register and login
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user_id: String,

    /// Access token, 24 hours
    pub access_token: String,

    /// Refresh token, 30 days
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

/// Signs a fresh access/refresh pair for the user
fn issue_tokens(state: &AppState, user: &User) -> Result<AuthResponse, ApiError> {
    let secret = state.jwt_secret();

    let access_token =
        jwt::create_token(&jwt::Claims::new(user.id, jwt::TokenType::Access), secret)?;
    let refresh_token =
        jwt::create_token(&jwt::Claims::new(user.id, jwt::TokenType::Refresh), secret)?;

    Ok(AuthResponse {
        user_id: user.id.to_string(),
        access_token,
        refresh_token,
    })
}

/// Creates a user account and signs them in
///
/// ```text
/// POST /v1/auth/register
/// { "email": "user@example.com", "password": "SecureP@ss123", "name": "Ada" }
/// ```
///
/// Returns `400` when validation or the password strength rules fail,
/// `409` when the email is already registered. Projects are created
/// separately once the user is signed in.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Json<AuthResponse>> {
    req.validate()?;

    password::validate_password_strength(&req.password).map_err(|message| {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: "password".to_string(),
            message,
        }])
    })?;

    let password_hash = password::hash_password(&req.password)?;

    let user = User::create(
        &state.db,
        CreateUser {
            email: req.email,
            password_hash,
            name: req.name,
        },
    )
    .await?;

    Ok(Json(issue_tokens(&state, &user)?))
}

/// Verifies credentials and returns a token pair
///
/// ```text
/// POST /v1/auth/login
/// { "email": "user@example.com", "password": "SecureP@ss123" }
/// ```
///
/// Returns `401` with an identical message whether the email is unknown
/// or the password is wrong.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    req.validate()?;

    let rejected = || ApiError::Unauthenticated("Invalid email or password".to_string());

    let user = User::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(rejected)?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        return Err(rejected());
    }

    if !user.is_active {
        return Err(ApiError::Unauthenticated(
            "Account is deactivated".to_string(),
        ));
    }

    User::update_last_login(&state.db, user.id).await?;

    Ok(Json(issue_tokens(&state, &user)?))
}

/// Exchanges a refresh token for a new access token
///
/// ```text
/// POST /v1/auth/refresh
/// { "refresh_token": "eyJ..." }
/// ```
///
/// Returns `401` when the refresh token is invalid, expired, or is
/// actually an access token.
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let access_token = jwt::refresh_access_token(&req.refresh_token, state.jwt_secret())?;

    Ok(Json(RefreshResponse { access_token }))
}
