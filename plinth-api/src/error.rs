/// Error handling for the API server
///
/// This module provides a unified error type that maps to HTTP responses.
/// All handlers should return `Result<T, ApiError>` which automatically
/// converts to appropriate HTTP status codes.
///
/// Every response body carries a stable machine-readable `error` code
/// alongside the human-readable message, so clients can branch on codes
/// without parsing messages.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use plinth_shared::auth::authorization::AuthzError;
use plinth_shared::auth::jwt::JwtError;
use plinth_shared::auth::middleware::AuthError;
use plinth_shared::auth::password::PasswordError;
use plinth_shared::data::DataError;
use plinth_shared::models::membership::MembershipError;
use plinth_shared::models::project::ProjectError;
use plinth_shared::quota::QuotaError;
use plinth_shared::storage::StorageError;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Missing or invalid credentials (401 `unauthenticated`)
    Unauthenticated(String),

    /// Authenticated but lacking the required role (403 `insufficient_role`)
    InsufficientRole(String),

    /// Only the invited user may respond (403 `not_invitee`)
    NotInvitee,

    /// Resource does not exist or is not visible to the caller (404 `not_found`)
    NotFound(String),

    /// User already has a pending or accepted membership (409 `duplicate_membership`)
    DuplicateMembership,

    /// Operation not allowed in the current lifecycle state (409 `invalid_state`)
    InvalidState(String),

    /// Would leave the project without an accepted owner (409 `last_owner_protection`)
    LastOwnerProtection,

    /// Other uniqueness conflict, e.g. duplicate email (409 `conflict`)
    Conflict(String),

    /// Quota values rejected (400 `invalid_quota`)
    InvalidQuota(String),

    /// A per-project resource limit was hit (403 `quota_exceeded`)
    QuotaExceeded { current: i64, limit: i64 },

    /// Slug/key allocation gave up after bounded retries (500 `allocation_exhausted`)
    AllocationExhausted,

    /// Malformed request (400 `bad_request`)
    BadRequest(String),

    /// Field-level validation failures (400 `validation_error`)
    ValidationError(Vec<ValidationErrorDetail>),

    /// Too many requests (429 `rate_limit_exceeded`)
    RateLimitExceeded { retry_after: u64, message: String },

    /// Internal server error (500 `internal_error`)
    InternalError(String),

    /// Service unavailable (503 `service_unavailable`)
    ServiceUnavailable(String),
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable error code (e.g. "not_found", "insufficient_role")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Unauthenticated(msg) => write!(f, "Unauthenticated: {}", msg),
            ApiError::InsufficientRole(msg) => write!(f, "Insufficient role: {}", msg),
            ApiError::NotInvitee => write!(f, "Only the invited user can respond"),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::DuplicateMembership => write!(f, "Duplicate membership"),
            ApiError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            ApiError::LastOwnerProtection => {
                write!(f, "Project must keep at least one accepted owner")
            }
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::InvalidQuota(msg) => write!(f, "Invalid quota: {}", msg),
            ApiError::QuotaExceeded { current, limit } => {
                write!(f, "Quota exceeded ({}/{})", current, limit)
            }
            ApiError::AllocationExhausted => write!(f, "Identifier allocation exhausted"),
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::RateLimitExceeded { message, .. } => {
                write!(f, "Rate limit exceeded: {}", message)
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated(_) => "unauthenticated",
            ApiError::InsufficientRole(_) => "insufficient_role",
            ApiError::NotInvitee => "not_invitee",
            ApiError::NotFound(_) => "not_found",
            ApiError::DuplicateMembership => "duplicate_membership",
            ApiError::InvalidState(_) => "invalid_state",
            ApiError::LastOwnerProtection => "last_owner_protection",
            ApiError::Conflict(_) => "conflict",
            ApiError::InvalidQuota(_) => "invalid_quota",
            ApiError::QuotaExceeded { .. } => "quota_exceeded",
            ApiError::AllocationExhausted => "allocation_exhausted",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::ValidationError(_) => "validation_error",
            ApiError::RateLimitExceeded { .. } => "rate_limit_exceeded",
            ApiError::InternalError(_) => "internal_error",
            ApiError::ServiceUnavailable(_) => "service_unavailable",
        }
    }

    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::InsufficientRole(_) | ApiError::NotInvitee | ApiError::QuotaExceeded { .. } => {
                StatusCode::FORBIDDEN
            }
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::DuplicateMembership
            | ApiError::InvalidState(_)
            | ApiError::LastOwnerProtection
            | ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InvalidQuota(_) | ApiError::BadRequest(_) | ApiError::ValidationError(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::AllocationExhausted | ApiError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Rate limit responses carry a Retry-After header
        if let ApiError::RateLimitExceeded {
            retry_after,
            message,
        } = &self
        {
            let body = Json(ErrorResponse {
                error: self.code().to_string(),
                message: message.clone(),
                details: None,
            });

            let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
            if let Ok(value) = axum::http::HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert("Retry-After", value);
            }
            return response;
        }

        let status = self.status();
        let code = self.code();

        let (message, details) = match self {
            ApiError::ValidationError(errors) => {
                ("Request validation failed".to_string(), Some(errors))
            }
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                ("An internal error occurred".to_string(), None)
            }
            ApiError::AllocationExhausted => {
                tracing::error!("Identifier allocation exhausted");
                (
                    "Failed to allocate unique project identifiers".to_string(),
                    None,
                )
            }
            other => (other.to_string(), None),
        };

        let body = Json(ErrorResponse {
            error: code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

/// Convert sqlx errors to API errors
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                if let Some(constraint) = db_err.constraint() {
                    if constraint.contains("email") {
                        return ApiError::Conflict("Email already exists".to_string());
                    }
                    return ApiError::Conflict(format!("Constraint violation: {}", constraint));
                }

                ApiError::InternalError(format!("Database error: {}", db_err))
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

/// Convert validator failures into the structured validation response
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details: Vec<ValidationErrorDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                })
            })
            .collect();

        ApiError::ValidationError(details)
    }
}

/// Convert auth middleware errors to API errors
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials => {
                ApiError::Unauthenticated("Missing credentials".to_string())
            }
            AuthError::InvalidFormat(msg) => ApiError::BadRequest(msg),
            AuthError::InvalidToken(msg) => ApiError::Unauthenticated(msg),
            AuthError::InvalidApiKey(msg) => ApiError::Unauthenticated(msg),
            AuthError::DatabaseError(msg) => ApiError::InternalError(msg),
        }
    }
}

/// Convert authorization errors to API errors
///
/// Non-members get `not_found` rather than `insufficient_role`, so project
/// existence doesn't leak to outsiders.
impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Unauthenticated => {
                ApiError::Unauthenticated("Authentication required".to_string())
            }
            AuthzError::NotMember(_) => ApiError::NotFound("Project not found".to_string()),
            AuthzError::InsufficientRole { required, .. } => ApiError::InsufficientRole(format!(
                "Requires {} role or higher",
                required.as_str()
            )),
            AuthzError::NotAuthorized => {
                ApiError::InsufficientRole("Not authorized for this operation".to_string())
            }
            AuthzError::DatabaseError(err) => {
                ApiError::InternalError(format!("Database error: {}", err))
            }
        }
    }
}

/// Convert membership state-machine errors to API errors
impl From<MembershipError> for ApiError {
    fn from(err: MembershipError) -> Self {
        match err {
            MembershipError::NotFound => ApiError::NotFound("Membership not found".to_string()),
            MembershipError::DuplicateMembership => ApiError::DuplicateMembership,
            MembershipError::InvalidState(status) => ApiError::InvalidState(format!(
                "Operation not allowed while membership is {}",
                status.as_str()
            )),
            MembershipError::LastOwnerProtection => ApiError::LastOwnerProtection,
            MembershipError::NotInvitee => ApiError::NotInvitee,
            MembershipError::Database(err) => err.into(),
        }
    }
}

/// Convert project registry errors to API errors
impl From<ProjectError> for ApiError {
    fn from(err: ProjectError) -> Self {
        match err {
            ProjectError::AllocationExhausted => ApiError::AllocationExhausted,
            ProjectError::InvalidQuota(msg) => ApiError::InvalidQuota(msg),
            ProjectError::Database(err) => err.into(),
        }
    }
}

/// Convert data-plane errors to API errors
impl From<DataError> for ApiError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::InvalidIdentifier(name) => {
                ApiError::ValidationError(vec![ValidationErrorDetail {
                    field: name,
                    message: "Invalid identifier".to_string(),
                }])
            }
            DataError::ReservedColumn(name) => {
                ApiError::ValidationError(vec![ValidationErrorDetail {
                    field: name,
                    message: "Column name is reserved".to_string(),
                }])
            }
            DataError::DuplicateColumn(name) => {
                ApiError::ValidationError(vec![ValidationErrorDetail {
                    field: name,
                    message: "Duplicate column".to_string(),
                }])
            }
            DataError::UnknownColumn(name) => {
                ApiError::ValidationError(vec![ValidationErrorDetail {
                    field: name,
                    message: "Unknown column".to_string(),
                }])
            }
            DataError::NoColumns => {
                ApiError::BadRequest("Table definition must have at least one column".to_string())
            }
            DataError::InvalidValue { column, expected } => {
                ApiError::ValidationError(vec![ValidationErrorDetail {
                    field: column,
                    message: format!("Expected {}", expected),
                }])
            }
            DataError::TableExists(name) => {
                ApiError::Conflict(format!("Table already exists: {}", name))
            }
            DataError::TableNotFound(name) => ApiError::NotFound(format!("Table not found: {}", name)),
            DataError::QuotaExceeded { current, limit } => {
                ApiError::QuotaExceeded { current, limit }
            }
            DataError::ProjectNotReady => {
                ApiError::InvalidState("Project is not provisioned yet".to_string())
            }
            DataError::Database(err) => err.into(),
        }
    }
}

/// Convert quota errors to API errors
impl From<QuotaError> for ApiError {
    fn from(err: QuotaError) -> Self {
        match err {
            QuotaError::LimitExceeded { limit, current, .. } => {
                ApiError::QuotaExceeded { current, limit }
            }
            QuotaError::DatabaseError(err) => err.into(),
        }
    }
}

/// Convert storage errors to API errors
impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidKey(key) => {
                ApiError::ValidationError(vec![ValidationErrorDetail {
                    field: "key".to_string(),
                    message: format!("Invalid object key: {}", key),
                }])
            }
            StorageError::BucketNotFound(_) => {
                ApiError::InvalidState("Project storage is not provisioned yet".to_string())
            }
            StorageError::Backend(msg) => {
                ApiError::InternalError(format!("Storage backend error: {}", msg))
            }
        }
    }
}

/// Convert password errors to API errors
impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

/// Convert JWT errors to API errors
impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => ApiError::Unauthenticated("Token expired".to_string()),
            JwtError::InvalidIssuer { .. } => {
                ApiError::Unauthenticated("Invalid token issuer".to_string())
            }
            _ => ApiError::Unauthenticated(format!("Invalid token: {}", err)),
        }
    }
}
