/// Control-plane session tokens
///
/// Plinth issues HS256-signed JWTs carrying only the user's identity.
/// Project access is never baked into a token; it is resolved from
/// memberships on every request, so a role change takes effect without
/// waiting for tokens to expire. Two token types exist: access (24h,
/// sent on every API call) and refresh (30d, exchanged for new access
/// tokens via [`refresh_access_token`]).
///
/// The signing secret should be at least 32 random bytes.
///
/// # Example
///
/// ```
/// use plinth_shared::auth::jwt::{create_token, validate_token, Claims, TokenType};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let user_id = Uuid::new_v4();
/// let secret = "at-least-32-bytes-of-real-entropy-here";
///
/// let token = create_token(&Claims::new(user_id, TokenType::Access), secret)?;
/// assert_eq!(validate_token(&token, secret)?.sub, user_id);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Issuer claim stamped into and required of every token
const ISSUER: &str = "plinth";

/// Error type for token operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Signing a new token failed
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Validation failed for a reason other than expiry or issuer
    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    /// The token's exp claim is in the past
    #[error("Token has expired")]
    Expired,

    /// The token is not structurally a JWT
    #[error("Invalid token format: {0}")]
    InvalidFormat(String),

    /// The iss claim does not match [`ISSUER`]
    #[error("Invalid issuer: expected {expected}, got {actual}")]
    InvalidIssuer { expected: String, actual: String },
}

/// Distinguishes access tokens from refresh tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    /// Lifetime used by [`Claims::new`]
    pub fn default_expiration(&self) -> Duration {
        match self {
            TokenType::Access => Duration::hours(24),
            TokenType::Refresh => Duration::days(30),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// Claims carried by every Plinth token
///
/// Standard claims (`sub`, `iss`, `iat`, `exp`, `nbf`) plus a custom
/// `token_type` so a refresh token can never be replayed as an access
/// token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,

    /// Always [`ISSUER`]
    pub iss: String,

    /// Issued at (Unix seconds)
    pub iat: i64,

    /// Expires at (Unix seconds)
    pub exp: i64,

    /// Not valid before (Unix seconds)
    pub nbf: i64,

    pub token_type: TokenType,
}

impl Claims {
    /// Claims with the token type's default lifetime
    pub fn new(user_id: Uuid, token_type: TokenType) -> Self {
        Self::with_expiration(user_id, token_type, token_type.default_expiration())
    }

    /// Claims with an explicit lifetime
    ///
    /// ```
    /// use plinth_shared::auth::jwt::{Claims, TokenType};
    /// use chrono::Duration;
    /// use uuid::Uuid;
    ///
    /// let short = Claims::with_expiration(Uuid::new_v4(), TokenType::Access, Duration::hours(1));
    /// ```
    pub fn with_expiration(user_id: Uuid, token_type: TokenType, expires_in: Duration) -> Self {
        let now = Utc::now().timestamp();

        Self {
            sub: user_id,
            iss: ISSUER.to_string(),
            iat: now,
            exp: (Utc::now() + expires_in).timestamp(),
            nbf: now,
            token_type,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// Remaining lifetime, or `None` once expired
    pub fn time_until_expiration(&self) -> Option<Duration> {
        let remaining = self.exp - Utc::now().timestamp();
        (remaining > 0).then(|| Duration::seconds(remaining))
    }
}

/// Signs claims into a compact JWT
///
/// The secret must match the one later given to [`validate_token`];
/// it should come from configuration, never be hardcoded, and be at
/// least 32 bytes for HS256.
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Verifies signature, expiry, nbf, and issuer, returning the claims
///
/// Expiry surfaces as [`JwtError::Expired`] and an issuer mismatch as
/// [`JwtError::InvalidIssuer`] so callers can map them to distinct API
/// errors; everything else folds into [`JwtError::ValidationError`].
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        jsonwebtoken::errors::ErrorKind::InvalidIssuer => JwtError::InvalidIssuer {
            expected: ISSUER.to_string(),
            actual: "unknown".to_string(),
        },
        _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
    })?;

    Ok(data.claims)
}

fn expect_type(claims: Claims, expected: TokenType) -> Result<Claims, JwtError> {
    if claims.token_type != expected {
        return Err(JwtError::ValidationError(format!(
            "Expected {} token, got {} token",
            expected.as_str(),
            claims.token_type.as_str()
        )));
    }
    Ok(claims)
}

/// [`validate_token`] plus a check that the token type is `Access`
pub fn validate_access_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    expect_type(validate_token(token, secret)?, TokenType::Access)
}

/// [`validate_token`] plus a check that the token type is `Refresh`
pub fn validate_refresh_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    expect_type(validate_token(token, secret)?, TokenType::Refresh)
}

/// Exchanges a valid refresh token for a fresh access token
///
/// The new token carries the same subject and a full default access
/// lifetime. An access token is rejected here, so a leaked short-lived
/// token cannot be used to mint more tokens.
pub fn refresh_access_token(refresh_token: &str, secret: &str) -> Result<String, JwtError> {
    let refresh_claims = validate_refresh_token(refresh_token, secret)?;
    create_token(&Claims::new(refresh_claims.sub, TokenType::Access), secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn token_of(token_type: TokenType) -> (Uuid, String) {
        let user_id = Uuid::new_v4();
        let token = create_token(&Claims::new(user_id, token_type), SECRET)
            .expect("Token creation should succeed");
        (user_id, token)
    }

    #[test]
    fn test_default_lifetimes() {
        assert_eq!(TokenType::Access.default_expiration(), Duration::hours(24));
        assert_eq!(TokenType::Refresh.default_expiration(), Duration::days(30));
    }

    #[test]
    fn test_new_claims_carry_issuer_and_subject() {
        let user_id = Uuid::new_v4();
        let claims = Claims::new(user_id, TokenType::Access);

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.iat, claims.nbf);
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_custom_expiration_bounds_remaining_time() {
        let claims = Claims::with_expiration(Uuid::new_v4(), TokenType::Access, Duration::hours(1));

        let left = claims.time_until_expiration().expect("Should not be expired");
        assert!(left.num_seconds() > 3500);
        assert!(left.num_seconds() <= 3600);
    }

    #[test]
    fn test_roundtrip_preserves_claims() {
        let (user_id, token) = token_of(TokenType::Access);

        let validated = validate_token(&token, SECRET).expect("Should validate");
        assert_eq!(validated.sub, user_id);
        assert_eq!(validated.iss, ISSUER);
        assert_eq!(validated.token_type, TokenType::Access);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let (_, token) = token_of(TokenType::Access);
        assert!(validate_token(&token, "a-different-secret-entirely").is_err());
    }

    #[test]
    fn test_garbage_token_rejected() {
        assert!(validate_token("not.a.jwt", SECRET).is_err());
        assert!(validate_token("", SECRET).is_err());
    }

    #[test]
    fn test_expired_token_reports_expired() {
        let claims =
            Claims::with_expiration(Uuid::new_v4(), TokenType::Access, Duration::seconds(-3600));

        assert!(claims.is_expired());
        assert!(claims.time_until_expiration().is_none());

        let token = create_token(&claims, SECRET).expect("Token creation should succeed");
        assert!(matches!(
            validate_token(&token, SECRET).unwrap_err(),
            JwtError::Expired
        ));
    }

    #[test]
    fn test_type_checks_reject_the_other_kind() {
        let (_, access) = token_of(TokenType::Access);
        let (_, refresh) = token_of(TokenType::Refresh);

        assert!(validate_access_token(&access, SECRET).is_ok());
        assert!(validate_access_token(&refresh, SECRET).is_err());
        assert!(validate_refresh_token(&refresh, SECRET).is_ok());
        assert!(validate_refresh_token(&access, SECRET).is_err());
    }

    #[test]
    fn test_refresh_mints_access_token_for_same_user() {
        let (user_id, refresh) = token_of(TokenType::Refresh);

        let new_access = refresh_access_token(&refresh, SECRET).expect("Refresh should succeed");
        let validated = validate_access_token(&new_access, SECRET).expect("Should validate");

        assert_eq!(validated.sub, user_id);
        assert_eq!(validated.token_type, TokenType::Access);
    }

    #[test]
    fn test_refresh_rejects_access_tokens() {
        let (_, access) = token_of(TokenType::Access);
        assert!(refresh_access_token(&access, SECRET).is_err());
    }
}
