/// Authentication and authorization utilities
///
/// This module provides secure authentication primitives for Plinth:
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and validation
/// - [`jwt`]: JWT token generation and validation
/// - [`api_key`]: Project API key generation and validation utilities
/// - [`middleware`]: Axum middleware extracting credentials into an AuthContext
/// - [`authorization`]: Capability resolution and role checks on projects
///
/// # Security Features
///
/// - **Password Hashing**: Argon2id with 64 MB memory, 3 iterations
/// - **JWT Tokens**: HS256 signing with configurable expiration
/// - **API Keys**: Secure random generation with SHA-256 hashing
/// - **Constant-time Comparison**: All verification uses constant-time operations
///
/// # Example
///
/// ```no_run
/// use plinth_shared::auth::password::{hash_password, verify_password};
/// use plinth_shared::auth::jwt::{create_token, Claims, TokenType};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// // Password authentication
/// let hash = hash_password("user_password")?;
/// assert!(verify_password("user_password", &hash)?);
///
/// // JWT token generation
/// let claims = Claims::new(uuid::Uuid::new_v4(), TokenType::Access);
/// let token = create_token(&claims, "secret-key")?;
/// # Ok(())
/// # }
/// ```

pub mod password;
pub mod jwt;
pub mod api_key;
pub mod middleware;
pub mod authorization;
