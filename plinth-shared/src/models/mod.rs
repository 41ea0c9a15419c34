/// Database models for Plinth
///
/// This module contains all control-plane models and their CRUD operations.
/// Per-project data lives in project schemas and is handled by the `data`
/// module, not by models here.
///
/// # Models
///
/// - `user`: Registered accounts for the control plane
/// - `project`: Tenant data spaces with quotas and provisioning state
/// - `membership`: User-project roles and the invitation lifecycle
///
/// # Example
///
/// ```no_run
/// use plinth_shared::models::user::{User, CreateUser};
/// use plinth_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let new_user = CreateUser {
///     email: "user@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     name: Some("Ada".to_string()),
/// };
///
/// let user = User::create(&pool, new_user).await?;
/// # Ok(())
/// # }
/// ```

pub mod membership;
pub mod project;
pub mod user;
