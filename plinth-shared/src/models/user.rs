/// Control-plane user accounts
///
/// Users own projects and hold memberships; the account row itself
/// carries only identity and credentials. The email column is CITEXT,
/// so lookups are case-insensitive without lowercasing in application
/// code. Passwords arrive here already hashed; this module never sees
/// plaintext.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email CITEXT NOT NULL UNIQUE,
///     password_hash TEXT NOT NULL,
///     name VARCHAR(255),
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login_at TIMESTAMPTZ
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

const USER_COLUMNS: &str =
    "id, email, password_hash, name, is_active, created_at, updated_at, last_login_at";

/// A registered account
///
/// The password hash is excluded from serialization so the struct can
/// be embedded in API responses without leaking credentials.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,

    /// Unique, case-insensitive
    pub email: String,

    /// Argon2id PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub name: Option<String>,

    /// Deactivated accounts keep their rows but cannot sign in
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// `None` until the first login
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Input for registering an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub email: String,

    /// Already hashed, never plaintext
    pub password_hash: String,

    pub name: Option<String>,
}

impl User {
    /// Inserts a new account row
    ///
    /// A duplicate email surfaces as a unique-constraint violation.
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (email, password_hash, name)
             VALUES ($1, $2, $3)
             RETURNING {USER_COLUMNS}"
        );

        sqlx::query_as::<_, User>(&query)
            .bind(data.email)
            .bind(data.password_hash)
            .bind(data.name)
            .fetch_one(pool)
            .await
    }

    /// Looks up an account by email, case-insensitively
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");

        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// Stamps `last_login_at` after a successful authentication
    ///
    /// Returns whether a row was touched.
    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Removes an account row
    ///
    /// Fails while the user still owns projects; those must be deleted
    /// or transferred first. Returns whether a row was deleted.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_never_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            email: "ada@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            name: Some("Ada".to_string()),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_login_at: None,
        };

        let json = serde_json::to_string(&user).expect("Serialization should succeed");
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("argon2id"));
        assert!(json.contains("ada@example.com"));
    }

    #[test]
    fn test_column_list_matches_struct_fields() {
        for column in [
            "id",
            "email",
            "password_hash",
            "name",
            "is_active",
            "created_at",
            "updated_at",
            "last_login_at",
        ] {
            assert!(USER_COLUMNS.contains(column), "missing column {}", column);
        }
    }

    // Database-backed coverage lives in tests/data_tests.rs and the API
    // integration suite
}
