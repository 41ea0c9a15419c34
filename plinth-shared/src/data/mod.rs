/// Per-project data operations
///
/// This module implements the generic data plane: user-defined tables and
/// rows inside each project's PostgreSQL schema. Every project gets its own
/// schema (`project_<slug>`), so tenant data never shares a namespace.
///
/// # Identifier Safety
///
/// Schema, table, and column names are interpolated into SQL, so all of them
/// are validated against `[a-z_][a-z0-9_]*` (max 63 chars) before any query
/// is built. Values never touch the SQL text; they always go through bind
/// parameters.
///
/// # Modules
///
/// - `tables`: DDL operations (create, list, drop) on project tables
/// - `rows`: row CRUD with JSON payloads typed by the table's columns
///
/// # Example
///
/// ```no_run
/// use plinth_shared::data::{tables, ColumnDef, ColumnType};
/// use plinth_shared::models::project::Project;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool, project: Project) -> Result<(), Box<dyn std::error::Error>> {
/// let columns = vec![
///     ColumnDef {
///         name: "title".to_string(),
///         column_type: ColumnType::Text,
///         nullable: false,
///         unique: false,
///     },
///     ColumnDef {
///         name: "count".to_string(),
///         column_type: ColumnType::Bigint,
///         nullable: true,
///         unique: false,
///     },
/// ];
///
/// let table = tables::create_table(&pool, &project, "notes", &columns).await?;
/// assert_eq!(table.name, "notes");
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::project::{Project, ProvisioningStatus};

pub mod rows;
pub mod tables;

pub use rows::{delete_row, get_row, insert_row, list_rows, update_row};
pub use tables::{create_table, drop_table, get_table, list_tables, ColumnInfo, TableInfo};

/// Maximum length of a PostgreSQL identifier
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Column names managed by Plinth on every project table
pub const RESERVED_COLUMNS: [&str; 3] = ["id", "created_at", "updated_at"];

/// Error type for data-plane operations
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    /// Identifier failed validation
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Column name is managed by Plinth and cannot be user-defined
    #[error("Column name is reserved: {0}")]
    ReservedColumn(String),

    /// Column name appears more than once in a table definition
    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    /// Payload references a column the table does not have
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// Table definition has no columns
    #[error("Table definition must have at least one column")]
    NoColumns,

    /// Table already exists in the project schema
    #[error("Table already exists: {0}")]
    TableExists(String),

    /// Table does not exist in the project schema
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Value does not match the column's type
    #[error("Invalid value for column {column}: expected {expected}")]
    InvalidValue {
        column: String,
        expected: &'static str,
    },

    /// Row insert would exceed the project's max_items quota
    #[error("Row quota exceeded ({current}/{limit})")]
    QuotaExceeded { current: i64, limit: i64 },

    /// Project provisioning has not completed
    #[error("Project is not provisioned yet")]
    ProjectNotReady,

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Column types allowed in user-defined tables
///
/// A fixed set keeps the DDL surface predictable and maps one-to-one onto
/// PostgreSQL types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Integer,
    Bigint,
    Double,
    Boolean,
    Timestamptz,
    Jsonb,
    Uuid,
}

impl ColumnType {
    /// PostgreSQL type name used in DDL
    pub fn as_sql(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Bigint => "BIGINT",
            ColumnType::Double => "DOUBLE PRECISION",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Timestamptz => "TIMESTAMPTZ",
            ColumnType::Jsonb => "JSONB",
            ColumnType::Uuid => "UUID",
        }
    }

    /// Parses a column type from its wire name
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "text" => Some(ColumnType::Text),
            "integer" => Some(ColumnType::Integer),
            "bigint" => Some(ColumnType::Bigint),
            "double" => Some(ColumnType::Double),
            "boolean" => Some(ColumnType::Boolean),
            "timestamptz" => Some(ColumnType::Timestamptz),
            "jsonb" => Some(ColumnType::Jsonb),
            "uuid" => Some(ColumnType::Uuid),
            _ => None,
        }
    }
}

/// A user-supplied column definition for table creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name, validated as an identifier
    pub name: String,

    /// Column type from the allowed set
    #[serde(rename = "type")]
    pub column_type: ColumnType,

    /// Whether NULL values are allowed
    #[serde(default = "default_nullable")]
    pub nullable: bool,

    /// Whether a UNIQUE constraint is added
    #[serde(default)]
    pub unique: bool,
}

fn default_nullable() -> bool {
    true
}

impl ColumnDef {
    /// Builds the SQL fragment for this column
    ///
    /// The name must already be validated by the caller.
    pub fn sql_definition(&self) -> String {
        let mut parts = vec![format!("\"{}\"", self.name), self.column_type.as_sql().to_string()];

        if !self.nullable {
            parts.push("NOT NULL".to_string());
        }

        if self.unique {
            parts.push("UNIQUE".to_string());
        }

        parts.join(" ")
    }
}

/// Validates a dynamic SQL identifier
///
/// Accepts `[a-z_][a-z0-9_]*` up to 63 characters. Everything else is
/// rejected before the name gets near a query.
///
/// # Example
///
/// ```
/// use plinth_shared::data::validate_identifier;
///
/// assert!(validate_identifier("my_table").is_ok());
/// assert!(validate_identifier("2fast").is_err());
/// assert!(validate_identifier("drop table").is_err());
/// assert!(validate_identifier("").is_err());
/// ```
pub fn validate_identifier(name: &str) -> Result<(), DataError> {
    if name.is_empty() || name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(DataError::InvalidIdentifier(name.to_string()));
    }

    let mut chars = name.chars();
    let first_ok = matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_lowercase());
    let rest_ok = chars.all(|c| c == '_' || c.is_ascii_lowercase() || c.is_ascii_digit());

    if !first_ok || !rest_ok {
        return Err(DataError::InvalidIdentifier(name.to_string()));
    }

    Ok(())
}

/// Checks that a project's schema is ready for data operations
pub fn ensure_provisioned(project: &Project) -> Result<(), DataError> {
    if project.provisioning_status != ProvisioningStatus::Completed {
        return Err(DataError::ProjectNotReady);
    }

    Ok(())
}

/// Validates a row ID parameter
///
/// Row IDs are surrogate UUIDs, so parsing doubles as validation.
pub fn parse_row_id(id: &str) -> Result<Uuid, DataError> {
    Uuid::parse_str(id).map_err(|_| DataError::InvalidIdentifier(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier_accepts_valid_names() {
        assert!(validate_identifier("users").is_ok());
        assert!(validate_identifier("_private").is_ok());
        assert!(validate_identifier("table_2").is_ok());
        assert!(validate_identifier("a").is_ok());
    }

    #[test]
    fn test_validate_identifier_rejects_invalid_names() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("2fast").is_err());
        assert!(validate_identifier("MyTable").is_err());
        assert!(validate_identifier("has space").is_err());
        assert!(validate_identifier("semi;colon").is_err());
        assert!(validate_identifier("quo\"te").is_err());
        assert!(validate_identifier("dash-ed").is_err());
    }

    #[test]
    fn test_validate_identifier_rejects_overlong_names() {
        let name = "a".repeat(64);
        assert!(validate_identifier(&name).is_err());

        let name = "a".repeat(63);
        assert!(validate_identifier(&name).is_ok());
    }

    #[test]
    fn test_column_type_sql_mapping() {
        assert_eq!(ColumnType::Text.as_sql(), "TEXT");
        assert_eq!(ColumnType::Integer.as_sql(), "INTEGER");
        assert_eq!(ColumnType::Bigint.as_sql(), "BIGINT");
        assert_eq!(ColumnType::Double.as_sql(), "DOUBLE PRECISION");
        assert_eq!(ColumnType::Boolean.as_sql(), "BOOLEAN");
        assert_eq!(ColumnType::Timestamptz.as_sql(), "TIMESTAMPTZ");
        assert_eq!(ColumnType::Jsonb.as_sql(), "JSONB");
        assert_eq!(ColumnType::Uuid.as_sql(), "UUID");
    }

    #[test]
    fn test_column_type_from_str() {
        assert_eq!(ColumnType::from_str("text"), Some(ColumnType::Text));
        assert_eq!(ColumnType::from_str("double"), Some(ColumnType::Double));
        assert_eq!(ColumnType::from_str("varchar"), None);
        assert_eq!(ColumnType::from_str("TEXT"), None);
    }

    #[test]
    fn test_column_def_sql_definition() {
        let col = ColumnDef {
            name: "title".to_string(),
            column_type: ColumnType::Text,
            nullable: false,
            unique: true,
        };
        assert_eq!(col.sql_definition(), "\"title\" TEXT NOT NULL UNIQUE");

        let col = ColumnDef {
            name: "count".to_string(),
            column_type: ColumnType::Bigint,
            nullable: true,
            unique: false,
        };
        assert_eq!(col.sql_definition(), "\"count\" BIGINT");
    }

    #[test]
    fn test_reserved_columns() {
        assert!(RESERVED_COLUMNS.contains(&"id"));
        assert!(RESERVED_COLUMNS.contains(&"created_at"));
        assert!(RESERVED_COLUMNS.contains(&"updated_at"));
    }

    #[test]
    fn test_parse_row_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_row_id(&id.to_string()).ok(), Some(id));
        assert!(parse_row_id("not-a-uuid").is_err());
    }
}
