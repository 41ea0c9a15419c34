/// DDL operations on project tables
///
/// Tables live in the project's own schema. Every table gets a surrogate
/// `id UUID PRIMARY KEY DEFAULT gen_random_uuid()` plus `created_at` and
/// `updated_at` timestamps; user-defined columns come from the fixed
/// [`ColumnType`](super::ColumnType) set.
///
/// # Example
///
/// ```no_run
/// use plinth_shared::data::{tables, ColumnDef, ColumnType};
/// use plinth_shared::models::project::Project;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool, project: Project) -> Result<(), Box<dyn std::error::Error>> {
/// let columns = vec![ColumnDef {
///     name: "title".to_string(),
///     column_type: ColumnType::Text,
///     nullable: false,
///     unique: false,
/// }];
///
/// tables::create_table(&pool, &project, "notes", &columns).await?;
///
/// let all = tables::list_tables(&pool, &project).await?;
/// assert!(all.iter().any(|t| t.name == "notes"));
///
/// tables::drop_table(&pool, &project, "notes").await?;
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashSet;

use super::{ensure_provisioned, validate_identifier, ColumnDef, DataError, RESERVED_COLUMNS};
use crate::models::project::Project;

/// A column as reported by the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name
    pub name: String,

    /// PostgreSQL data type (e.g. "text", "bigint", "timestamp with time zone")
    pub data_type: String,

    /// Whether NULL values are allowed
    pub nullable: bool,
}

/// A table with its columns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableInfo {
    /// Table name
    pub name: String,

    /// Columns in ordinal position order
    pub columns: Vec<ColumnInfo>,
}

/// Validates a set of user-supplied column definitions
fn validate_columns(columns: &[ColumnDef]) -> Result<(), DataError> {
    if columns.is_empty() {
        return Err(DataError::NoColumns);
    }

    let mut seen = HashSet::new();
    for col in columns {
        validate_identifier(&col.name)?;

        if RESERVED_COLUMNS.contains(&col.name.as_str()) {
            return Err(DataError::ReservedColumn(col.name.clone()));
        }

        if !seen.insert(col.name.as_str()) {
            return Err(DataError::DuplicateColumn(col.name.clone()));
        }
    }

    Ok(())
}

/// Builds the CREATE TABLE statement for a project table
///
/// Identifiers must already be validated by the caller.
fn build_create_table_sql(schema: &str, table: &str, columns: &[ColumnDef]) -> String {
    let mut definitions = vec!["id UUID PRIMARY KEY DEFAULT gen_random_uuid()".to_string()];

    for col in columns {
        definitions.push(col.sql_definition());
    }

    definitions.push("created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()".to_string());
    definitions.push("updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()".to_string());

    format!(
        "CREATE TABLE \"{}\".\"{}\" ({})",
        schema,
        table,
        definitions.join(", ")
    )
}

/// Creates a project schema if it does not already exist
///
/// Used by the provisioning worker; table DDL refuses to run until the
/// project's provisioning status is `completed`.
pub async fn create_schema(pool: &PgPool, schema: &str) -> Result<(), DataError> {
    validate_identifier(schema)?;

    let sql = format!("CREATE SCHEMA IF NOT EXISTS \"{}\"", schema);

    tracing::info!(schema = schema, "Creating project schema");

    sqlx::query(&sql).execute(pool).await?;

    Ok(())
}

/// Drops a project schema and everything in it
///
/// Part of project deletion; all project tables go with the schema.
pub async fn drop_schema(pool: &PgPool, schema: &str) -> Result<(), DataError> {
    validate_identifier(schema)?;

    let sql = format!("DROP SCHEMA IF EXISTS \"{}\" CASCADE", schema);

    tracing::info!(schema = schema, "Dropping project schema");

    sqlx::query(&sql).execute(pool).await?;

    Ok(())
}

/// Checks whether a table exists in a schema
pub async fn table_exists(pool: &PgPool, schema: &str, table: &str) -> Result<bool, sqlx::Error> {
    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT FROM information_schema.tables
            WHERE table_schema = $1 AND table_name = $2
        )
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

/// Fetches column metadata for a table
///
/// Returns an empty vector if the table does not exist.
pub async fn get_columns(
    pool: &PgPool,
    schema: &str,
    table: &str,
) -> Result<Vec<ColumnInfo>, sqlx::Error> {
    let rows: Vec<(String, String, String)> = sqlx::query_as(
        r#"
        SELECT column_name, data_type, is_nullable
        FROM information_schema.columns
        WHERE table_schema = $1 AND table_name = $2
        ORDER BY ordinal_position
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(name, data_type, is_nullable)| ColumnInfo {
            name,
            data_type,
            nullable: is_nullable == "YES",
        })
        .collect())
}

/// Creates a table in the project's schema
///
/// # Arguments
///
/// * `pool` - Database connection pool
/// * `project` - Project owning the schema (must be provisioned)
/// * `table` - Table name
/// * `columns` - User-defined columns
///
/// # Returns
///
/// The created table with its full column list, surrogate columns included
///
/// # Errors
///
/// Returns an error if:
/// - The project is not provisioned
/// - The table or a column name fails identifier validation
/// - A column name is reserved or duplicated
/// - The table already exists
///
/// # Example
///
/// ```no_run
/// # use plinth_shared::data::{tables, ColumnDef, ColumnType};
/// # use plinth_shared::models::project::Project;
/// # use sqlx::PgPool;
/// # async fn example(pool: PgPool, project: Project) -> Result<(), Box<dyn std::error::Error>> {
/// let columns = vec![ColumnDef {
///     name: "body".to_string(),
///     column_type: ColumnType::Text,
///     nullable: true,
///     unique: false,
/// }];
/// let table = tables::create_table(&pool, &project, "posts", &columns).await?;
/// assert_eq!(table.columns.first().map(|c| c.name.as_str()), Some("id"));
/// # Ok(())
/// # }
/// ```
pub async fn create_table(
    pool: &PgPool,
    project: &Project,
    table: &str,
    columns: &[ColumnDef],
) -> Result<TableInfo, DataError> {
    ensure_provisioned(project)?;
    validate_identifier(table)?;
    validate_columns(columns)?;

    if table_exists(pool, &project.schema_name, table).await? {
        return Err(DataError::TableExists(table.to_string()));
    }

    let sql = build_create_table_sql(&project.schema_name, table, columns);

    tracing::info!(
        project_id = %project.id,
        table = table,
        columns = columns.len(),
        "Creating project table"
    );

    sqlx::query(&sql).execute(pool).await?;

    let columns = get_columns(pool, &project.schema_name, table).await?;

    Ok(TableInfo {
        name: table.to_string(),
        columns,
    })
}

/// Lists all tables in the project's schema
///
/// # Returns
///
/// Tables with their columns, in name order
pub async fn list_tables(pool: &PgPool, project: &Project) -> Result<Vec<TableInfo>, DataError> {
    ensure_provisioned(project)?;

    let rows: Vec<(String, String, String, String)> = sqlx::query_as(
        r#"
        SELECT c.table_name, c.column_name, c.data_type, c.is_nullable
        FROM information_schema.columns c
        JOIN information_schema.tables t
          ON t.table_schema = c.table_schema AND t.table_name = c.table_name
        WHERE c.table_schema = $1 AND t.table_type = 'BASE TABLE'
        ORDER BY c.table_name, c.ordinal_position
        "#,
    )
    .bind(&project.schema_name)
    .fetch_all(pool)
    .await?;

    let mut tables: Vec<TableInfo> = Vec::new();
    for (table_name, column_name, data_type, is_nullable) in rows {
        let column = ColumnInfo {
            name: column_name,
            data_type,
            nullable: is_nullable == "YES",
        };

        match tables.last_mut() {
            Some(last) if last.name == table_name => last.columns.push(column),
            _ => tables.push(TableInfo {
                name: table_name,
                columns: vec![column],
            }),
        }
    }

    Ok(tables)
}

/// Fetches a single table with its columns
///
/// # Returns
///
/// The table, or None if it does not exist
pub async fn get_table(
    pool: &PgPool,
    project: &Project,
    table: &str,
) -> Result<Option<TableInfo>, DataError> {
    ensure_provisioned(project)?;
    validate_identifier(table)?;

    let columns = get_columns(pool, &project.schema_name, table).await?;

    if columns.is_empty() {
        return Ok(None);
    }

    Ok(Some(TableInfo {
        name: table.to_string(),
        columns,
    }))
}

/// Drops a table from the project's schema
///
/// # Returns
///
/// `true` if the table existed and was dropped, `false` if it did not exist
pub async fn drop_table(pool: &PgPool, project: &Project, table: &str) -> Result<bool, DataError> {
    ensure_provisioned(project)?;
    validate_identifier(table)?;

    if !table_exists(pool, &project.schema_name, table).await? {
        return Ok(false);
    }

    let sql = format!("DROP TABLE \"{}\".\"{}\"", project.schema_name, table);

    tracing::info!(project_id = %project.id, table = table, "Dropping project table");

    sqlx::query(&sql).execute(pool).await?;

    Ok(true)
}


// Integration tests that exercise DDL against a real schema are in the
// tests/ directory.
