/// Row CRUD on project tables
///
/// Rows travel as JSON objects. Each value is bound as the PostgreSQL type
/// of its column (looked up from the catalog), so payloads never reach the
/// SQL text. Results come back as JSON via `row_to_json`, which keeps the
/// read path independent of the table's shape.
///
/// # Example
///
/// ```no_run
/// use plinth_shared::data::rows;
/// use plinth_shared::models::project::Project;
/// use serde_json::{json, Map};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool, project: Project) -> Result<(), Box<dyn std::error::Error>> {
/// let mut values = Map::new();
/// values.insert("title".to_string(), json!("hello"));
///
/// let row = rows::insert_row(&pool, &project, "notes", &values).await?;
/// let id = row["id"].as_str().unwrap().parse()?;
///
/// let fetched = rows::get_row(&pool, &project, "notes", id).await?;
/// assert!(fetched.is_some());
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::postgres::PgArguments;
use sqlx::PgPool;
use uuid::Uuid;

use super::tables::{get_columns, ColumnInfo};
use super::{ensure_provisioned, validate_identifier, DataError, RESERVED_COLUMNS};
use crate::models::project::Project;
use crate::quota::{QuotaEnforcer, QuotaError};

/// Default page size for row listings
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Maximum page size for row listings
pub const MAX_PAGE_SIZE: i64 = 200;

type JsonScalar<'q> = sqlx::query::QueryScalar<'q, sqlx::Postgres, Value, PgArguments>;

/// Normalizes limit/offset pagination parameters
fn clamp_page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}

/// Resolves a payload key to a catalog column
///
/// The catalog name, not the payload key, is what gets interpolated into
/// SQL, so unknown or reserved keys never reach a query.
fn require_column<'a>(columns: &'a [ColumnInfo], key: &str) -> Result<&'a ColumnInfo, DataError> {
    if RESERVED_COLUMNS.contains(&key) {
        return Err(DataError::ReservedColumn(key.to_string()));
    }

    columns
        .iter()
        .find(|c| c.name == key)
        .ok_or_else(|| DataError::UnknownColumn(key.to_string()))
}

fn parse_timestamptz(column: &str, value: &Value) -> Result<DateTime<Utc>, DataError> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .ok_or(DataError::InvalidValue {
            column: column.to_string(),
            expected: "RFC 3339 timestamp string",
        })
}

fn parse_uuid_value(column: &str, value: &Value) -> Result<Uuid, DataError> {
    value
        .as_str()
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or(DataError::InvalidValue {
            column: column.to_string(),
            expected: "UUID string",
        })
}

fn parse_i32_value(column: &str, value: &Value) -> Result<i32, DataError> {
    value
        .as_i64()
        .and_then(|n| i32::try_from(n).ok())
        .ok_or(DataError::InvalidValue {
            column: column.to_string(),
            expected: "32-bit integer",
        })
}

/// Binds a JSON value as the PostgreSQL type of its column
fn bind_json_value<'q>(
    q: JsonScalar<'q>,
    column: &ColumnInfo,
    value: &Value,
) -> Result<JsonScalar<'q>, DataError> {
    let name = column.name.as_str();

    if value.is_null() {
        let q = match column.data_type.as_str() {
            "text" => q.bind(Option::<String>::None),
            "integer" => q.bind(Option::<i32>::None),
            "bigint" => q.bind(Option::<i64>::None),
            "double precision" => q.bind(Option::<f64>::None),
            "boolean" => q.bind(Option::<bool>::None),
            "timestamp with time zone" => q.bind(Option::<DateTime<Utc>>::None),
            "jsonb" => q.bind(Option::<Value>::None),
            "uuid" => q.bind(Option::<Uuid>::None),
            _ => {
                return Err(DataError::InvalidValue {
                    column: name.to_string(),
                    expected: "supported column type",
                })
            }
        };
        return Ok(q);
    }

    let q = match column.data_type.as_str() {
        "text" => q.bind(
            value
                .as_str()
                .map(ToOwned::to_owned)
                .ok_or(DataError::InvalidValue {
                    column: name.to_string(),
                    expected: "string",
                })?,
        ),
        "integer" => q.bind(parse_i32_value(name, value)?),
        "bigint" => q.bind(value.as_i64().ok_or(DataError::InvalidValue {
            column: name.to_string(),
            expected: "64-bit integer",
        })?),
        "double precision" => q.bind(value.as_f64().ok_or(DataError::InvalidValue {
            column: name.to_string(),
            expected: "number",
        })?),
        "boolean" => q.bind(value.as_bool().ok_or(DataError::InvalidValue {
            column: name.to_string(),
            expected: "boolean",
        })?),
        "timestamp with time zone" => q.bind(parse_timestamptz(name, value)?),
        "jsonb" => q.bind(value.clone()),
        "uuid" => q.bind(parse_uuid_value(name, value)?),
        _ => {
            return Err(DataError::InvalidValue {
                column: name.to_string(),
                expected: "supported column type",
            })
        }
    };

    Ok(q)
}

/// Fetches the catalog columns for a table, erroring if it does not exist
async fn require_table(
    pool: &PgPool,
    project: &Project,
    table: &str,
) -> Result<Vec<ColumnInfo>, DataError> {
    ensure_provisioned(project)?;
    validate_identifier(table)?;

    let columns = get_columns(pool, &project.schema_name, table).await?;

    if columns.is_empty() {
        return Err(DataError::TableNotFound(table.to_string()));
    }

    Ok(columns)
}

/// Inserts a row into a project table
///
/// Enforces the project's `max_items` quota per table before writing.
///
/// # Arguments
///
/// * `pool` - Database connection pool
/// * `project` - Project owning the schema (must be provisioned)
/// * `table` - Table name
/// * `values` - Column values keyed by column name
///
/// # Returns
///
/// The inserted row as JSON, surrogate columns included
///
/// # Errors
///
/// Returns an error if:
/// - The table does not exist
/// - A key is reserved or unknown
/// - A value does not match its column's type
/// - The insert would exceed the `max_items` quota
pub async fn insert_row(
    pool: &PgPool,
    project: &Project,
    table: &str,
    values: &Map<String, Value>,
) -> Result<Value, DataError> {
    let columns = require_table(pool, project, table).await?;

    let enforcer = QuotaEnforcer::new(pool.clone());
    match enforcer.enforce_table_rows(project, table).await {
        Ok(()) => {}
        Err(QuotaError::LimitExceeded { current, limit, .. }) => {
            return Err(DataError::QuotaExceeded { current, limit })
        }
        Err(QuotaError::DatabaseError(e)) => return Err(DataError::Database(e)),
    }

    let mut targets: Vec<(&ColumnInfo, &Value)> = Vec::with_capacity(values.len());
    for (key, value) in values {
        targets.push((require_column(&columns, key)?, value));
    }

    let sql = if targets.is_empty() {
        format!(
            "INSERT INTO \"{}\".\"{}\" AS t DEFAULT VALUES RETURNING row_to_json(t)",
            project.schema_name, table
        )
    } else {
        let names: Vec<String> = targets.iter().map(|(c, _)| format!("\"{}\"", c.name)).collect();
        let placeholders: Vec<String> = (1..=targets.len()).map(|i| format!("${}", i)).collect();

        format!(
            "INSERT INTO \"{}\".\"{}\" AS t ({}) VALUES ({}) RETURNING row_to_json(t)",
            project.schema_name,
            table,
            names.join(", "),
            placeholders.join(", ")
        )
    };

    let mut q: JsonScalar<'_> = sqlx::query_scalar(&sql);
    for (column, value) in &targets {
        q = bind_json_value(q, column, value)?;
    }

    let row = q.fetch_one(pool).await?;

    Ok(row)
}

/// Lists rows from a project table with limit/offset pagination
///
/// Rows are ordered by insertion time, oldest first.
///
/// # Arguments
///
/// * `limit` - Page size (default 50, max 200)
/// * `offset` - Rows to skip (default 0)
pub async fn list_rows(
    pool: &PgPool,
    project: &Project,
    table: &str,
    limit: Option<i64>,
    offset: Option<i64>,
) -> Result<Vec<Value>, DataError> {
    require_table(pool, project, table).await?;

    let (limit, offset) = clamp_page(limit, offset);

    let sql = format!(
        "SELECT row_to_json(t) FROM \"{}\".\"{}\" AS t ORDER BY created_at, id LIMIT $1 OFFSET $2",
        project.schema_name, table
    );

    let rows = sqlx::query_scalar::<_, Value>(&sql)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Fetches a single row by ID
///
/// # Returns
///
/// The row as JSON, or None if no row has that ID
pub async fn get_row(
    pool: &PgPool,
    project: &Project,
    table: &str,
    id: Uuid,
) -> Result<Option<Value>, DataError> {
    require_table(pool, project, table).await?;

    let sql = format!(
        "SELECT row_to_json(t) FROM \"{}\".\"{}\" AS t WHERE id = $1",
        project.schema_name, table
    );

    let row = sqlx::query_scalar::<_, Value>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Updates columns of a row by ID
///
/// Only the provided columns change; `updated_at` is always refreshed.
///
/// # Returns
///
/// The updated row as JSON, or None if no row has that ID
pub async fn update_row(
    pool: &PgPool,
    project: &Project,
    table: &str,
    id: Uuid,
    values: &Map<String, Value>,
) -> Result<Option<Value>, DataError> {
    let columns = require_table(pool, project, table).await?;

    let mut targets: Vec<(&ColumnInfo, &Value)> = Vec::with_capacity(values.len());
    for (key, value) in values {
        targets.push((require_column(&columns, key)?, value));
    }

    let mut sql = format!(
        "UPDATE \"{}\".\"{}\" AS t SET updated_at = NOW()",
        project.schema_name, table
    );

    let mut bind_count = 1; // $1 is the row id
    for (column, _) in &targets {
        bind_count += 1;
        sql.push_str(&format!(", \"{}\" = ${}", column.name, bind_count));
    }

    sql.push_str(" WHERE id = $1 RETURNING row_to_json(t)");

    let mut q: JsonScalar<'_> = sqlx::query_scalar(&sql);
    q = q.bind(id);
    for (column, value) in &targets {
        q = bind_json_value(q, column, value)?;
    }

    let row = q.fetch_optional(pool).await?;

    Ok(row)
}

/// Deletes a row by ID
///
/// # Returns
///
/// `true` if a row was deleted, `false` if no row had that ID
pub async fn delete_row(
    pool: &PgPool,
    project: &Project,
    table: &str,
    id: Uuid,
) -> Result<bool, DataError> {
    require_table(pool, project, table).await?;

    let sql = format!(
        "DELETE FROM \"{}\".\"{}\" WHERE id = $1",
        project.schema_name, table
    );

    let result = sqlx::query(&sql).bind(id).execute(pool).await?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn column(name: &str, data_type: &str) -> ColumnInfo {
        ColumnInfo {
            name: name.to_string(),
            data_type: data_type.to_string(),
            nullable: true,
        }
    }

    #[test]
    fn test_clamp_page_defaults() {
        assert_eq!(clamp_page(None, None), (DEFAULT_PAGE_SIZE, 0));
    }

    #[test]
    fn test_clamp_page_limits() {
        assert_eq!(clamp_page(Some(10), Some(20)), (10, 20));
        assert_eq!(clamp_page(Some(0), None), (1, 0));
        assert_eq!(clamp_page(Some(10_000), None), (MAX_PAGE_SIZE, 0));
        assert_eq!(clamp_page(None, Some(-5)), (DEFAULT_PAGE_SIZE, 0));
    }

    #[test]
    fn test_require_column() {
        let columns = vec![column("title", "text"), column("count", "bigint")];

        assert!(require_column(&columns, "title").is_ok());
        assert!(matches!(
            require_column(&columns, "missing"),
            Err(DataError::UnknownColumn(_))
        ));
        assert!(matches!(
            require_column(&columns, "id"),
            Err(DataError::ReservedColumn(_))
        ));
        assert!(matches!(
            require_column(&columns, "updated_at"),
            Err(DataError::ReservedColumn(_))
        ));
    }

    #[test]
    fn test_parse_timestamptz() {
        let value = json!("2024-03-01T12:00:00Z");
        assert!(parse_timestamptz("at", &value).is_ok());

        let value = json!("not a timestamp");
        assert!(parse_timestamptz("at", &value).is_err());

        let value = json!(42);
        assert!(parse_timestamptz("at", &value).is_err());
    }

    #[test]
    fn test_parse_uuid_value() {
        let id = Uuid::new_v4();
        assert_eq!(parse_uuid_value("ref", &json!(id.to_string())).ok(), Some(id));
        assert!(parse_uuid_value("ref", &json!("nope")).is_err());
    }

    #[test]
    fn test_parse_i32_value() {
        assert_eq!(parse_i32_value("n", &json!(7)).ok(), Some(7));
        assert!(parse_i32_value("n", &json!(i64::MAX)).is_err());
        assert!(parse_i32_value("n", &json!("7")).is_err());
    }
}

// Integration tests that exercise row CRUD against a real schema are in the
// tests/ directory.
