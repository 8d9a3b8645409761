use async_trait::async_trait;
use sqlx::{
    sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow},
    Row,
};

use crate::{
    error::Error,
    query::{Comparison, Constraint, FieldValue},
    record::FieldMap,
    Adapter,
};

/// SQLite adapter using a unified JSON storage model
///
/// Schema:
/// ```sql
/// CREATE TABLE documents (
///     collection TEXT NOT NULL,
///     id TEXT NOT NULL,
///     data TEXT NOT NULL,
///     PRIMARY KEY (collection, id)
/// );
/// ```
///
/// Constraints are pushed down as `json_extract(data, '$.field') op ?`.
pub struct SqliteAdapter {
    pool: SqlitePool,
}

impl SqliteAdapter {
    /// Create a new SQLite adapter with a file-based database
    pub async fn new_file(path: &str) -> Result<Self, Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&format!("sqlite:{}?mode=rwc", path))
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Create a new SQLite adapter with an in-memory database
    pub async fn new_memory() -> Result<Self, Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Connect using a sqlx database URL (`sqlite:...`)
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Create from an existing pool
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<(), Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                data TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Storage(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection, id)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Storage(e.to_string()))?;

        Ok(())
    }

    fn json_path(field: &str) -> String {
        // Field names are data here, not trusted SQL: quote the JSON path
        // member and double any embedded quotes.
        format!("'$.\"{}\"'", field.replace('"', "\"\"").replace('\'', "''"))
    }

    fn is_null_equality(constraint: &Constraint) -> bool {
        constraint.value == FieldValue::Null && constraint.comparison == Comparison::Equal
    }

    fn comparison_sql(comparison: Comparison) -> &'static str {
        match comparison {
            Comparison::Equal => "=",
            Comparison::GreaterThanOrEqual => ">=",
            Comparison::LessThanOrEqual => "<=",
        }
    }

    fn row_to_document(row: SqliteRow) -> Result<(String, FieldMap), Error> {
        let id: String = row
            .try_get("id")
            .map_err(|e| Error::Storage(e.to_string()))?;
        let data: String = row
            .try_get("data")
            .map_err(|e| Error::Storage(e.to_string()))?;
        let json: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&data).map_err(|e| Error::Deserialize(e.to_string()))?;

        let fields = json
            .into_iter()
            .map(|(name, value)| (name, FieldValue::from(value)))
            .collect();

        Ok((id, fields))
    }
}

#[async_trait]
impl Adapter for SqliteAdapter {
    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        fields: &FieldMap,
    ) -> Result<(), Error> {
        let data =
            serde_json::to_string(fields).map_err(|e| Error::Serialize(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data)
            VALUES (?, ?, ?)
            ON CONFLICT (collection, id) DO UPDATE SET data = excluded.data
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Storage(e.to_string()))?;

        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<(), Error> {
        sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;

        Ok(())
    }

    async fn stream_documents(
        &self,
        collection: &str,
        constraints: &[Constraint],
    ) -> Result<Vec<(String, FieldMap)>, Error> {
        let mut sql = String::from("SELECT id, data FROM documents WHERE collection = ?");
        for constraint in constraints {
            if Self::is_null_equality(constraint) {
                // `json_extract(...) = NULL` is never true in SQL. json_type
                // distinguishes an explicit JSON null from a missing key, so
                // null-equality matches exactly the documents that carry the
                // field as null — same as the in-process evaluation.
                sql.push_str(&format!(
                    " AND json_type(data, {}) = 'null'",
                    Self::json_path(&constraint.field)
                ));
            } else {
                sql.push_str(&format!(
                    " AND json_extract(data, {}) {} ?",
                    Self::json_path(&constraint.field),
                    Self::comparison_sql(constraint.comparison)
                ));
            }
        }
        sql.push_str(" ORDER BY id");

        let mut query = sqlx::query(&sql).bind(collection);
        for constraint in constraints {
            if Self::is_null_equality(constraint) {
                continue;
            }
            query = match &constraint.value {
                FieldValue::Null => query.bind(Option::<String>::None),
                FieldValue::Bool(b) => query.bind(*b),
                FieldValue::Int(i) => query.bind(*i),
                FieldValue::Float(f) => query.bind(*f),
                FieldValue::String(s) => query.bind(s.clone()),
                // Must match the serialized form exactly; chrono's serde
                // writes the `Z` suffix, not `+00:00`.
                FieldValue::Timestamp(t) => {
                    query.bind(t.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true))
                }
            };
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;

        rows.into_iter().map(Self::row_to_document).collect()
    }
}
