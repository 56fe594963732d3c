//! SQLite implementation of the document-store contract.
//!
//! Each collection is a two-column table `(id TEXT PRIMARY KEY, doc TEXT)`
//! holding one JSON document per row. Secondary indexes are expression
//! indexes over `json_extract(doc, '$.field')`, so index creation is
//! naturally idempotent (`CREATE INDEX IF NOT EXISTS`) and an index is
//! servable the moment it exists.

use crate::backend::{BackendError, BackendResult, DocumentStore, SortOrder};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Document store backed by a shared SQLite connection pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Arc<SqlitePool>,
}

impl SqliteStore {
    /// Wrap an existing pool.
    pub fn from_pool(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database, creating the file if missing.
    pub async fn connect(url: &str) -> BackendResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(classify)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(classify)?;
        Ok(Self::from_pool(Arc::new(pool)))
    }

    /// Open a private in-memory database.
    ///
    /// The pool is capped at one connection: each SQLite `:memory:`
    /// connection is its own database, so a larger pool would hand out
    /// empty databases.
    pub async fn in_memory() -> BackendResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(classify)?;
        Ok(Self::from_pool(Arc::new(pool)))
    }

    fn json_path(field: &str) -> String {
        debug_assert!(ident_safe(field), "field name `{field}` not validated");
        format!("json_extract(doc, '$.{field}')")
    }
}

/// True for identifiers safe to splice into SQL. The bucket validates
/// collection and index field names once at construction; this backs that
/// up in debug builds.
pub(crate) fn ident_safe(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Map a SQLx failure onto the three backend failure kinds.
fn classify(err: sqlx::Error) -> BackendError {
    match err {
        sqlx::Error::RowNotFound => BackendError::NotFound(err.to_string()),
        sqlx::Error::Database(ref db_err)
            if db_err.message().to_ascii_lowercase().contains("unique") =>
        {
            BackendError::Conflict(err.to_string())
        }
        other => BackendError::Unavailable(other.to_string()),
    }
}

/// Bind a JSON scalar as the closest SQLite type so comparisons against
/// `json_extract` results use native affinity.
fn push_json_scalar(builder: &mut QueryBuilder<'_, Sqlite>, value: &Value) {
    match value {
        Value::String(s) => {
            builder.push_bind(s.clone());
        }
        Value::Number(n) if n.is_i64() => {
            builder.push_bind(n.as_i64().unwrap_or_default());
        }
        Value::Number(n) => {
            builder.push_bind(n.as_f64().unwrap_or_default());
        }
        Value::Bool(b) => {
            builder.push_bind(*b);
        }
        other => {
            builder.push_bind(other.to_string());
        }
    }
}

fn parse_doc(text: &str) -> BackendResult<Value> {
    serde_json::from_str(text)
        .map_err(|err| BackendError::Unavailable(format!("malformed stored document: {err}")))
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn ensure_collection(&self, collection: &str) -> BackendResult<()> {
        debug_assert!(ident_safe(collection));
        let sql =
            format!("CREATE TABLE IF NOT EXISTS \"{collection}\" (id TEXT PRIMARY KEY, doc TEXT NOT NULL)");
        sqlx::query(&sql)
            .execute(&*self.pool)
            .await
            .map_err(classify)?;
        debug!(collection, "ensured collection");
        Ok(())
    }

    async fn ensure_index(&self, collection: &str, field: &str) -> BackendResult<()> {
        debug_assert!(ident_safe(collection) && ident_safe(field));
        let sql = format!(
            "CREATE INDEX IF NOT EXISTS \"idx_{collection}_{field}\" ON \"{collection}\" ({})",
            Self::json_path(field)
        );
        sqlx::query(&sql)
            .execute(&*self.pool)
            .await
            .map_err(classify)?;
        debug!(collection, field, "ensured index");
        Ok(())
    }

    async fn wait_for_index(&self, collection: &str, field: &str) -> BackendResult<()> {
        // SQLite expression indexes are servable as soon as CREATE INDEX
        // returns; nothing to wait for.
        debug!(collection, field, "index ready");
        Ok(())
    }

    async fn insert(&self, collection: &str, id: &str, doc: Value) -> BackendResult<()> {
        debug_assert!(ident_safe(collection));
        let sql = format!("INSERT INTO \"{collection}\" (id, doc) VALUES (?, ?)");
        sqlx::query(&sql)
            .bind(id)
            .bind(doc.to_string())
            .execute(&*self.pool)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn insert_many(&self, collection: &str, docs: &[(String, Value)]) -> BackendResult<()> {
        debug_assert!(ident_safe(collection));
        if docs.is_empty() {
            return Ok(());
        }
        let mut builder =
            QueryBuilder::<Sqlite>::new(format!("INSERT INTO \"{collection}\" (id, doc) "));
        builder.push_values(docs, |mut row, (id, doc)| {
            row.push_bind(id.clone());
            row.push_bind(doc.to_string());
        });
        builder.push(" ON CONFLICT(id) DO UPDATE SET doc = excluded.doc");
        builder
            .build()
            .execute(&*self.pool)
            .await
            .map_err(classify)?;
        debug!(collection, count = docs.len(), "inserted batch");
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> BackendResult<Option<Value>> {
        debug_assert!(ident_safe(collection));
        let sql = format!("SELECT doc FROM \"{collection}\" WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(classify)?;
        match row {
            Some(row) => {
                let text: String = row.try_get("doc").map_err(classify)?;
                Ok(Some(parse_doc(&text)?))
            }
            None => Ok(None),
        }
    }

    async fn find_by_index(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
        order_by: &[(&str, SortOrder)],
    ) -> BackendResult<Vec<Value>> {
        debug_assert!(ident_safe(collection) && ident_safe(field));
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT doc FROM \"{collection}\" WHERE {} = ",
            Self::json_path(field)
        ));
        push_json_scalar(&mut builder, value);
        if !order_by.is_empty() {
            builder.push(" ORDER BY ");
            for (i, (order_field, direction)) in order_by.iter().enumerate() {
                debug_assert!(ident_safe(order_field));
                if i > 0 {
                    builder.push(", ");
                }
                builder.push(Self::json_path(order_field));
                builder.push(match direction {
                    SortOrder::Asc => " ASC",
                    SortOrder::Desc => " DESC",
                });
            }
        }
        let rows = builder
            .build()
            .fetch_all(&*self.pool)
            .await
            .map_err(classify)?;
        rows.iter()
            .map(|row| {
                let text: String = row.try_get("doc").map_err(classify)?;
                parse_doc(&text)
            })
            .collect()
    }

    async fn find_page(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
        order_field: &str,
        after: Option<i64>,
        limit: u32,
    ) -> BackendResult<Vec<Value>> {
        debug_assert!(ident_safe(collection) && ident_safe(field) && ident_safe(order_field));
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT doc FROM \"{collection}\" WHERE {} = ",
            Self::json_path(field)
        ));
        push_json_scalar(&mut builder, value);
        if let Some(after) = after {
            builder.push(format!(" AND {} > ", Self::json_path(order_field)));
            builder.push_bind(after);
        }
        builder.push(format!(" ORDER BY {} ASC LIMIT ", Self::json_path(order_field)));
        builder.push_bind(i64::from(limit));
        let rows = builder
            .build()
            .fetch_all(&*self.pool)
            .await
            .map_err(classify)?;
        rows.iter()
            .map(|row| {
                let text: String = row.try_get("doc").map_err(classify)?;
                parse_doc(&text)
            })
            .collect()
    }

    async fn delete(&self, collection: &str, id: &str) -> BackendResult<u64> {
        debug_assert!(ident_safe(collection));
        let sql = format!("DELETE FROM \"{collection}\" WHERE id = ?");
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&*self.pool)
            .await
            .map_err(classify)?;
        Ok(result.rows_affected())
    }

    async fn delete_by_index(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> BackendResult<u64> {
        debug_assert!(ident_safe(collection) && ident_safe(field));
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "DELETE FROM \"{collection}\" WHERE {} = ",
            Self::json_path(field)
        ));
        push_json_scalar(&mut builder, value);
        let result = builder
            .build()
            .execute(&*self.pool)
            .await
            .map_err(classify)?;
        Ok(result.rows_affected())
    }

    async fn delete_all(&self, collection: &str) -> BackendResult<u64> {
        debug_assert!(ident_safe(collection));
        let sql = format!("DELETE FROM \"{collection}\"");
        let result = sqlx::query(&sql)
            .execute(&*self.pool)
            .await
            .map_err(classify)?;
        debug!(collection, removed = result.rows_affected(), "cleared collection");
        Ok(result.rows_affected())
    }
}
