//! Remote record store contract and the bundled SQLite implementation.
//!
//! Records are JSON objects with a string `id`, grouped by table name.
//! `update` merges a partial object into the stored record (JSON merge
//! patch semantics: `null` members are removed).

use crate::db::DbError;
use crate::model::task::RecordError;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RemoteResult<T> = Result<T, RemoteError>;

#[derive(Debug)]
pub enum RemoteError {
    Db(DbError),
    Serialization(serde_json::Error),
    NotFound { table: String, id: String },
    InvalidRecord(String),
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Serialization(err) => write!(f, "record serialization failed: {err}"),
            Self::NotFound { table, id } => write!(f, "{table} record not found: {id}"),
            Self::InvalidRecord(message) => write!(f, "invalid remote record: {message}"),
        }
    }
}

impl Error for RemoteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::NotFound { .. } | Self::InvalidRecord(_) => None,
        }
    }
}

impl From<DbError> for RemoteError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RemoteError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

impl From<RecordError> for RemoteError {
    fn from(value: RecordError) -> Self {
        Self::InvalidRecord(value.to_string())
    }
}

/// Equality filter operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Text(String),
    Integer(i64),
    Bool(bool),
    Null,
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Equality filters plus an optional single-field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
    pub filters: Vec<(String, FilterValue)>,
    pub order_by: Option<(String, bool)>,
}

impl RecordQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<FilterValue>) -> Self {
        self.filters.push((field.to_string(), value.into()));
        self
    }

    pub fn order_asc(mut self, field: &str) -> Self {
        self.order_by = Some((field.to_string(), false));
        self
    }

    pub fn order_desc(mut self, field: &str) -> Self {
        self.order_by = Some((field.to_string(), true));
        self
    }
}

/// Hosted record store.
pub trait RemoteStore {
    fn insert(&self, table: &str, record: &Value) -> RemoteResult<()>;
    fn update(&self, table: &str, id: &str, patch: &Value) -> RemoteResult<()>;
    /// Deleting an absent record is not an error.
    fn delete(&self, table: &str, id: &str) -> RemoteResult<()>;
    fn query(&self, table: &str, query: &RecordQuery) -> RemoteResult<Vec<Value>>;
}

/// `RemoteStore` over the `records` table (one JSON body per row).
pub struct SqliteRemoteStore {
    conn: Connection,
}

impl SqliteRemoteStore {
    /// Wraps a connection returned by `db::open_db*`.
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

impl RemoteStore for SqliteRemoteStore {
    fn insert(&self, table: &str, record: &Value) -> RemoteResult<()> {
        let id = record_id(record)?;
        let body = serde_json::to_string(record)?;
        self.conn.execute(
            "INSERT INTO records (collection, id, body) VALUES (?1, ?2, ?3);",
            params![table, id, body],
        )?;
        Ok(())
    }

    fn update(&self, table: &str, id: &str, patch: &Value) -> RemoteResult<()> {
        if !patch.is_object() {
            return Err(RemoteError::InvalidRecord(format!(
                "patch for {table}/{id} must be an object"
            )));
        }
        let patch = serde_json::to_string(patch)?;
        let changed = self.conn.execute(
            "UPDATE records
             SET body = json_patch(body, ?3),
                 updated_at = CAST(strftime('%s', 'now') AS INTEGER) * 1000
             WHERE collection = ?1 AND id = ?2;",
            params![table, id, patch],
        )?;
        if changed == 0 {
            return Err(RemoteError::NotFound {
                table: table.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    fn delete(&self, table: &str, id: &str) -> RemoteResult<()> {
        self.conn.execute(
            "DELETE FROM records WHERE collection = ?1 AND id = ?2;",
            params![table, id],
        )?;
        Ok(())
    }

    fn query(&self, table: &str, query: &RecordQuery) -> RemoteResult<Vec<Value>> {
        let mut sql = String::from("SELECT body FROM records WHERE collection = ?");
        let mut bind: Vec<SqlValue> = vec![SqlValue::Text(table.to_string())];

        for (field, value) in &query.filters {
            bind.push(SqlValue::Text(json_path(field)));
            match value {
                FilterValue::Null => sql.push_str(" AND json_extract(body, ?) IS NULL"),
                FilterValue::Text(text) => {
                    sql.push_str(" AND json_extract(body, ?) = ?");
                    bind.push(SqlValue::Text(text.clone()));
                }
                FilterValue::Integer(number) => {
                    sql.push_str(" AND json_extract(body, ?) = ?");
                    bind.push(SqlValue::Integer(*number));
                }
                FilterValue::Bool(flag) => {
                    sql.push_str(" AND json_extract(body, ?) = ?");
                    bind.push(SqlValue::Integer(i64::from(*flag)));
                }
            }
        }

        if let Some((field, descending)) = &query.order_by {
            sql.push_str(" ORDER BY json_extract(body, ?)");
            sql.push_str(if *descending { " DESC" } else { " ASC" });
            sql.push_str(", id ASC");
            bind.push(SqlValue::Text(json_path(field)));
        } else {
            sql.push_str(" ORDER BY id ASC");
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let bodies = stmt
            .query_map(params_from_iter(bind), |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        bodies
            .iter()
            .map(|body| serde_json::from_str(body).map_err(RemoteError::from))
            .collect()
    }
}

fn record_id(record: &Value) -> RemoteResult<&str> {
    record
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| RemoteError::InvalidRecord("record has no string `id`".to_string()))
}

fn json_path(field: &str) -> String {
    format!("$.{field}")
}

#[cfg(test)]
mod tests {
    use super::{RecordQuery, RemoteError, RemoteStore, SqliteRemoteStore};
    use crate::db::open_db_in_memory;
    use serde_json::json;

    fn store() -> SqliteRemoteStore {
        SqliteRemoteStore::new(open_db_in_memory().unwrap())
    }

    #[test]
    fn insert_requires_string_id() {
        let store = store();
        let err = store.insert("tasks", &json!({ "text": "x" })).unwrap_err();
        assert!(matches!(err, RemoteError::InvalidRecord(_)));
    }

    #[test]
    fn update_merges_and_reports_missing_rows() {
        let store = store();
        store
            .insert("notes", &json!({ "id": "n1", "content": "<p>a</p>", "is_pinned": false }))
            .unwrap();
        store
            .update("notes", "n1", &json!({ "is_pinned": true }))
            .unwrap();

        let rows = store.query("notes", &RecordQuery::new()).unwrap();
        assert_eq!(rows[0]["is_pinned"], true);
        assert_eq!(rows[0]["content"], "<p>a</p>");

        let err = store
            .update("notes", "missing", &json!({ "is_pinned": true }))
            .unwrap_err();
        assert!(matches!(err, RemoteError::NotFound { .. }));
    }

    #[test]
    fn query_filters_by_field_and_orders() {
        let store = store();
        for (id, user, created_at) in [("a", "u1", 1), ("b", "u2", 2), ("c", "u1", 3)] {
            store
                .insert(
                    "tasks",
                    &json!({ "id": id, "user_id": user, "created_at": created_at, "completed": false }),
                )
                .unwrap();
        }

        let rows = store
            .query(
                "tasks",
                &RecordQuery::new()
                    .eq("user_id", "u1")
                    .eq("completed", false)
                    .order_desc("created_at"),
            )
            .unwrap();
        let ids: Vec<&str> = rows.iter().filter_map(|row| row["id"].as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
        assert!(store.query("notes", &RecordQuery::new()).unwrap().is_empty());
    }

    #[test]
    fn delete_is_idempotent() {
        let store = store();
        store.insert("folders", &json!({ "id": "f1", "name": "Work" })).unwrap();
        store.delete("folders", "f1").unwrap();
        store.delete("folders", "f1").unwrap();
        assert!(store.query("folders", &RecordQuery::new()).unwrap().is_empty());
    }
}
