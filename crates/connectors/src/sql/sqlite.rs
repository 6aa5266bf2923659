//! SQLite/Turso destination adapter. Turso's hosted libSQL and local
//! SQLite files share the same `libsql` client, so one adapter covers both
//! driver entries (spec.md's "SQLite" and "Turso" drivers).

use model::core::value::Value;

use crate::error::{ConnectorError, DbError};

pub struct SqliteAdapter {
    conn: libsql::Connection,
    /// `None` for a local file, the hosted libSQL client kept alive for a
    /// remote Turso database.
    _database: libsql::Database,
}

impl SqliteAdapter {
    /// `conn_str` is either a local path (`./replica.db`) or a
    /// `libsql://...` remote URL; `auth_token` is required for the latter.
    pub async fn connect(conn_str: &str, auth_token: Option<&str>) -> Result<Self, ConnectorError> {
        let database = if let Some(token) = auth_token {
            libsql::Builder::new_remote(conn_str.to_string(), token.to_string())
                .build()
                .await
                .map_err(ConnectorError::Sqlite)?
        } else {
            libsql::Builder::new_local(conn_str)
                .build()
                .await
                .map_err(ConnectorError::Sqlite)?
        };
        let conn = database.connect().map_err(ConnectorError::Sqlite)?;
        Ok(SqliteAdapter {
            conn,
            _database: database,
        })
    }

    pub async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, DbError> {
        let params: Vec<libsql::Value> = params.iter().map(to_libsql_value).collect();
        let affected = self.conn.execute(sql, params).await?;
        Ok(affected)
    }

    pub async fn table_exists(&self, table: &str) -> Result<bool, DbError> {
        let mut rows = self
            .conn
            .query(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
            )
            .await?;
        Ok(rows.next().await?.is_some())
    }

    pub async fn column_names(&self, table: &str) -> Result<Vec<String>, DbError> {
        let mut rows = self
            .conn
            .query(&format!("PRAGMA table_info({table})"), ())
            .await?;
        let mut names = Vec::new();
        while let Some(row) = rows.next().await? {
            let name: String = row.get(1)?;
            names.push(name);
        }
        Ok(names)
    }
}

fn to_libsql_value(value: &Value) -> libsql::Value {
    match value {
        Value::Null => libsql::Value::Null,
        Value::Boolean(b) => libsql::Value::Integer(*b as i64),
        Value::Int(i) => libsql::Value::Integer(*i),
        Value::Float(f) => libsql::Value::Real(*f),
        Value::Decimal(d) => libsql::Value::Text(d.to_string()),
        Value::String(s) => libsql::Value::Text(s.clone()),
        Value::Uuid(u) => libsql::Value::Text(u.to_string()),
        Value::Date(d) => libsql::Value::Text(d.to_string()),
        Value::Timestamp(t) => libsql::Value::Text(t.to_rfc3339()),
        Value::Bytes(b) => libsql::Value::Blob(b.clone()),
        Value::Array(_) | Value::Json(_) => libsql::Value::Text(value.to_json().to_string()),
    }
}
