//! Postgres destination adapter: owns the live connection and the raw
//! exec/introspection primitives the Postgres driver (`engine-runtime`)
//! builds its `Replicator` semantics on top of.

use std::sync::Arc;

use model::core::value::Value;
use tokio_postgres::{Client, NoTls, types::ToSql};
use tracing::debug;

use crate::error::{ConnectorError, DbError};

pub struct PostgresAdapter {
    client: Arc<Client>,
}

impl PostgresAdapter {
    /// Connects using a plain `postgres://` DSN. TLS DSNs are handled by
    /// `tokio-postgres`'s own sslmode parsing where the deployment requires
    /// it; this adapter assumes the common in-VPC/unencrypted case the
    /// teacher's own `PgAdapter::connect` targets.
    pub async fn connect(conn_str: &str) -> Result<Self, ConnectorError> {
        let (client, connection) = tokio_postgres::connect(conn_str, NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!(error = %e, "postgres connection task exited");
            }
        });
        Ok(PostgresAdapter {
            client: Arc::new(client),
        })
    }

    pub async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, DbError> {
        let boxed = to_sql_params(params);
        let refs: Vec<&(dyn ToSql + Sync)> = boxed.iter().map(|b| b.as_ref()).collect();
        let rows = self.client.execute(sql, &refs).await?;
        Ok(rows)
    }

    pub async fn table_exists(&self, table: &str) -> Result<bool, DbError> {
        let row = self
            .client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_name = $1)",
                &[&table],
            )
            .await?;
        Ok(row.get(0))
    }

    /// Column names currently present on `table`, used by schema sync to
    /// detect additions/mismatches (spec.md §5).
    pub async fn column_names(&self, table: &str) -> Result<Vec<String>, DbError> {
        let rows = self
            .client
            .query(
                "SELECT column_name FROM information_schema.columns WHERE table_name = $1",
                &[&table],
            )
            .await?;
        Ok(rows.into_iter().map(|r| r.get(0)).collect())
    }
}

/// Boxes a generic [`Value`] list into Postgres `ToSql` params. Arrays and
/// nested JSON both render as `jsonb` text; the destination column type
/// (chosen by `planner::ddl`) is always JSON-compatible for those cases.
fn to_sql_params(values: &[Value]) -> Vec<Box<dyn ToSql + Sync + Send>> {
    values
        .iter()
        .map(|v| -> Box<dyn ToSql + Sync + Send> {
            match v {
                Value::Null => Box::new(Option::<String>::None),
                Value::Boolean(b) => Box::new(*b),
                Value::Int(i) => Box::new(*i),
                Value::Float(f) => Box::new(*f),
                Value::Decimal(d) => Box::new(d.to_string()),
                Value::String(s) => Box::new(s.clone()),
                Value::Uuid(u) => Box::new(*u),
                Value::Date(d) => Box::new(*d),
                Value::Timestamp(t) => Box::new(*t),
                Value::Bytes(b) => Box::new(b.clone()),
                Value::Array(_) => Box::new(v.to_json()),
                Value::Json(j) => Box::new(j.clone()),
            }
        })
        .collect()
}
