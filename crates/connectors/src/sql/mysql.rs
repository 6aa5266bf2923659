//! MySQL/MariaDB/PlanetScale destination adapter.

use model::core::value::Value;
use mysql_async::{Pool, Value as MyValue, prelude::Queryable};

use crate::error::{ConnectorError, DbError};

pub struct MySqlAdapter {
    pool: Pool,
}

impl MySqlAdapter {
    pub async fn connect(conn_str: &str) -> Result<Self, ConnectorError> {
        let pool = Pool::new(conn_str);
        // Round-trip a connection up front so misconfiguration surfaces at
        // `initialize()` time rather than on the first replicated event.
        let _ = pool.get_conn().await?;
        Ok(MySqlAdapter { pool })
    }

    pub async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, DbError> {
        let mut conn = self.pool.get_conn().await?;
        let params: Vec<MyValue> = params.iter().map(to_mysql_value).collect();
        conn.exec_drop(sql, params).await?;
        Ok(conn.affected_rows())
    }

    pub async fn table_exists(&self, table: &str) -> Result<bool, DbError> {
        let mut conn = self.pool.get_conn().await?;
        let count: Option<i64> = conn
            .exec_first(
                "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
                (table,),
            )
            .await?;
        Ok(count.unwrap_or(0) > 0)
    }

    pub async fn column_names(&self, table: &str) -> Result<Vec<String>, DbError> {
        let mut conn = self.pool.get_conn().await?;
        let names: Vec<String> = conn
            .exec(
                "SELECT column_name FROM information_schema.columns WHERE table_name = ?",
                (table,),
            )
            .await?;
        Ok(names)
    }
}

fn to_mysql_value(value: &Value) -> MyValue {
    match value {
        Value::Null => MyValue::NULL,
        Value::Boolean(b) => MyValue::Int(*b as i64),
        Value::Int(i) => MyValue::Int(*i),
        Value::Float(f) => MyValue::Double(*f),
        Value::Decimal(d) => MyValue::Bytes(d.to_string().into_bytes()),
        Value::String(s) => MyValue::Bytes(s.clone().into_bytes()),
        Value::Uuid(u) => MyValue::Bytes(u.to_string().into_bytes()),
        Value::Date(d) => MyValue::Bytes(d.to_string().into_bytes()),
        Value::Timestamp(t) => MyValue::Bytes(t.to_rfc3339().into_bytes()),
        Value::Bytes(b) => MyValue::Bytes(b.clone()),
        Value::Array(_) | Value::Json(_) => MyValue::Bytes(value.to_json().to_string().into_bytes()),
    }
}
