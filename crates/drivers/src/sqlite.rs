//! SQLite and Turso drivers (spec.md §4.5): both speak through
//! `SqliteAdapter`'s `libsql` client, distinguished only by whether
//! `auth_token` is set (a local file has none, a hosted Turso database
//! requires one).

use connectors::sql::sqlite::SqliteAdapter;
use planner::query::dialect::Sqlite;

use crate::sql_common::{SqlDriverConfig, SqlReplicator};

fn build(
    driver_name: &'static str,
    conn_str: impl Into<String>,
    auth_token: Option<String>,
    config: SqlDriverConfig,
) -> SqlReplicator<SqliteAdapter> {
    let conn_str = conn_str.into();
    SqlReplicator::new(
        driver_name,
        Box::new(Sqlite),
        Box::new(move || -> crate::sql_common::ConnectFuture<SqliteAdapter> {
            let conn_str = conn_str.clone();
            let auth_token = auth_token.clone();
            Box::pin(async move { SqliteAdapter::connect(&conn_str, auth_token.as_deref()).await })
        }),
        config,
    )
}

pub fn sqlite_driver(path: impl Into<String>, config: SqlDriverConfig) -> SqlReplicator<SqliteAdapter> {
    build("sqlite", path, None, config)
}

pub fn turso_driver(url: impl Into<String>, auth_token: impl Into<String>, config: SqlDriverConfig) -> SqlReplicator<SqliteAdapter> {
    build("turso", url, Some(auth_token.into()), config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::replicator::Replicator;

    #[test]
    fn sqlite_and_turso_carry_distinct_names() {
        let sqlite = sqlite_driver("./replica.db", SqlDriverConfig::default());
        let turso = turso_driver("libsql://db.turso.io", "token", SqlDriverConfig::default());
        assert_eq!(sqlite.driver_name(), "sqlite");
        assert_eq!(turso.driver_name(), "turso");
    }
}
