//! MySQL, MariaDB, and PlanetScale drivers (spec.md §4.5): all three speak
//! the MySQL wire protocol and the `ON DUPLICATE KEY UPDATE id = id`
//! idempotent-insert idiom, so they share `MySqlAdapter` and only differ
//! in the name under which the registry exposes them — PlanetScale
//! connection strings already carry the `?sslaccept=strict` query param
//! users are expected to set (spec.md §4.5 driver-specifics table).

use connectors::sql::mysql::MySqlAdapter;
use planner::query::dialect::MySql;

use crate::sql_common::{SqlDriverConfig, SqlReplicator};

fn build(driver_name: &'static str, dsn: impl Into<String>, config: SqlDriverConfig) -> SqlReplicator<MySqlAdapter> {
    let dsn = dsn.into();
    SqlReplicator::new(
        driver_name,
        Box::new(MySql),
        Box::new(move || -> crate::sql_common::ConnectFuture<MySqlAdapter> {
            let dsn = dsn.clone();
            Box::pin(async move { MySqlAdapter::connect(&dsn).await })
        }),
        config,
    )
}

pub fn mysql_driver(dsn: impl Into<String>, config: SqlDriverConfig) -> SqlReplicator<MySqlAdapter> {
    build("mysql", dsn, config)
}

pub fn mariadb_driver(dsn: impl Into<String>, config: SqlDriverConfig) -> SqlReplicator<MySqlAdapter> {
    build("mariadb", dsn, config)
}

pub fn planetscale_driver(dsn: impl Into<String>, config: SqlDriverConfig) -> SqlReplicator<MySqlAdapter> {
    build("planetscale", dsn, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::replicator::Replicator;

    #[test]
    fn each_alias_carries_its_own_driver_name() {
        let mysql = mysql_driver("mysql://localhost/test", SqlDriverConfig::default());
        let mariadb = mariadb_driver("mysql://localhost/test", SqlDriverConfig::default());
        let planetscale = planetscale_driver("mysql://localhost/test?sslaccept=strict", SqlDriverConfig::default());
        assert_eq!(mysql.driver_name(), "mysql");
        assert_eq!(mariadb.driver_name(), "mariadb");
        assert_eq!(planetscale.driver_name(), "planetscale");
    }
}
