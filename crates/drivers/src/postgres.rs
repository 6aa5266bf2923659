//! Postgres driver (spec.md §4.5): parameterised `INSERT ... ON CONFLICT
//! (id) DO NOTHING RETURNING *` / `DELETE ... WHERE id = $1 RETURNING *`
//! against `connectors::sql::postgres::PostgresAdapter`.

use connectors::sql::postgres::PostgresAdapter;
use planner::query::dialect::Postgres;

use crate::sql_common::{SqlDriverConfig, SqlReplicator};

pub fn driver(dsn: impl Into<String>, config: SqlDriverConfig) -> SqlReplicator<PostgresAdapter> {
    let dsn = dsn.into();
    SqlReplicator::new(
        "postgres",
        Box::new(Postgres),
        Box::new(move || -> crate::sql_common::ConnectFuture<PostgresAdapter> {
            let dsn = dsn.clone();
            Box::pin(async move { PostgresAdapter::connect(&dsn).await })
        }),
        config,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::{replicator::Replicator, state::DriverState};

    #[test]
    fn starts_in_created_state() {
        let replicator = driver("postgres://localhost/test", SqlDriverConfig::default());
        assert_eq!(replicator.state(), DriverState::Created);
        assert_eq!(replicator.driver_name(), "postgres");
    }

    #[test]
    fn default_config_is_invalid_with_no_routes() {
        let replicator = driver("postgres://localhost/test", SqlDriverConfig::default());
        let validation = replicator.validate_config();
        assert!(!validation.valid);
        assert!(validation.errors.iter().any(|e| e.contains("route")));
    }

    #[test]
    fn zero_batch_concurrency_is_rejected() {
        let mut config = SqlDriverConfig::default();
        config.batch_concurrency = 0;
        config
            .routes
            .insert("users".to_string(), model::route::RouteConfig::Parsed(
                serde_json::from_str(r#""users_table""#).unwrap(),
            ));
        let replicator = driver("postgres://localhost/test", config);
        let validation = replicator.validate_config();
        assert!(!validation.valid);
        assert!(validation.errors.iter().any(|e| e.contains("batchConcurrency")));
    }
}
