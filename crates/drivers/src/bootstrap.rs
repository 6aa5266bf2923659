//! Registry assembly (spec.md §2, §8): turns an already-parsed
//! configuration into a fully populated [`DriverRegistry`], registering one
//! lazy constructor per driver section that is present and enabled. A
//! driver whose section is absent from configuration is simply never
//! registered — `registry.build("dynamodb")` then fails with the
//! "available drivers" error spec.md §8 describes, rather than building a
//! half-configured instance.

use engine_core::registry::DriverRegistry;

use crate::{
    bigquery::{self, BigQueryDriverConfig},
    csv::{self, CsvDriverConfig},
    dynamodb::{self, DynamoDbDriverConfig},
    excel::{self, ExcelDriverConfig},
    jsonl::{self, JsonlDriverConfig},
    mongodb::{self, MongoDriverConfig},
    mysql,
    parquet::{self, ParquetDriverConfig},
    postgres,
    sibling::{self, SiblingDriverConfig},
    sql_common::SqlDriverConfig,
    sqlite,
    sqs::{self, SqsDriverConfig},
    webhook::{self, WebhookDriverConfig},
};

/// A DSN/connection-string plus the shared SQL driver config, the shape
/// every `SqlReplicator`-backed driver (postgres/mysql/mariadb/
/// planetscale/sqlite) is constructed from.
#[derive(Clone)]
pub struct SqlConnection {
    pub dsn: String,
    pub config: SqlDriverConfig,
}

/// Turso's `SqlReplicator<SqliteAdapter>` additionally needs an auth token
/// (spec.md §4.5 driver-specifics table).
#[derive(Clone)]
pub struct TursoConnection {
    pub url: String,
    pub auth_token: String,
    pub config: SqlDriverConfig,
}

#[derive(Clone)]
pub struct MongoConnection {
    pub conn_str: String,
    pub database: String,
    pub config: MongoDriverConfig,
}

/// One optional slot per driver spec.md §4.5 names. Each is `None` unless
/// the configuration source (a config file, env vars, or CLI flags —
/// parsing is outside this module's concern) supplied that section.
#[derive(Clone, Default)]
pub struct EngineConfig {
    pub postgres: Option<SqlConnection>,
    pub mysql: Option<SqlConnection>,
    pub mariadb: Option<SqlConnection>,
    pub planetscale: Option<SqlConnection>,
    pub sqlite: Option<SqlConnection>,
    pub turso: Option<TursoConnection>,
    pub bigquery: Option<BigQueryDriverConfig>,
    pub dynamodb: Option<DynamoDbDriverConfig>,
    pub mongodb: Option<MongoConnection>,
    pub sibling: Option<SiblingDriverConfig>,
    pub webhook: Option<WebhookDriverConfig>,
    pub sqs: Option<SqsDriverConfig>,
    pub jsonl: Option<JsonlDriverConfig>,
    pub csv: Option<CsvDriverConfig>,
    pub parquet: Option<ParquetDriverConfig>,
    pub excel: Option<ExcelDriverConfig>,
}

/// Registers a lazy constructor for every populated section of `config`,
/// skipping any section whose driver has been disabled
/// (`enabled: false` on its own config struct still counts as configured —
/// `replicate()` on it will simply skip every event, per spec.md §4.1).
pub fn build_registry(config: EngineConfig) -> DriverRegistry {
    let mut registry = DriverRegistry::new();

    if let Some(conn) = config.postgres {
        registry.register("postgres", move || Box::new(postgres::driver(conn.dsn.clone(), conn.config.clone())));
    }
    if let Some(conn) = config.mysql {
        registry.register("mysql", move || Box::new(mysql::mysql_driver(conn.dsn.clone(), conn.config.clone())));
    }
    if let Some(conn) = config.mariadb {
        registry.register("mariadb", move || Box::new(mysql::mariadb_driver(conn.dsn.clone(), conn.config.clone())));
    }
    if let Some(conn) = config.planetscale {
        registry.register("planetscale", move || Box::new(mysql::planetscale_driver(conn.dsn.clone(), conn.config.clone())));
    }
    if let Some(conn) = config.sqlite {
        registry.register("sqlite", move || Box::new(sqlite::sqlite_driver(conn.dsn.clone(), conn.config.clone())));
    }
    if let Some(conn) = config.turso {
        registry.register("turso", move || {
            Box::new(sqlite::turso_driver(conn.url.clone(), conn.auth_token.clone(), conn.config.clone()))
        });
    }
    if let Some(cfg) = config.bigquery {
        registry.register("bigquery", move || Box::new(bigquery::driver(cfg.clone())));
    }
    if let Some(cfg) = config.dynamodb {
        registry.register("dynamodb", move || Box::new(dynamodb::driver(cfg.clone())));
    }
    if let Some(conn) = config.mongodb {
        registry.register("mongodb", move || {
            Box::new(mongodb::driver(conn.conn_str.clone(), conn.database.clone(), conn.config.clone()))
        });
    }
    if let Some(cfg) = config.sibling {
        registry.register("sibling", move || Box::new(sibling::driver(cfg.clone())));
    }
    if let Some(cfg) = config.webhook {
        registry.register("webhook", move || Box::new(webhook::driver(cfg.clone())));
    }
    if let Some(cfg) = config.sqs {
        registry.register("sqs", move || Box::new(sqs::driver(cfg.clone())));
    }
    if let Some(cfg) = config.jsonl {
        registry.register("jsonl", move || Box::new(jsonl::driver(cfg.clone())));
    }
    if let Some(cfg) = config.csv {
        registry.register("csv", move || Box::new(csv::driver(cfg.clone())));
    }
    if let Some(cfg) = config.parquet {
        registry.register("parquet", move || Box::new(parquet::driver(cfg.clone())));
    }
    if let Some(cfg) = config.excel {
        registry.register("excel", move || Box::new(excel::driver(cfg.clone())));
    }

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_only_configured_drivers() {
        let config = EngineConfig {
            postgres: Some(SqlConnection {
                dsn: "postgres://localhost/test".to_string(),
                config: SqlDriverConfig::default(),
            }),
            jsonl: Some(JsonlDriverConfig::default()),
            ..EngineConfig::default()
        };

        let registry = build_registry(config);
        let available = registry.available_drivers();
        assert_eq!(available, vec!["jsonl".to_string(), "postgres".to_string()]);
    }

    #[test]
    fn empty_config_registers_nothing() {
        let registry = build_registry(EngineConfig::default());
        assert!(registry.available_drivers().is_empty());
    }

    #[test]
    fn unregistered_driver_reports_available_names() {
        let config = EngineConfig {
            csv: Some(CsvDriverConfig::default()),
            ..EngineConfig::default()
        };
        let registry = build_registry(config);
        let err = registry.build("dynamodb").unwrap_err();
        assert!(err.message.contains("csv"));
    }
}
