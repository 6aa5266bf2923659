//! CLI-facing configuration file format (SPEC_FULL.md §6): one JSON object
//! per configured driver, keyed by driver name. This mirrors
//! `drivers::bootstrap::EngineConfig` but expressed as a `serde`-friendly
//! wire shape, since a handful of fields there (routes, schema-sync
//! strategy/mismatch enums) don't carry their own `Deserialize` impl —
//! `RouteConfig`'s function form and the sync-strategy enums are parsed
//! here and converted once, at load time, the same way the four route
//! forms are normalised once at driver construction (spec.md §3, §9).

use std::collections::HashMap;
use std::time::Duration;

use drivers::{
    bigquery::BigQueryDriverConfig,
    bootstrap::{EngineConfig, MongoConnection, SqlConnection, TursoConnection},
    csv::CsvDriverConfig,
    dynamodb::DynamoDbDriverConfig,
    excel::ExcelDriverConfig,
    jsonl::JsonlDriverConfig,
    mongodb::MongoDriverConfig,
    parquet::ParquetDriverConfig,
    sibling::SiblingDriverConfig,
    sql_common::SqlDriverConfig,
    sqs::SqsDriverConfig,
    webhook::WebhookDriverConfig,
};
use engine_core::{
    batch_pool::DEFAULT_CONCURRENCY,
    retry::RetryPolicy,
    schema_sync::{OnMismatch, SchemaSyncConfig, SyncStrategy},
};
use model::{
    resource::ResourceSchema,
    route::{RouteConfig, RouteConfigInput},
};
use serde::Deserialize;
use serde_json::Value as Json;

use crate::error::CliError;

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RawConfig {
    pub postgres: Option<RawSqlConfig>,
    pub mysql: Option<RawSqlConfig>,
    pub mariadb: Option<RawSqlConfig>,
    pub planetscale: Option<RawSqlConfig>,
    pub sqlite: Option<RawSqlConfig>,
    pub turso: Option<RawTursoConfig>,
    pub bigquery: Option<RawBigQueryConfig>,
    pub dynamodb: Option<RawDynamoConfig>,
    pub mongodb: Option<RawMongoConfig>,
    pub sibling: Option<RawSiblingConfig>,
    pub webhook: Option<RawWebhookConfig>,
    pub sqs: Option<RawSqsConfig>,
    pub jsonl: Option<RawFileConfig>,
    pub csv: Option<RawFileConfig>,
    pub parquet: Option<RawParquetConfig>,
    pub excel: Option<RawExcelConfig>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RawResource {
    pub attributes: HashMap<String, Json>,
    pub plugin_attributes: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSchemaSync {
    pub enabled: bool,
    /// `"alter" | "drop-create" | "validate-only"` (spec.md §4.3).
    pub strategy: String,
    /// `"error" | "warn" | "ignore"` (spec.md §4.3).
    pub on_mismatch: String,
    pub auto_create_table: bool,
    pub auto_create_columns: bool,
    pub drop_missing_columns: bool,
}

impl Default for RawSchemaSync {
    fn default() -> Self {
        let d = SchemaSyncConfig::default();
        RawSchemaSync {
            enabled: d.enabled,
            strategy: "alter".to_string(),
            on_mismatch: "warn".to_string(),
            auto_create_table: d.auto_create_table,
            auto_create_columns: d.auto_create_columns,
            drop_missing_columns: d.drop_missing_columns,
        }
    }
}

impl RawSchemaSync {
    fn into_config(self) -> Result<SchemaSyncConfig, CliError> {
        let strategy = match self.strategy.as_str() {
            "alter" => SyncStrategy::Alter,
            "drop-create" => SyncStrategy::DropCreate,
            "validate-only" => SyncStrategy::ValidateOnly,
            other => return Err(CliError::Config(format!("unknown schemaSync.strategy '{other}'"))),
        };
        let on_mismatch = match self.on_mismatch.as_str() {
            "error" => OnMismatch::Error,
            "warn" => OnMismatch::Warn,
            "ignore" => OnMismatch::Ignore,
            other => return Err(CliError::Config(format!("unknown schemaSync.onMismatch '{other}'"))),
        };
        Ok(SchemaSyncConfig {
            enabled: self.enabled,
            strategy,
            on_mismatch,
            auto_create_table: self.auto_create_table,
            auto_create_columns: self.auto_create_columns,
            drop_missing_columns: self.drop_missing_columns,
        })
    }
}

fn routes_from_raw(raw: HashMap<String, RouteConfigInput>) -> HashMap<String, RouteConfig> {
    raw.into_iter().map(|(resource, input)| (resource, RouteConfig::Parsed(input))).collect()
}

fn schemas_from_raw(raw: HashMap<String, RawResource>) -> Result<HashMap<String, ResourceSchema>, CliError> {
    let mut schemas = HashMap::with_capacity(raw.len());
    for (resource, r) in raw {
        let attributes_json = Json::Object(r.attributes.into_iter().collect());
        let schema = ResourceSchema::from_json_attributes(resource.as_str(), &attributes_json, r.plugin_attributes)
            .ok_or_else(|| CliError::Config(format!("resource '{resource}' has no parseable attributes")))?;
        schemas.insert(resource, schema);
    }
    Ok(schemas)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSqlConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_concurrency")]
    pub batch_concurrency: usize,
    pub dsn: String,
    pub routes: HashMap<String, RouteConfigInput>,
    pub resources: HashMap<String, RawResource>,
    pub schema_sync: RawSchemaSync,
    pub log_table: Option<String>,
}

impl Default for RawSqlConfig {
    fn default() -> Self {
        RawSqlConfig {
            enabled: true,
            batch_concurrency: DEFAULT_CONCURRENCY,
            dsn: String::new(),
            routes: HashMap::new(),
            resources: HashMap::new(),
            schema_sync: RawSchemaSync::default(),
            log_table: None,
        }
    }
}

impl RawSqlConfig {
    fn into_connection(self) -> Result<SqlConnection, CliError> {
        let config = SqlDriverConfig {
            enabled: self.enabled,
            batch_concurrency: self.batch_concurrency,
            routes: routes_from_raw(self.routes),
            schemas: schemas_from_raw(self.resources)?,
            schema_sync: self.schema_sync.into_config()?,
            log_table: self.log_table,
            default_resource: None,
        };
        Ok(SqlConnection { dsn: self.dsn, config })
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RawTursoConfig {
    #[serde(flatten)]
    pub sql: RawSqlConfig,
    pub auth_token: String,
}

impl RawTursoConfig {
    fn into_connection(self) -> Result<TursoConnection, CliError> {
        let url = self.sql.dsn.clone();
        let auth_token = self.auth_token;
        let SqlConnection { config, .. } = self.sql.into_connection()?;
        Ok(TursoConnection { url, auth_token, config })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawBigQueryConfig {
    pub enabled: bool,
    pub batch_concurrency: usize,
    pub service_account_key_path: String,
    pub project_id: String,
    pub dataset_id: String,
    pub routes: HashMap<String, RouteConfigInput>,
    pub resources: HashMap<String, RawResource>,
    pub schema_sync: RawSchemaSync,
}

impl Default for RawBigQueryConfig {
    fn default() -> Self {
        RawBigQueryConfig {
            enabled: true,
            batch_concurrency: DEFAULT_CONCURRENCY,
            service_account_key_path: String::new(),
            project_id: String::new(),
            dataset_id: String::new(),
            routes: HashMap::new(),
            resources: HashMap::new(),
            schema_sync: RawSchemaSync::default(),
        }
    }
}

impl RawBigQueryConfig {
    fn into_config(self) -> Result<BigQueryDriverConfig, CliError> {
        Ok(BigQueryDriverConfig {
            enabled: self.enabled,
            batch_concurrency: self.batch_concurrency,
            service_account_key_path: self.service_account_key_path,
            project_id: self.project_id,
            dataset_id: self.dataset_id,
            routes: routes_from_raw(self.routes),
            schemas: schemas_from_raw(self.resources)?,
            schema_sync: self.schema_sync.into_config()?,
            default_resource: None,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawDynamoConfig {
    pub enabled: bool,
    pub batch_concurrency: usize,
    pub region: Option<String>,
    pub routes: HashMap<String, RouteConfigInput>,
}

impl Default for RawDynamoConfig {
    fn default() -> Self {
        RawDynamoConfig {
            enabled: true,
            batch_concurrency: DEFAULT_CONCURRENCY,
            region: None,
            routes: HashMap::new(),
        }
    }
}

impl From<RawDynamoConfig> for DynamoDbDriverConfig {
    fn from(raw: RawDynamoConfig) -> Self {
        DynamoDbDriverConfig {
            enabled: raw.enabled,
            batch_concurrency: raw.batch_concurrency,
            region: raw.region,
            routes: routes_from_raw(raw.routes),
            default_resource: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawMongoConfig {
    pub enabled: bool,
    pub batch_concurrency: usize,
    pub conn_str: String,
    pub database: String,
    pub routes: HashMap<String, RouteConfigInput>,
    pub log_collection: Option<String>,
}

impl Default for RawMongoConfig {
    fn default() -> Self {
        RawMongoConfig {
            enabled: true,
            batch_concurrency: DEFAULT_CONCURRENCY,
            conn_str: String::new(),
            database: String::new(),
            routes: HashMap::new(),
            log_collection: None,
        }
    }
}

impl RawMongoConfig {
    fn into_connection(self) -> MongoConnection {
        MongoConnection {
            conn_str: self.conn_str,
            database: self.database,
            config: MongoDriverConfig {
                enabled: self.enabled,
                batch_concurrency: self.batch_concurrency,
                routes: routes_from_raw(self.routes),
                log_collection: self.log_collection,
                default_resource: None,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSiblingConfig {
    pub enabled: bool,
    pub batch_concurrency: usize,
    pub base_url: String,
    pub dry_run: bool,
    pub routes: HashMap<String, RouteConfigInput>,
}

impl Default for RawSiblingConfig {
    fn default() -> Self {
        RawSiblingConfig {
            enabled: true,
            batch_concurrency: DEFAULT_CONCURRENCY,
            base_url: String::new(),
            dry_run: false,
            routes: HashMap::new(),
        }
    }
}

impl From<RawSiblingConfig> for SiblingDriverConfig {
    fn from(raw: RawSiblingConfig) -> Self {
        SiblingDriverConfig {
            enabled: raw.enabled,
            batch_concurrency: raw.batch_concurrency,
            base_url: raw.base_url,
            dry_run: raw.dry_run,
            routes: routes_from_raw(raw.routes),
            default_resource: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawRetry {
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// `retryStrategy` (spec.md §4.5): `"fixed"` or `"exponential"` (default).
    pub strategy: String,
}

impl Default for RawRetry {
    fn default() -> Self {
        let d = RetryPolicy::for_http();
        RawRetry {
            max_attempts: d.max_attempts,
            base_delay_ms: d.base_delay.as_millis() as u64,
            max_delay_ms: d.max_delay.as_millis() as u64,
            strategy: "exponential".to_string(),
        }
    }
}

impl From<RawRetry> for RetryPolicy {
    fn from(raw: RawRetry) -> Self {
        let strategy = match raw.strategy.to_ascii_lowercase().as_str() {
            "fixed" => engine_core::retry::RetryStrategy::Fixed,
            _ => engine_core::retry::RetryStrategy::Exponential,
        };
        RetryPolicy::with_strategy(
            raw.max_attempts,
            Duration::from_millis(raw.base_delay_ms),
            Duration::from_millis(raw.max_delay_ms),
            strategy,
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawWebhookConfig {
    pub enabled: bool,
    pub batch_concurrency: usize,
    pub timeout_secs: u64,
    pub retry: RawRetry,
    pub routes: HashMap<String, RouteConfigInput>,
}

impl Default for RawWebhookConfig {
    fn default() -> Self {
        RawWebhookConfig {
            enabled: true,
            batch_concurrency: DEFAULT_CONCURRENCY,
            timeout_secs: 10,
            retry: RawRetry::default(),
            routes: HashMap::new(),
        }
    }
}

impl From<RawWebhookConfig> for WebhookDriverConfig {
    fn from(raw: RawWebhookConfig) -> Self {
        WebhookDriverConfig {
            enabled: raw.enabled,
            batch_concurrency: raw.batch_concurrency,
            timeout: Duration::from_secs(raw.timeout_secs),
            retry: raw.retry.into(),
            routes: routes_from_raw(raw.routes),
            default_resource: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSqsConfig {
    pub enabled: bool,
    pub batch_concurrency: usize,
    pub region: Option<String>,
    pub deduplication_id: bool,
    pub message_group_id: Option<String>,
    pub routes: HashMap<String, RouteConfigInput>,
}

impl Default for RawSqsConfig {
    fn default() -> Self {
        RawSqsConfig {
            enabled: true,
            batch_concurrency: DEFAULT_CONCURRENCY,
            region: None,
            deduplication_id: false,
            message_group_id: None,
            routes: HashMap::new(),
        }
    }
}

impl From<RawSqsConfig> for SqsDriverConfig {
    fn from(raw: RawSqsConfig) -> Self {
        SqsDriverConfig {
            enabled: raw.enabled,
            batch_concurrency: raw.batch_concurrency,
            region: raw.region,
            deduplication_id: raw.deduplication_id,
            message_group_id: raw.message_group_id,
            routes: routes_from_raw(raw.routes),
            default_resource: None,
        }
    }
}

/// `"none" | "date" | {"size": <bytes>}` (spec.md §4.5/§6 rotation policy).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawRotation {
    Named(String),
    Size { size: u64 },
}

impl Default for RawRotation {
    fn default() -> Self {
        RawRotation::Named("none".to_string())
    }
}

impl RawRotation {
    fn into_policy(self) -> Result<drivers::common::RotationPolicy, CliError> {
        use drivers::common::RotationPolicy;
        match self {
            RawRotation::Named(name) => match name.as_str() {
                "none" => Ok(RotationPolicy::None),
                "date" => Ok(RotationPolicy::Date),
                other => Err(CliError::Config(format!("unknown rotation policy '{other}'"))),
            },
            RawRotation::Size { size } => Ok(RotationPolicy::Size { threshold_bytes: size }),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawFileConfig {
    pub enabled: bool,
    pub batch_concurrency: usize,
    pub rotation: RawRotation,
    pub routes: HashMap<String, RouteConfigInput>,
}

impl Default for RawFileConfig {
    fn default() -> Self {
        RawFileConfig {
            enabled: true,
            batch_concurrency: DEFAULT_CONCURRENCY,
            rotation: RawRotation::default(),
            routes: HashMap::new(),
        }
    }
}

impl RawFileConfig {
    fn into_jsonl(self) -> Result<JsonlDriverConfig, CliError> {
        Ok(JsonlDriverConfig {
            enabled: self.enabled,
            batch_concurrency: self.batch_concurrency,
            rotation: self.rotation.into_policy()?,
            routes: routes_from_raw(self.routes),
            default_resource: None,
        })
    }

    fn into_csv(self) -> Result<CsvDriverConfig, CliError> {
        Ok(CsvDriverConfig {
            enabled: self.enabled,
            batch_concurrency: self.batch_concurrency,
            rotation: self.rotation.into_policy()?,
            routes: routes_from_raw(self.routes),
            default_resource: None,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawParquetConfig {
    pub enabled: bool,
    pub batch_concurrency: usize,
    pub row_group_size: usize,
    pub rotation: RawRotation,
    pub routes: HashMap<String, RouteConfigInput>,
}

impl Default for RawParquetConfig {
    fn default() -> Self {
        let d = ParquetDriverConfig::default();
        RawParquetConfig {
            enabled: true,
            batch_concurrency: DEFAULT_CONCURRENCY,
            row_group_size: d.row_group_size,
            rotation: RawRotation::default(),
            routes: HashMap::new(),
        }
    }
}

impl RawParquetConfig {
    fn into_config(self) -> Result<ParquetDriverConfig, CliError> {
        Ok(ParquetDriverConfig {
            enabled: self.enabled,
            batch_concurrency: self.batch_concurrency,
            row_group_size: self.row_group_size,
            rotation: self.rotation.into_policy()?,
            routes: routes_from_raw(self.routes),
            default_resource: None,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawExcelConfig {
    pub enabled: bool,
    pub batch_concurrency: usize,
    pub chunk_size: usize,
    pub rotation: RawRotation,
    pub routes: HashMap<String, RouteConfigInput>,
}

impl Default for RawExcelConfig {
    fn default() -> Self {
        let d = ExcelDriverConfig::default();
        RawExcelConfig {
            enabled: true,
            batch_concurrency: DEFAULT_CONCURRENCY,
            chunk_size: d.chunk_size,
            rotation: RawRotation::default(),
            routes: HashMap::new(),
        }
    }
}

impl RawExcelConfig {
    fn into_config(self) -> Result<ExcelDriverConfig, CliError> {
        Ok(ExcelDriverConfig {
            enabled: self.enabled,
            batch_concurrency: self.batch_concurrency,
            chunk_size: self.chunk_size,
            rotation: self.rotation.into_policy()?,
            routes: routes_from_raw(self.routes),
            default_resource: None,
        })
    }
}

impl RawConfig {
    pub fn into_engine_config(self) -> Result<EngineConfig, CliError> {
        Ok(EngineConfig {
            postgres: self.postgres.map(RawSqlConfig::into_connection).transpose()?,
            mysql: self.mysql.map(RawSqlConfig::into_connection).transpose()?,
            mariadb: self.mariadb.map(RawSqlConfig::into_connection).transpose()?,
            planetscale: self.planetscale.map(RawSqlConfig::into_connection).transpose()?,
            sqlite: self.sqlite.map(RawSqlConfig::into_connection).transpose()?,
            turso: self.turso.map(RawTursoConfig::into_connection).transpose()?,
            bigquery: self.bigquery.map(RawBigQueryConfig::into_config).transpose()?,
            dynamodb: self.dynamodb.map(DynamoDbDriverConfig::from),
            mongodb: self.mongodb.map(RawMongoConfig::into_connection),
            sibling: self.sibling.map(SiblingDriverConfig::from),
            webhook: self.webhook.map(WebhookDriverConfig::from),
            sqs: self.sqs.map(SqsDriverConfig::from),
            jsonl: self.jsonl.map(RawFileConfig::into_jsonl).transpose()?,
            csv: self.csv.map(RawFileConfig::into_csv).transpose()?,
            parquet: self.parquet.map(RawParquetConfig::into_config).transpose()?,
            excel: self.excel.map(RawExcelConfig::into_config).transpose()?,
        })
    }
}

pub fn load(path: &str) -> Result<RawConfig, CliError> {
    let content = std::fs::read_to_string(path).map_err(CliError::Io)?;
    serde_json::from_str(&content).map_err(CliError::ConfigDeserialize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_postgres_and_jsonl_config() {
        let json = r#"{
            "postgres": {
                "dsn": "postgres://localhost/test",
                "routes": { "users": "users_table" },
                "resources": { "users": { "attributes": { "name": "string|required|maxlength:100" } } }
            },
            "jsonl": {
                "routes": { "orders": "/tmp/orders" }
            }
        }"#;
        let raw: RawConfig = serde_json::from_str(json).unwrap();
        let engine = raw.into_engine_config().unwrap();
        assert!(engine.postgres.is_some());
        assert!(engine.jsonl.is_some());
        assert!(engine.mongodb.is_none());

        let pg = engine.postgres.unwrap();
        assert_eq!(pg.dsn, "postgres://localhost/test");
        assert!(pg.config.schemas.contains_key("users"));
    }

    #[test]
    fn unknown_sync_strategy_is_a_config_error() {
        let json = r#"{
            "postgres": {
                "dsn": "postgres://localhost/test",
                "routes": { "users": "users_table" },
                "schemaSync": { "strategy": "rebuild-everything" }
            }
        }"#;
        let raw: RawConfig = serde_json::from_str(json).unwrap();
        let err = raw.into_engine_config().unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn size_rotation_parses_the_threshold() {
        let json = r#"{ "csv": { "routes": {"orders": "/tmp/orders"}, "rotation": {"size": 2048} } }"#;
        let raw: RawConfig = serde_json::from_str(json).unwrap();
        let engine = raw.into_engine_config().unwrap();
        assert!(engine.csv.is_some());
    }
}
