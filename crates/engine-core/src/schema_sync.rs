//! Schema Introspector & Sync Orchestrator (spec.md §4.3): at driver
//! initialization, reads the live destination schema per resource and
//! creates/alters/validates it according to policy before the driver can
//! transition to `READY`.

use std::collections::HashSet;

use async_trait::async_trait;
use connectors::error::DbError;
use connectors::sql::{mysql::MySqlAdapter, postgres::PostgresAdapter, sqlite::SqliteAdapter};
use connectors::warehouse::bigquery::BigQueryAdapter;
use model::{error::ReplicationError, resource::ResourceSchema};
use planner::{bigquery_schema, ddl, query::dialect::Dialect};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    Alter,
    DropCreate,
    ValidateOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnMismatch {
    Error,
    Warn,
    Ignore,
}

#[derive(Debug, Clone)]
pub struct SchemaSyncConfig {
    pub enabled: bool,
    pub strategy: SyncStrategy,
    pub on_mismatch: OnMismatch,
    pub auto_create_table: bool,
    pub auto_create_columns: bool,
    /// Documented but unused by default (spec.md §4.2 ALTER TABLE policy):
    /// columns are never dropped even when this is set, until a driver
    /// explicitly opts into destructive sync.
    pub drop_missing_columns: bool,
}

impl Default for SchemaSyncConfig {
    fn default() -> Self {
        SchemaSyncConfig {
            enabled: true,
            strategy: SyncStrategy::Alter,
            on_mismatch: OnMismatch::Warn,
            auto_create_table: true,
            auto_create_columns: true,
            drop_missing_columns: false,
        }
    }
}

/// What happened to one destination table during sync, for the
/// `table_created` / `table_altered` / `table_recreated` events
/// (spec.md §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    Created,
    Altered { added_columns: Vec<String> },
    Recreated,
    ValidatedNoChange,
    Skipped,
}

#[derive(Debug, Clone)]
pub struct TableSyncOutcome {
    pub table: String,
    pub action: SyncAction,
}

/// Unifies the three SQL adapters' introspection/execute primitives so the
/// orchestrator can drive Postgres, MySQL, and SQLite (Turso) through one
/// dialect-agnostic loop (spec.md §4.3).
#[async_trait]
pub trait SqlIntrospect: Send + Sync {
    async fn table_exists(&self, table: &str) -> Result<bool, DbError>;
    async fn column_names(&self, table: &str) -> Result<Vec<String>, DbError>;
    async fn execute(&self, sql: &str, params: &[model::core::value::Value]) -> Result<u64, DbError>;
}

#[async_trait]
impl SqlIntrospect for PostgresAdapter {
    async fn table_exists(&self, table: &str) -> Result<bool, DbError> {
        PostgresAdapter::table_exists(self, table).await
    }
    async fn column_names(&self, table: &str) -> Result<Vec<String>, DbError> {
        PostgresAdapter::column_names(self, table).await
    }
    async fn execute(&self, sql: &str, params: &[model::core::value::Value]) -> Result<u64, DbError> {
        PostgresAdapter::execute(self, sql, params).await
    }
}

#[async_trait]
impl SqlIntrospect for MySqlAdapter {
    async fn table_exists(&self, table: &str) -> Result<bool, DbError> {
        MySqlAdapter::table_exists(self, table).await
    }
    async fn column_names(&self, table: &str) -> Result<Vec<String>, DbError> {
        MySqlAdapter::column_names(self, table).await
    }
    async fn execute(&self, sql: &str, params: &[model::core::value::Value]) -> Result<u64, DbError> {
        MySqlAdapter::execute(self, sql, params).await
    }
}

#[async_trait]
impl SqlIntrospect for SqliteAdapter {
    async fn table_exists(&self, table: &str) -> Result<bool, DbError> {
        SqliteAdapter::table_exists(self, table).await
    }
    async fn column_names(&self, table: &str) -> Result<Vec<String>, DbError> {
        SqliteAdapter::column_names(self, table).await
    }
    async fn execute(&self, sql: &str, params: &[model::core::value::Value]) -> Result<u64, DbError> {
        SqliteAdapter::execute(self, sql, params).await
    }
}

/// Syncs one SQL destination table against `schema`'s replicable
/// attributes, per `config`'s strategy/onMismatch policy. Returns `Ok(None)`
/// when `onMismatch=ignore` silently swallows a mismatch.
pub async fn sync_sql_table(
    introspect: &dyn SqlIntrospect,
    dialect: &dyn Dialect,
    table: &str,
    primary_key: Option<&str>,
    schema: &ResourceSchema,
) -> Result<Option<TableSyncOutcome>, ReplicationError> {
    sync_sql_table_with_config(introspect, dialect, table, primary_key, schema, &SchemaSyncConfig::default()).await
}

pub async fn sync_sql_table_with_config(
    introspect: &dyn SqlIntrospect,
    dialect: &dyn Dialect,
    table: &str,
    primary_key: Option<&str>,
    schema: &ResourceSchema,
    config: &SchemaSyncConfig,
) -> Result<Option<TableSyncOutcome>, ReplicationError> {
    if !config.enabled {
        return Ok(Some(TableSyncOutcome {
            table: table.to_string(),
            action: SyncAction::Skipped,
        }));
    }

    let exists = introspect
        .table_exists(table)
        .await
        .map_err(|e| db_error_to_replication_error("schema_sync.table_exists", table, e))?;

    match config.strategy {
        SyncStrategy::DropCreate => {
            warn!(table, "drop-create schema sync: dropping and recreating table");
            if exists {
                let drop_sql = ddl::drop_table_sql(table, dialect);
                introspect
                    .execute(&drop_sql, &[])
                    .await
                    .map_err(|e| db_error_to_replication_error("schema_sync.drop_table", table, e))?;
            }
            let create_sql = ddl::create_table_sql(schema, table, primary_key, dialect);
            introspect
                .execute(&create_sql, &[])
                .await
                .map_err(|e| db_error_to_replication_error("schema_sync.create_table", table, e))?;
            Ok(Some(TableSyncOutcome {
                table: table.to_string(),
                action: SyncAction::Recreated,
            }))
        }
        SyncStrategy::Alter => {
            if !exists {
                if !config.auto_create_table {
                    return handle_mismatch(config, table, "table does not exist and autoCreateTable is disabled");
                }
                let create_sql = ddl::create_table_sql(schema, table, primary_key, dialect);
                introspect
                    .execute(&create_sql, &[])
                    .await
                    .map_err(|e| db_error_to_replication_error("schema_sync.create_table", table, e))?;
                return Ok(Some(TableSyncOutcome {
                    table: table.to_string(),
                    action: SyncAction::Created,
                }));
            }

            if !config.auto_create_columns {
                return Ok(Some(TableSyncOutcome {
                    table: table.to_string(),
                    action: SyncAction::ValidatedNoChange,
                }));
            }

            let existing: HashSet<String> = introspect
                .column_names(table)
                .await
                .map_err(|e| db_error_to_replication_error("schema_sync.column_names", table, e))?
                .into_iter()
                .collect();

            let mut added = Vec::new();
            for (name, field_type) in schema.replicable_attributes() {
                if name == "id" || existing.contains(&name) {
                    continue;
                }
                let alter_sql = ddl::add_column_sql(table, &name, &field_type, dialect);
                introspect
                    .execute(&alter_sql, &[])
                    .await
                    .map_err(|e| db_error_to_replication_error("schema_sync.add_column", table, e))?;
                added.push(name);
            }

            if added.is_empty() {
                Ok(Some(TableSyncOutcome {
                    table: table.to_string(),
                    action: SyncAction::ValidatedNoChange,
                }))
            } else {
                Ok(Some(TableSyncOutcome {
                    table: table.to_string(),
                    action: SyncAction::Altered { added_columns: added },
                }))
            }
        }
        SyncStrategy::ValidateOnly => {
            if !exists {
                return handle_mismatch(config, table, "table does not exist (validate-only sync)");
            }

            let existing: HashSet<String> = introspect
                .column_names(table)
                .await
                .map_err(|e| db_error_to_replication_error("schema_sync.column_names", table, e))?
                .into_iter()
                .collect();

            let missing: Vec<String> = schema
                .replicable_attributes()
                .into_keys()
                .filter(|name| name != "id" && !existing.contains(name))
                .collect();

            if missing.is_empty() {
                Ok(Some(TableSyncOutcome {
                    table: table.to_string(),
                    action: SyncAction::ValidatedNoChange,
                }))
            } else {
                handle_mismatch(
                    config,
                    table,
                    &format!("missing columns under validate-only: {}", missing.join(", ")),
                )
            }
        }
    }
}

/// BigQuery's schema-sync loop: the Tables API replaces DDL text, but the
/// strategy/onMismatch state machine is the same (spec.md §4.3).
pub async fn sync_bigquery_table(
    adapter: &BigQueryAdapter,
    table_id: &str,
    schema: &ResourceSchema,
    mutability: model::route::Mutability,
    table_options: Option<&model::route::TableOptions>,
    config: &SchemaSyncConfig,
) -> Result<Option<TableSyncOutcome>, ReplicationError> {
    if !config.enabled {
        return Ok(Some(TableSyncOutcome {
            table: table_id.to_string(),
            action: SyncAction::Skipped,
        }));
    }

    let expected = bigquery_schema::schema_fields(schema, mutability);

    match config.strategy {
        SyncStrategy::DropCreate => {
            warn!(table = table_id, "drop-create schema sync: dropping and recreating BigQuery table");
            if adapter
                .table_exists(table_id)
                .await
                .map_err(|e| db_error_to_replication_error("schema_sync.table_exists", table_id, e))?
            {
                adapter
                    .delete_table(table_id)
                    .await
                    .map_err(|e| db_error_to_replication_error("schema_sync.delete_table", table_id, e))?;
            }
            adapter
                .create_table_with_options(table_id, expected, table_options)
                .await
                .map_err(|e| db_error_to_replication_error("schema_sync.create_table", table_id, e))?;
            Ok(Some(TableSyncOutcome {
                table: table_id.to_string(),
                action: SyncAction::Recreated,
            }))
        }
        SyncStrategy::Alter => {
            let live = adapter
                .schema_field_names(table_id)
                .await
                .map_err(|e| db_error_to_replication_error("schema_sync.schema_field_names", table_id, e))?;

            match live {
                None => {
                    if !config.auto_create_table {
                        return handle_mismatch(config, table_id, "dataset table does not exist and autoCreateTable is disabled");
                    }
                    adapter
                        .create_table_with_options(table_id, expected, table_options)
                        .await
                        .map_err(|e| db_error_to_replication_error("schema_sync.create_table", table_id, e))?;
                    Ok(Some(TableSyncOutcome {
                        table: table_id.to_string(),
                        action: SyncAction::Created,
                    }))
                }
                Some(existing_names) => {
                    if !config.auto_create_columns {
                        return Ok(Some(TableSyncOutcome {
                            table: table_id.to_string(),
                            action: SyncAction::ValidatedNoChange,
                        }));
                    }
                    let existing: HashSet<String> = existing_names.into_iter().collect();
                    let missing: Vec<_> = expected.iter().filter(|f| !existing.contains(&f.name)).cloned().collect();
                    if missing.is_empty() {
                        return Ok(Some(TableSyncOutcome {
                            table: table_id.to_string(),
                            action: SyncAction::ValidatedNoChange,
                        }));
                    }
                    let added_columns: Vec<String> = missing.iter().map(|f| f.name.clone()).collect();
                    adapter
                        .add_schema_fields(table_id, missing)
                        .await
                        .map_err(|e| db_error_to_replication_error("schema_sync.add_schema_fields", table_id, e))?;
                    Ok(Some(TableSyncOutcome {
                        table: table_id.to_string(),
                        action: SyncAction::Altered { added_columns },
                    }))
                }
            }
        }
        SyncStrategy::ValidateOnly => {
            let live = adapter
                .schema_field_names(table_id)
                .await
                .map_err(|e| db_error_to_replication_error("schema_sync.schema_field_names", table_id, e))?;

            match live {
                None => handle_mismatch(config, table_id, "dataset table does not exist (validate-only sync)"),
                Some(existing_names) => {
                    let existing: HashSet<String> = existing_names.into_iter().collect();
                    let missing: Vec<String> = expected
                        .iter()
                        .filter(|f| !existing.contains(&f.name))
                        .map(|f| f.name.clone())
                        .collect();
                    if missing.is_empty() {
                        Ok(Some(TableSyncOutcome {
                            table: table_id.to_string(),
                            action: SyncAction::ValidatedNoChange,
                        }))
                    } else {
                        handle_mismatch(
                            config,
                            table_id,
                            &format!("missing fields under validate-only: {}", missing.join(", ")),
                        )
                    }
                }
            }
        }
    }
}

fn handle_mismatch(
    config: &SchemaSyncConfig,
    table: &str,
    message: &str,
) -> Result<Option<TableSyncOutcome>, ReplicationError> {
    match config.on_mismatch {
        OnMismatch::Error => Err(ReplicationError::schema_mismatch("schema_sync", message)
            .with_resource(table)
            .with_suggestion("enable autoCreateTable/autoCreateColumns, or switch strategy away from validate-only")),
        OnMismatch::Warn => {
            warn!(table, message, "schema mismatch (continuing, onMismatch=warn)");
            Ok(Some(TableSyncOutcome {
                table: table.to_string(),
                action: SyncAction::ValidatedNoChange,
            }))
        }
        OnMismatch::Ignore => Ok(None),
    }
}

fn db_error_to_replication_error(operation: &str, table: &str, err: DbError) -> ReplicationError {
    ReplicationError::from_provider_message(operation, &err.to_string()).with_resource(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::value::Value;
    use planner::query::dialect::Postgres;
    use std::sync::Mutex;

    struct FakeIntrospect {
        exists: bool,
        columns: Vec<String>,
        executed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SqlIntrospect for FakeIntrospect {
        async fn table_exists(&self, _table: &str) -> Result<bool, DbError> {
            Ok(self.exists)
        }
        async fn column_names(&self, _table: &str) -> Result<Vec<String>, DbError> {
            Ok(self.columns.clone())
        }
        async fn execute(&self, sql: &str, _params: &[Value]) -> Result<u64, DbError> {
            self.executed.lock().unwrap().push(sql.to_string());
            Ok(0)
        }
    }

    fn sample_schema() -> ResourceSchema {
        ResourceSchema::new("users")
            .with_attribute("id", "uuid|required")
            .with_attribute("email", "string|required|maxlength:120")
            .with_attribute("age", "number|min:0|max:130")
    }

    #[tokio::test]
    async fn alter_creates_missing_table() {
        let introspect = FakeIntrospect {
            exists: false,
            columns: Vec::new(),
            executed: Mutex::new(Vec::new()),
        };
        let outcome = sync_sql_table(&introspect, &Postgres, "users", Some("id"), &sample_schema())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.action, SyncAction::Created);
        assert_eq!(introspect.executed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn alter_adds_only_missing_columns() {
        let introspect = FakeIntrospect {
            exists: true,
            columns: vec!["id".to_string(), "email".to_string()],
            executed: Mutex::new(Vec::new()),
        };
        let outcome = sync_sql_table(&introspect, &Postgres, "users", Some("id"), &sample_schema())
            .await
            .unwrap()
            .unwrap();
        match outcome.action {
            SyncAction::Altered { added_columns } => assert_eq!(added_columns, vec!["age".to_string()]),
            other => panic!("expected Altered, got {other:?}"),
        }
        assert_eq!(introspect.executed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn alter_no_missing_columns_is_noop() {
        let introspect = FakeIntrospect {
            exists: true,
            columns: vec!["id".to_string(), "email".to_string(), "age".to_string()],
            executed: Mutex::new(Vec::new()),
        };
        let outcome = sync_sql_table(&introspect, &Postgres, "users", Some("id"), &sample_schema())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.action, SyncAction::ValidatedNoChange);
        assert!(introspect.executed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn validate_only_raises_on_missing_table_by_default() {
        let introspect = FakeIntrospect {
            exists: false,
            columns: Vec::new(),
            executed: Mutex::new(Vec::new()),
        };
        let config = SchemaSyncConfig {
            strategy: SyncStrategy::ValidateOnly,
            on_mismatch: OnMismatch::Error,
            ..Default::default()
        };
        let result = sync_sql_table_with_config(&introspect, &Postgres, "users", Some("id"), &sample_schema(), &config).await;
        assert!(result.is_err());
        assert!(introspect.executed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn validate_only_leaves_schema_untouched_when_consistent() {
        let introspect = FakeIntrospect {
            exists: true,
            columns: vec!["id".to_string(), "email".to_string(), "age".to_string()],
            executed: Mutex::new(Vec::new()),
        };
        let config = SchemaSyncConfig {
            strategy: SyncStrategy::ValidateOnly,
            on_mismatch: OnMismatch::Error,
            ..Default::default()
        };
        let outcome = sync_sql_table_with_config(&introspect, &Postgres, "users", Some("id"), &sample_schema(), &config)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.action, SyncAction::ValidatedNoChange);
        assert!(introspect.executed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn on_mismatch_ignore_swallows_missing_table() {
        let introspect = FakeIntrospect {
            exists: false,
            columns: Vec::new(),
            executed: Mutex::new(Vec::new()),
        };
        let config = SchemaSyncConfig {
            strategy: SyncStrategy::ValidateOnly,
            on_mismatch: OnMismatch::Ignore,
            ..Default::default()
        };
        let outcome = sync_sql_table_with_config(&introspect, &Postgres, "users", Some("id"), &sample_schema(), &config)
            .await
            .unwrap();
        assert!(outcome.is_none());
    }
}
