//! BigQuery driver (spec.md §4.5): three mutability modes chosen per
//! destination route (`Destination::mutability`, defaulting to
//! `AppendOnly` when unset).
//!
//! - `append-only`: every write is an `insertAll` row carrying
//!   `_operation_type`/`_operation_timestamp`; `update`/`delete` become
//!   inserts too.
//! - `mutable`: `update`/`delete` issue `UPDATE`/`DELETE` DML through
//!   `jobs.query`, with a streaming-buffer retry (wait 30s, retry once).
//! - `immutable`: append-only plus `_is_deleted` and a per-id monotonic
//!   `_version` counter, tracked in-process only (spec.md §5).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use connectors::warehouse::bigquery::BigQueryAdapter;
use engine_core::{
    batch_pool::BatchPool,
    metrics::Metrics,
    replicator::Replicator,
    schema_sync::{self, SchemaSyncConfig},
    state::{self, DriverState},
};
use model::{
    batch::{ReplicateBatchResult, ReplicateResult, RouteOutcome},
    core::value::{DataMap, Value},
    error::{ErrorKind, ReplicationError},
    event::{EventTuple, Operation},
    resource::ResourceSchema,
    route::{Destination, Mutability, RouteConfig},
    status::ReplicatorStatus,
};
use tokio::time::sleep;
use tracing::{error, warn};

use crate::common::{self, ResourceRoutes};

#[derive(Clone)]
pub struct BigQueryDriverConfig {
    pub enabled: bool,
    pub batch_concurrency: usize,
    pub service_account_key_path: String,
    pub project_id: String,
    pub dataset_id: String,
    pub routes: HashMap<String, RouteConfig>,
    pub schemas: HashMap<String, ResourceSchema>,
    pub schema_sync: SchemaSyncConfig,
    pub default_resource: Option<String>,
}

impl Default for BigQueryDriverConfig {
    fn default() -> Self {
        BigQueryDriverConfig {
            enabled: true,
            batch_concurrency: engine_core::batch_pool::DEFAULT_CONCURRENCY,
            service_account_key_path: String::new(),
            project_id: String::new(),
            dataset_id: String::new(),
            routes: HashMap::new(),
            schemas: HashMap::new(),
            schema_sync: SchemaSyncConfig::default(),
            default_resource: None,
        }
    }
}

pub struct BigQueryDriver {
    config: BigQueryDriverConfig,
    adapter: Option<BigQueryAdapter>,
    routes: ResourceRoutes,
    state: DriverState,
    metrics: Metrics,
    /// `table:id -> version`, incremented on every immutable-mode write
    /// (spec.md §5: monotonic per id, process-local only).
    version_counters: Mutex<HashMap<String, i64>>,
}

pub fn driver(config: BigQueryDriverConfig) -> BigQueryDriver {
    let routes = ResourceRoutes::from_config(&config.routes);
    BigQueryDriver {
        config,
        adapter: None,
        routes,
        state: DriverState::Created,
        metrics: Metrics::default(),
        version_counters: Mutex::new(HashMap::new()),
    }
}

impl BigQueryDriver {
    fn mutability_of(destination: &Destination) -> Mutability {
        destination.mutability.unwrap_or(Mutability::AppendOnly)
    }

    fn next_version(&self, table: &str, id: &str) -> i64 {
        let key = format!("{table}:{id}");
        let mut counters = self.version_counters.lock().expect("version counter lock poisoned");
        let entry = counters.entry(key).or_insert(0);
        *entry += 1;
        *entry
    }

    async fn write_append_only(
        &self,
        adapter: &BigQueryAdapter,
        destination: &Destination,
        event: &EventTuple,
        with_version: bool,
    ) -> Result<(), connectors::error::DbError> {
        let mut row = common::prepare_payload(destination, &event.data, &[]);
        row.insert("_operation_type".to_string(), Value::String(event.operation.as_str().to_string()));
        row.insert("_operation_timestamp".to_string(), Value::Timestamp(Utc::now()));
        if with_version {
            row.insert(
                "_is_deleted".to_string(),
                Value::Boolean(event.operation == Operation::Delete),
            );
            row.insert(
                "_version".to_string(),
                Value::Int(self.next_version(&destination.target, &event.id)),
            );
        }
        adapter.insert_rows(&destination.target, vec![row]).await
    }

    async fn run_dml_with_streaming_retry(
        &self,
        adapter: &BigQueryAdapter,
        sql: &str,
    ) -> Result<(), connectors::error::DbError> {
        match adapter.run_query(sql).await {
            Ok(()) => Ok(()),
            Err(err) => {
                let message = err.to_string();
                if message.to_ascii_lowercase().contains("streaming buffer") {
                    warn!(sql, "BigQuery streaming buffer error, retrying once after 30s");
                    sleep(Duration::from_secs(30)).await;
                    adapter.run_query(sql).await
                } else {
                    error!(sql, error = %message, "BigQuery DML failed");
                    Err(err)
                }
            }
        }
    }

    fn table_ref(&self, adapter: &BigQueryAdapter, table: &str) -> String {
        format!("`{}.{}.{}`", adapter.project_id(), adapter.dataset_id(), table)
    }

    async fn write_one(&self, destination: &Destination, event: &EventTuple) -> RouteOutcome {
        let Some(adapter) = &self.adapter else {
            return RouteOutcome::failed(destination.target.clone(), "driver not initialized");
        };

        let mutability = Self::mutability_of(destination);
        let result = match mutability {
            Mutability::AppendOnly => self.write_append_only(adapter, destination, event, false).await,
            Mutability::Immutable => self.write_append_only(adapter, destination, event, true).await,
            Mutability::Mutable => match event.operation {
                Operation::Insert => {
                    let row = common::prepare_payload(destination, &event.data, &[]);
                    adapter.insert_rows(&destination.target, vec![row]).await
                }
                Operation::Update => {
                    let payload = common::prepare_payload(destination, &event.data, &[]);
                    let sql = render_update(&self.table_ref(adapter, &destination.target), &payload, &event.id);
                    self.run_dml_with_streaming_retry(adapter, &sql).await
                }
                Operation::Delete => {
                    let sql = render_delete(&self.table_ref(adapter, &destination.target), &event.id);
                    self.run_dml_with_streaming_retry(adapter, &sql).await
                }
            },
        };

        match result {
            Ok(()) => {
                self.metrics.increment_records(1).await;
                RouteOutcome::ok(destination.target.clone())
            }
            Err(err) => {
                self.metrics.increment_failures(1);
                RouteOutcome::failed(destination.target.clone(), err.to_string())
            }
        }
    }
}

fn render_update(table: &str, payload: &DataMap, id: &str) -> String {
    let assignments: Vec<String> = payload
        .iter()
        .map(|(col, val)| format!("{col} = {}", bq_literal(val)))
        .collect();
    format!(
        "UPDATE {table} SET {} WHERE id = {}",
        assignments.join(", "),
        bq_literal(&Value::String(id.to_string()))
    )
}

fn render_delete(table: &str, id: &str) -> String {
    format!("DELETE FROM {table} WHERE id = {}", bq_literal(&Value::String(id.to_string())))
}

/// Renders a `Value` as a BigQuery Standard SQL literal. Strings/dates are
/// single-quoted with embedded quotes escaped; everything else is
/// formatted in its native numeric/boolean syntax.
fn bq_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Decimal(d) => d.to_string(),
        Value::Date(d) => format!("DATE '{d}'"),
        Value::Timestamp(t) => format!("TIMESTAMP '{}'", t.to_rfc3339()),
        Value::String(s) => format!("'{}'", s.replace('\'', "\\'")),
        Value::Uuid(u) => format!("'{u}'"),
        Value::Bytes(_) | Value::Array(_) | Value::Json(_) => {
            format!("'{}'", value.to_display_string().replace('\'', "\\'"))
        }
    }
}

#[async_trait]
impl Replicator for BigQueryDriver {
    fn driver_name(&self) -> &'static str {
        "bigquery"
    }

    fn validate_config(&self) -> model::validation::ValidationResult {
        let mut errors = Vec::new();
        common::validate_common(&mut errors, self.config.batch_concurrency, &self.config.routes);
        if self.config.project_id.is_empty() {
            errors.push("bigquery.projectId must not be empty".to_string());
        }
        if self.config.dataset_id.is_empty() {
            errors.push("bigquery.datasetId must not be empty".to_string());
        }
        model::validation::ValidationResult::from_errors(errors)
    }

    async fn initialize(&mut self, destinations: Vec<Destination>) -> Result<(), ReplicationError> {
        if self.state == DriverState::Ready {
            return Ok(());
        }
        let validation = self.validate_config();
        if !validation.valid {
            self.state = DriverState::Failed;
            return Err(ReplicationError::configuration("initialize", validation.errors.join("; "))
                .with_suggestion("fix the reported configuration errors and re-initialize"));
        }
        self.state = state::transition(self.state, DriverState::Initializing)
            .map_err(|e| ReplicationError::new(ErrorKind::InvalidState, "initialize", e.to_string(), false))?;

        if !destinations.is_empty() {
            if let Some(resource) = self.config.default_resource.clone() {
                self.routes.insert(resource, destinations);
            }
        }

        let adapter = BigQueryAdapter::connect(
            &self.config.service_account_key_path,
            &self.config.project_id,
            &self.config.dataset_id,
        )
        .await
        .map_err(|e| {
            self.state = DriverState::Failed;
            ReplicationError::connectivity("initialize", e.to_string())
        })?;

        if self.config.schema_sync.enabled {
            for (resource, schema) in &self.config.schemas {
                let Some(destinations) = self.routes.for_resource(resource) else { continue };
                for destination in destinations {
                    let outcome = schema_sync::sync_bigquery_table(
                        &adapter,
                        &destination.target,
                        schema,
                        Self::mutability_of(destination),
                        destination.table_options.as_ref(),
                        &self.config.schema_sync,
                    )
                    .await
                    .map_err(|e| {
                        self.state = DriverState::Failed;
                        e
                    })?;
                    if let Some(outcome) = outcome {
                        tracing::debug!(table = %outcome.table, action = ?outcome.action, "BigQuery schema sync completed");
                    }
                }
            }
        }

        self.adapter = Some(adapter);
        self.state = state::transition(self.state, DriverState::Ready)
            .map_err(|e| ReplicationError::new(ErrorKind::InvalidState, "initialize", e.to_string(), false))?;
        Ok(())
    }

    async fn replicate(&self, event: &EventTuple) -> Result<ReplicateResult, ReplicationError> {
        if !self.state.accepts_events() {
            return Err(ReplicationError::invalid_state("replicate"));
        }

        let destinations = match common::resolve_destinations(self.config.enabled, &self.routes, event) {
            Ok(destinations) => destinations,
            Err(reason) => return Ok(ReplicateResult::skipped(reason.message())),
        };

        let mut outcomes = Vec::with_capacity(destinations.len());
        for destination in destinations {
            outcomes.push(self.write_one(destination, event).await);
        }
        Ok(ReplicateResult::from_route_outcomes(outcomes))
    }

    async fn replicate_batch(&self, events: &[EventTuple]) -> Result<ReplicateBatchResult, ReplicationError> {
        if !self.state.accepts_events() {
            return Err(ReplicationError::invalid_state("replicateBatch"));
        }
        if events.is_empty() {
            return Ok(ReplicateBatchResult::empty());
        }

        let pool = BatchPool::new(self.config.batch_concurrency.max(1));
        let outcome = pool
            .run(
                events.to_vec(),
                |event| async move { self.replicate(&event).await },
                |e: &ReplicationError| e.message.clone(),
            )
            .await;

        let mut results = outcome.results;
        results.extend(outcome.errors.iter().map(|e| ReplicateResult {
            success: false,
            skipped: false,
            skip_reason: None,
            results: Vec::new(),
            errors: vec![e.error.clone()],
            tables: Vec::new(),
        }));
        Ok(ReplicateBatchResult::from_results(results))
    }

    async fn test_connection(&self) -> Result<bool, ReplicationError> {
        match &self.adapter {
            Some(adapter) => {
                let table = self.routes.resources().into_iter().next();
                match table.and_then(|r| self.routes.for_resource(&r).and_then(|d| d.first().cloned())) {
                    Some(destination) => Ok(adapter.table_exists(&destination.target).await.unwrap_or(false)),
                    None => Ok(true),
                }
            }
            None => Ok(false),
        }
    }

    fn status(&self) -> ReplicatorStatus {
        let mut status = ReplicatorStatus::new("bigquery", "bigquery");
        status.enabled = self.config.enabled;
        status.connected = self.adapter.is_some();
        status.resources = self.routes.resources();
        status.version_counters_tracked = self
            .routes
            .resources()
            .iter()
            .filter_map(|r| self.routes.for_resource(r))
            .flatten()
            .any(|d| Self::mutability_of(d) == Mutability::Immutable);
        status
    }

    fn state(&self) -> DriverState {
        self.state
    }

    async fn close(&mut self) -> Result<(), ReplicationError> {
        if self.state == DriverState::Closed {
            return Ok(());
        }
        self.adapter = None;
        self.state = state::transition(self.state, DriverState::Closed).unwrap_or(DriverState::Closed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_in_created_state() {
        let replicator = driver(BigQueryDriverConfig::default());
        assert_eq!(replicator.state(), DriverState::Created);
    }

    #[test]
    fn update_literal_quotes_strings_and_escapes() {
        let mut payload = DataMap::new();
        payload.insert("name".to_string(), Value::String("O'Brien".to_string()));
        let sql = render_update("`p.d.t`", &payload, "42");
        assert!(sql.contains("name = 'O\\'Brien'"));
        assert!(sql.contains("WHERE id = '42'"));
    }

    #[test]
    fn delete_literal_targets_id() {
        let sql = render_delete("`p.d.t`", "7");
        assert_eq!(sql, "DELETE FROM `p.d.t` WHERE id = '7'");
    }

    #[test]
    fn version_counter_is_monotonic_per_id() {
        let replicator = driver(BigQueryDriverConfig::default());
        assert_eq!(replicator.next_version("orders", "1"), 1);
        assert_eq!(replicator.next_version("orders", "1"), 2);
        assert_eq!(replicator.next_version("orders", "2"), 1);
    }
}
