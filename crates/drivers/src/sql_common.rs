//! Shared engine behind the Postgres, MySQL/MariaDB/PlanetScale, and
//! SQLite/Turso drivers (spec.md §4.5): all three speak through
//! `engine_core::schema_sync::SqlIntrospect`, so one generic
//! `SqlReplicator<A>` implements the `Replicator` contract for whichever
//! adapter `A` is plugged in; only connection-string shape and dialect
//! choice differ per driver (handled in each driver's own module).

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use connectors::error::ConnectorError;
use engine_core::{
    batch_pool::BatchPool,
    metrics::Metrics,
    replicator::Replicator,
    retry::RetryPolicy,
    schema_sync::{self, SchemaSyncConfig, SqlIntrospect},
    state::{self, DriverState},
};
use model::{
    batch::{ReplicateBatchResult, ReplicateResult, RouteOutcome},
    core::value::{DataMap, Value},
    error::{ErrorKind, ReplicationError},
    event::{EventTuple, Operation},
    resource::ResourceSchema,
    route::{Destination, RouteConfig},
    status::ReplicatorStatus,
};
use planner::{
    query::{
        ast::insert::OnConflict,
        builder::{delete::DeleteBuilder, insert::InsertBuilder},
        dialect::Dialect,
        renderer::render,
        value,
    },
    table_ref,
};
use tracing::warn;

use crate::common::{self, ResourceRoutes};

pub type ConnectFuture<A> = Pin<Box<dyn Future<Output = Result<A, ConnectorError>> + Send>>;
type Connector<A> = Box<dyn Fn() -> ConnectFuture<A> + Send + Sync>;

#[derive(Clone)]
pub struct SqlDriverConfig {
    pub enabled: bool,
    pub batch_concurrency: usize,
    pub routes: HashMap<String, RouteConfig>,
    pub schemas: HashMap<String, ResourceSchema>,
    pub schema_sync: SchemaSyncConfig,
    pub log_table: Option<String>,
    /// Resource that `initialize()`'s explicit `destinations` argument
    /// (the ad hoc/CLI path) is registered under, if any.
    pub default_resource: Option<String>,
}

impl Default for SqlDriverConfig {
    fn default() -> Self {
        SqlDriverConfig {
            enabled: true,
            batch_concurrency: engine_core::batch_pool::DEFAULT_CONCURRENCY,
            routes: HashMap::new(),
            schemas: HashMap::new(),
            schema_sync: SchemaSyncConfig::default(),
            log_table: None,
            default_resource: None,
        }
    }
}

pub struct SqlReplicator<A: SqlIntrospect + 'static> {
    driver_name: &'static str,
    dialect: Box<dyn Dialect>,
    connect: Connector<A>,
    adapter: Option<A>,
    config: SqlDriverConfig,
    routes: ResourceRoutes,
    state: DriverState,
    metrics: Metrics,
}

impl<A: SqlIntrospect + 'static> SqlReplicator<A> {
    pub fn new(
        driver_name: &'static str,
        dialect: Box<dyn Dialect>,
        connect: Connector<A>,
        config: SqlDriverConfig,
    ) -> Self {
        let routes = ResourceRoutes::from_config(&config.routes);
        SqlReplicator {
            driver_name,
            dialect,
            connect,
            adapter: None,
            config,
            routes,
            state: DriverState::Created,
            metrics: Metrics::default(),
        }
    }

    fn adapter(&self) -> Result<&A, ReplicationError> {
        self.adapter.as_ref().ok_or_else(|| ReplicationError::invalid_state("replicate"))
    }

    fn state_error(operation: &str, transition_err: impl std::fmt::Display) -> ReplicationError {
        ReplicationError::new(ErrorKind::InvalidState, operation, transition_err.to_string(), false)
    }

    async fn write_one(&self, destination: &Destination, event: &EventTuple) -> Result<RouteOutcome, String> {
        let adapter = self.adapter.as_ref().ok_or("driver not initialized")?;
        let primary_key = destination.primary_key.as_str();

        let result = match event.operation {
            Operation::Insert | Operation::Update => {
                let payload = common::prepare_payload(destination, &event.data, &[]);
                let (sql, params) = render_insert(self.dialect.as_ref(), &destination.target, primary_key, &payload);
                adapter.execute(&sql, &params).await.map(|_| ())
            }
            Operation::Delete => {
                let (sql, params) = render_delete(self.dialect.as_ref(), &destination.target, primary_key, &event.id);
                adapter.execute(&sql, &params).await.map(|_| ())
            }
        };

        match result {
            Ok(()) => {
                self.metrics.increment_records(1).await;
                Ok(RouteOutcome::ok(destination.target.clone()))
            }
            Err(err) => {
                self.metrics.increment_failures(1);
                Ok(RouteOutcome::failed(destination.target.clone(), err.to_string()))
            }
        }
    }

    async fn write_log_row(&self, event: &EventTuple) {
        let Some(log_table) = &self.config.log_table else { return };
        let Some(adapter) = &self.adapter else { return };
        let row = common::log_row(event, common::REPLICATOR_SOURCE);
        let (sql, params) = render_insert(self.dialect.as_ref(), log_table, "id", &row);
        // Log-table failures never fail the primary write (spec.md §4.1).
        if let Err(err) = adapter.execute(&sql, &params).await {
            warn!(table = %log_table, error = %err, "log-table insert failed");
        }
    }
}

#[async_trait]
impl<A: SqlIntrospect + Send + Sync + 'static> Replicator for SqlReplicator<A> {
    fn driver_name(&self) -> &'static str {
        self.driver_name
    }

    fn validate_config(&self) -> model::validation::ValidationResult {
        let mut errors = Vec::new();
        common::validate_common(&mut errors, self.config.batch_concurrency, &self.config.routes);
        model::validation::ValidationResult::from_errors(errors)
    }

    async fn initialize(&mut self, destinations: Vec<Destination>) -> Result<(), ReplicationError> {
        if self.state == DriverState::Ready {
            return Ok(()); // idempotent re-entry (spec.md §2 invariant)
        }
        let validation = self.validate_config();
        if !validation.valid {
            self.state = DriverState::Failed;
            return Err(ReplicationError::configuration("initialize", validation.errors.join("; "))
                .with_suggestion("fix the reported configuration errors and re-initialize"));
        }
        self.state = state::transition(self.state, DriverState::Initializing)
            .map_err(|e| Self::state_error("initialize", e))?;

        if !destinations.is_empty() {
            if let Some(resource) = self.config.default_resource.clone() {
                self.routes.insert(resource, destinations);
            }
        }

        let adapter = (self.connect)().await.map_err(|e| {
            self.state = DriverState::Failed;
            ReplicationError::connectivity("initialize", e.to_string())
        })?;

        // Connectivity probe: lightest possible read (spec.md §4.1).
        if let Err(e) = adapter.execute("SELECT 1", &[]).await {
            self.state = DriverState::Failed;
            return Err(ReplicationError::connectivity("initialize.probe", e.to_string()));
        }

        if self.config.schema_sync.enabled {
            for (resource, schema) in &self.config.schemas {
                let Some(destinations) = self.routes.for_resource(resource) else { continue };
                for destination in destinations {
                    let outcome = schema_sync::sync_sql_table_with_config(
                        &adapter,
                        self.dialect.as_ref(),
                        &destination.target,
                        Some(destination.primary_key.as_str()),
                        schema,
                        &self.config.schema_sync,
                    )
                    .await
                    .map_err(|e| {
                        self.state = DriverState::Failed;
                        e
                    })?;
                    if let Some(outcome) = outcome {
                        tracing::debug!(table = %outcome.table, action = ?outcome.action, "schema sync completed");
                    }
                }
            }
        }

        self.adapter = Some(adapter);
        self.state = state::transition(self.state, DriverState::Ready)
            .map_err(|e| Self::state_error("initialize", e))?;
        Ok(())
    }

    async fn replicate(&self, event: &EventTuple) -> Result<ReplicateResult, ReplicationError> {
        if !self.state.accepts_events() {
            return Err(ReplicationError::invalid_state("replicate"));
        }
        self.adapter()?;

        let destinations = match common::resolve_destinations(self.config.enabled, &self.routes, event) {
            Ok(destinations) => destinations,
            Err(reason) => return Ok(ReplicateResult::skipped(reason.message())),
        };

        let mut outcomes = Vec::with_capacity(destinations.len());
        for destination in destinations {
            match self.write_one(destination, event).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => outcomes.push(RouteOutcome::failed(destination.target.clone(), err)),
            }
        }

        self.write_log_row(event).await;
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
            Some(adapter) => Ok(adapter.execute("SELECT 1", &[]).await.is_ok()),
            None => Ok(false),
        }
    }

    fn status(&self) -> ReplicatorStatus {
        let mut status = ReplicatorStatus::new(self.driver_name, self.driver_name);
        status.enabled = self.config.enabled;
        status.connected = self.adapter.is_some();
        status.resources = self.routes.resources();
        status
    }

    fn state(&self) -> DriverState {
        self.state
    }

    async fn close(&mut self) -> Result<(), ReplicationError> {
        if self.state == DriverState::Closed {
            return Ok(());
        }
        if matches!(self.state, DriverState::Ready) {
            self.state = state::transition(self.state, DriverState::Draining)
                .map_err(|e| Self::state_error("close", e))?;
        }
        self.adapter = None;
        self.state = state::transition(self.state, DriverState::Closed)
            .unwrap_or(DriverState::Closed);
        Ok(())
    }
}

/// `retriable=true` HTTP/DB destinations reuse `RetryPolicy::for_database`
/// the same way the webhook driver reuses `for_http` — exposed so each
/// concrete driver file can wrap transient provider errors consistently.
pub fn database_retry_policy() -> RetryPolicy {
    RetryPolicy::for_database()
}

pub fn render_insert(dialect: &dyn Dialect, table: &str, primary_key: &str, payload: &DataMap) -> (String, Vec<Value>) {
    let mut builder = InsertBuilder::new(table_ref!(table));
    for (column, val) in payload {
        builder = builder.column(column.as_str(), value(val.clone()));
    }
    let on_conflict = if dialect.supports_on_conflict() {
        OnConflict::DoNothing {
            columns: vec![primary_key.to_string()],
        }
    } else {
        OnConflict::OnDuplicateKeyNoop {
            column: primary_key.to_string(),
        }
    };
    builder = builder.on_conflict(on_conflict);
    if dialect.supports_on_conflict() {
        builder = builder.returning();
    }
    render(&builder.build(), dialect)
}

pub fn render_delete(dialect: &dyn Dialect, table: &str, primary_key: &str, id: &str) -> (String, Vec<Value>) {
    let mut builder = DeleteBuilder::new(table_ref!(table), primary_key);
    if dialect.supports_on_conflict() {
        builder = builder.returning();
    }
    let ast = builder.build();
    let (sql, _placeholder_params) = render(&ast, dialect);
    (sql, vec![Value::String(id.to_string())])
}
