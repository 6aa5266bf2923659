//! MongoDB driver (spec.md §4.5): `insertOne`/`updateOne` become a single
//! `replaceOne(upsert: true)` against `_id`; deletes go through
//! `deleteOne`. Unlike the SQL drivers, `_id` is kept in the payload
//! (spec.md's internal-field convention exempts it).

use async_trait::async_trait;
use connectors::document::mongodb::MongoAdapter;
use engine_core::{
    batch_pool::BatchPool,
    metrics::Metrics,
    replicator::Replicator,
    state::{self, DriverState},
};
use model::{
    batch::{ReplicateBatchResult, ReplicateResult, RouteOutcome},
    error::{ErrorKind, ReplicationError},
    event::{EventTuple, Operation},
    route::{Destination, RouteConfig},
    status::ReplicatorStatus,
};
use std::collections::HashMap;

use crate::common::{self, ResourceRoutes};

const KEEP_MONGO_ID: &[&str] = &["_id"];

#[derive(Clone)]
pub struct MongoDriverConfig {
    pub enabled: bool,
    pub batch_concurrency: usize,
    pub routes: HashMap<String, RouteConfig>,
    pub log_collection: Option<String>,
    pub default_resource: Option<String>,
}

impl Default for MongoDriverConfig {
    fn default() -> Self {
        MongoDriverConfig {
            enabled: true,
            batch_concurrency: engine_core::batch_pool::DEFAULT_CONCURRENCY,
            routes: HashMap::new(),
            log_collection: None,
            default_resource: None,
        }
    }
}

pub struct MongoDriver {
    conn_str: String,
    database: String,
    config: MongoDriverConfig,
    adapter: Option<MongoAdapter>,
    routes: ResourceRoutes,
    state: DriverState,
    metrics: Metrics,
}

pub fn driver(conn_str: impl Into<String>, database: impl Into<String>, config: MongoDriverConfig) -> MongoDriver {
    let routes = ResourceRoutes::from_config(&config.routes);
    MongoDriver {
        conn_str: conn_str.into(),
        database: database.into(),
        config,
        adapter: None,
        routes,
        state: DriverState::Created,
        metrics: Metrics::default(),
    }
}

impl MongoDriver {
    async fn write_one(&self, destination: &Destination, event: &EventTuple) -> RouteOutcome {
        let Some(adapter) = &self.adapter else {
            return RouteOutcome::failed(destination.target.clone(), "driver not initialized");
        };

        let result = match event.operation {
            Operation::Insert | Operation::Update => {
                let payload = common::prepare_payload(destination, &event.data, KEEP_MONGO_ID);
                let id = model::core::value::Value::String(event.id.clone());
                adapter.upsert(&destination.target, &id, payload).await
            }
            Operation::Delete => {
                let id = model::core::value::Value::String(event.id.clone());
                adapter.delete(&destination.target, &id).await
            }
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

    async fn write_log_row(&self, event: &EventTuple) {
        let Some(collection) = &self.config.log_collection else { return };
        let Some(adapter) = &self.adapter else { return };
        let row = common::log_row(event, common::REPLICATOR_SOURCE);
        let id = model::core::value::Value::String(uuid::Uuid::new_v4().to_string());
        if let Err(err) = adapter.upsert(collection, &id, row).await {
            tracing::warn!(collection, error = %err, "log-collection insert failed");
        }
    }
}

#[async_trait]
impl Replicator for MongoDriver {
    fn driver_name(&self) -> &'static str {
        "mongodb"
    }

    fn validate_config(&self) -> model::validation::ValidationResult {
        let mut errors = Vec::new();
        common::validate_common(&mut errors, self.config.batch_concurrency, &self.config.routes);
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

        let adapter = MongoAdapter::connect(&self.conn_str, &self.database).await.map_err(|e| {
            self.state = DriverState::Failed;
            ReplicationError::connectivity("initialize", e.to_string())
        })?;

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
            Some(adapter) => Ok(adapter.collection_exists("__connectivity_probe__").await.is_ok()),
            None => Ok(false),
        }
    }

    fn status(&self) -> ReplicatorStatus {
        let mut status = ReplicatorStatus::new("mongodb", "mongodb");
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
        let replicator = driver("mongodb://localhost", "s3db", MongoDriverConfig::default());
        assert_eq!(replicator.state(), DriverState::Created);
    }
}
