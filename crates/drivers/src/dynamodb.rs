//! DynamoDB driver (spec.md §4.5): `PutItem`/`DeleteItem` against a single
//! table per destination, keyed by the destination's `primary_key` route
//! option (defaulting to `"id"`). A `sort_key` option is carried through
//! to the item but DynamoDB's composite-key `DeleteItem` still needs both
//! values, so deletes require the full before-image when a sort key is
//! configured.

use async_trait::async_trait;
use connectors::kv::dynamodb::DynamoDbAdapter;
use engine_core::{
    batch_pool::BatchPool,
    metrics::Metrics,
    replicator::Replicator,
    state::{self, DriverState},
};
use model::{
    batch::{ReplicateBatchResult, ReplicateResult, RouteOutcome},
    core::value::Value,
    error::{ErrorKind, ReplicationError},
    event::{EventTuple, Operation},
    route::{Destination, RouteConfig},
    status::ReplicatorStatus,
};
use std::collections::HashMap;

use crate::common::{self, ResourceRoutes};

#[derive(Clone)]
pub struct DynamoDbDriverConfig {
    pub enabled: bool,
    pub batch_concurrency: usize,
    pub region: Option<String>,
    pub routes: HashMap<String, RouteConfig>,
    pub default_resource: Option<String>,
}

impl Default for DynamoDbDriverConfig {
    fn default() -> Self {
        DynamoDbDriverConfig {
            enabled: true,
            batch_concurrency: engine_core::batch_pool::DEFAULT_CONCURRENCY,
            region: None,
            routes: HashMap::new(),
            default_resource: None,
        }
    }
}

pub struct DynamoDbDriver {
    config: DynamoDbDriverConfig,
    adapter: Option<DynamoDbAdapter>,
    routes: ResourceRoutes,
    state: DriverState,
    metrics: Metrics,
}

pub fn driver(config: DynamoDbDriverConfig) -> DynamoDbDriver {
    let routes = ResourceRoutes::from_config(&config.routes);
    DynamoDbDriver {
        config,
        adapter: None,
        routes,
        state: DriverState::Created,
        metrics: Metrics::default(),
    }
}

impl DynamoDbDriver {
    async fn write_one(&self, destination: &Destination, event: &EventTuple) -> RouteOutcome {
        let Some(adapter) = &self.adapter else {
            return RouteOutcome::failed(destination.target.clone(), "driver not initialized");
        };

        let result = match event.operation {
            Operation::Insert | Operation::Update => {
                let payload = common::prepare_payload(destination, &event.data, &[]);
                adapter.put_item(&destination.target, payload).await
            }
            Operation::Delete => {
                let id = Value::String(event.id.clone());
                adapter.delete_item(&destination.target, &destination.primary_key, &id).await
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
}

#[async_trait]
impl Replicator for DynamoDbDriver {
    fn driver_name(&self) -> &'static str {
        "dynamodb"
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

        let adapter = DynamoDbAdapter::connect(self.config.region.as_deref()).await.map_err(|e| {
            self.state = DriverState::Failed;
            ReplicationError::connectivity("initialize", e.to_string())
        })?;

        // Probe every routed table exists (or auto-created out-of-band; spec.md
        // §4.3 notes DynamoDB tables are provisioned/throughput-configured
        // outside this engine, so sync here is read-only validation).
        for resource in self.routes.resources() {
            let Some(destinations) = self.routes.for_resource(&resource) else { continue };
            for destination in destinations {
                if let Ok(false) = adapter.table_exists(&destination.target).await {
                    tracing::warn!(table = %destination.target, "DynamoDB table does not exist");
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
        let mut status = ReplicatorStatus::new("dynamodb", "dynamodb");
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
        let replicator = driver(DynamoDbDriverConfig::default());
        assert_eq!(replicator.state(), DriverState::Created);
    }
}
