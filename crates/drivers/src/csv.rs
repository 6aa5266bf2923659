//! CSV driver (spec.md §4.5/§6): appends one row per event to a file
//! derived from the destination's target path; the header row is
//! written once and columns are lexicographically ordered by
//! `connectors::sinkfile::csv::CsvAdapter` (a `DataMap` is a `BTreeMap`).

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use connectors::sinkfile::csv::CsvAdapter;
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
use std::sync::Mutex;

use crate::common::{self, ResourceRoutes, RotationPolicy};

#[derive(Clone)]
pub struct CsvDriverConfig {
    pub enabled: bool,
    pub batch_concurrency: usize,
    pub rotation: RotationPolicy,
    pub routes: HashMap<String, RouteConfig>,
    pub default_resource: Option<String>,
}

impl Default for CsvDriverConfig {
    fn default() -> Self {
        CsvDriverConfig {
            enabled: true,
            batch_concurrency: engine_core::batch_pool::DEFAULT_CONCURRENCY,
            rotation: RotationPolicy::None,
            routes: HashMap::new(),
            default_resource: None,
        }
    }
}

pub struct CsvDriver {
    config: CsvDriverConfig,
    routes: ResourceRoutes,
    state: DriverState,
    metrics: Metrics,
    /// One adapter per resolved file path, kept open across writes so the
    /// "header written once" flag isn't lost between calls.
    adapters: Mutex<HashMap<PathBuf, std::sync::Arc<CsvAdapter>>>,
}

pub fn driver(config: CsvDriverConfig) -> CsvDriver {
    let routes = ResourceRoutes::from_config(&config.routes);
    CsvDriver {
        config,
        routes,
        state: DriverState::Created,
        metrics: Metrics::default(),
        adapters: Mutex::new(HashMap::new()),
    }
}

impl CsvDriver {
    fn adapter_for(&self, path: &std::path::Path) -> Result<std::sync::Arc<CsvAdapter>, ReplicationError> {
        let mut adapters = self.adapters.lock().expect("csv adapter map poisoned");
        if let Some(adapter) = adapters.get(path) {
            return Ok(adapter.clone());
        }
        let adapter = std::sync::Arc::new(
            CsvAdapter::new(path).map_err(|e| ReplicationError::connectivity("replicate", e.to_string()))?,
        );
        adapters.insert(path.to_path_buf(), adapter.clone());
        Ok(adapter)
    }

    fn write_one(&self, destination: &Destination, event: &EventTuple) -> RouteOutcome {
        if common::is_unsupported_file_delete(event.operation) {
            return RouteOutcome::ok(destination.target.clone());
        }

        let base = PathBuf::from(&destination.target);
        let path = common::rotated_path(&base, "csv", self.config.rotation);
        if let Err(err) = common::rotate_if_oversized(&path, self.config.rotation) {
            return RouteOutcome::failed(destination.target.clone(), err.to_string());
        }

        let adapter = match self.adapter_for(&path) {
            Ok(adapter) => adapter,
            Err(err) => return RouteOutcome::failed(destination.target.clone(), err.to_string()),
        };

        let row = common::prepare_payload(destination, &event.data, &[]);
        match adapter.append(&row) {
            Ok(()) => RouteOutcome::ok(destination.target.clone()),
            Err(err) => RouteOutcome::failed(destination.target.clone(), err.to_string()),
        }
    }
}

#[async_trait]
impl Replicator for CsvDriver {
    fn driver_name(&self) -> &'static str {
        "csv"
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

        if event.operation == Operation::Delete {
            return Ok(ReplicateResult::skipped("file sinks do not support deletes"));
        }

        let mut outcomes = Vec::with_capacity(destinations.len());
        for destination in destinations {
            let outcome = self.write_one(destination, event);
            if outcome.success {
                self.metrics.increment_records(1).await;
            } else {
                self.metrics.increment_failures(1);
            }
            outcomes.push(outcome);
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
        Ok(true)
    }

    fn status(&self) -> ReplicatorStatus {
        let mut status = ReplicatorStatus::new("csv", "csv");
        status.enabled = self.config.enabled;
        status.connected = true;
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
        self.adapters.lock().expect("csv adapter map poisoned").clear();
        self.state = state::transition(self.state, DriverState::Closed).unwrap_or(DriverState::Closed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::value::{DataMap, Value};

    #[tokio::test]
    async fn writes_header_once_then_rows() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("orders");
        let mut routes = HashMap::new();
        routes.insert(
            "orders".to_string(),
            RouteConfig::Parsed(model::route::RouteConfigInput::Single(target.to_string_lossy().to_string())),
        );
        let mut replicator = driver(CsvDriverConfig {
            routes,
            ..CsvDriverConfig::default()
        });
        replicator.initialize(Vec::new()).await.unwrap();

        for i in 0..3 {
            let mut data = DataMap::new();
            data.insert("amount".to_string(), Value::Int(i));
            let event = EventTuple::new("orders", Operation::Insert, data, i.to_string());
            let result = replicator.replicate(&event).await.unwrap();
            assert!(result.success);
        }

        let content = std::fs::read_to_string(target.with_extension("csv")).unwrap();
        assert_eq!(content.lines().count(), 4); // header + 3 rows
    }
}
