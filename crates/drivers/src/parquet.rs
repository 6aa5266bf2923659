//! Parquet driver (spec.md §4.5/§6): buffers rows in memory per
//! destination file and flushes one row group either when the buffer
//! reaches `rowGroupSize` or on `close()`. Deletes are skipped — Parquet
//! has no in-place row removal.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use connectors::sinkfile::parquet::ParquetAdapter;
use engine_core::{
    batch_pool::BatchPool,
    metrics::Metrics,
    replicator::Replicator,
    state::{self, DriverState},
};
use model::{
    batch::{ReplicateBatchResult, ReplicateResult, RouteOutcome},
    core::value::DataMap,
    error::{ErrorKind, ReplicationError},
    event::{EventTuple, Operation},
    route::{Destination, RouteConfig},
    status::ReplicatorStatus,
};

use crate::common::{self, ResourceRoutes, RotationPolicy};

pub const DEFAULT_ROW_GROUP_SIZE: usize = 1000;

#[derive(Clone)]
pub struct ParquetDriverConfig {
    pub enabled: bool,
    pub batch_concurrency: usize,
    pub row_group_size: usize,
    pub rotation: RotationPolicy,
    pub routes: HashMap<String, RouteConfig>,
    pub default_resource: Option<String>,
}

impl Default for ParquetDriverConfig {
    fn default() -> Self {
        ParquetDriverConfig {
            enabled: true,
            batch_concurrency: engine_core::batch_pool::DEFAULT_CONCURRENCY,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
            rotation: RotationPolicy::None,
            routes: HashMap::new(),
            default_resource: None,
        }
    }
}

pub struct ParquetDriver {
    config: ParquetDriverConfig,
    routes: ResourceRoutes,
    state: DriverState,
    metrics: Metrics,
    buffers: Mutex<HashMap<PathBuf, Vec<DataMap>>>,
}

pub fn driver(config: ParquetDriverConfig) -> ParquetDriver {
    let routes = ResourceRoutes::from_config(&config.routes);
    ParquetDriver {
        config,
        routes,
        state: DriverState::Created,
        metrics: Metrics::default(),
        buffers: Mutex::new(HashMap::new()),
    }
}

impl ParquetDriver {
    fn flush_path(&self, path: &std::path::Path) -> Result<usize, String> {
        let rows = {
            let mut buffers = self.buffers.lock().expect("parquet buffer map poisoned");
            match buffers.get_mut(path) {
                Some(rows) if !rows.is_empty() => std::mem::take(rows),
                _ => return Ok(0),
            }
        };
        let flushed = rows.len();
        let adapter = ParquetAdapter::new(path);
        adapter.append_batch(&rows).map_err(|e| e.to_string())?;
        Ok(flushed)
    }

    fn write_one(&self, destination: &Destination, event: &EventTuple) -> RouteOutcome {
        if common::is_unsupported_file_delete(event.operation) {
            return RouteOutcome::ok(destination.target.clone());
        }

        let base = PathBuf::from(&destination.target);
        let path = common::rotated_path(&base, "parquet", self.config.rotation);
        if let Err(err) = common::rotate_if_oversized(&path, self.config.rotation) {
            return RouteOutcome::failed(destination.target.clone(), err.to_string());
        }

        let row = common::prepare_payload(destination, &event.data, &[]);
        let should_flush = {
            let mut buffers = self.buffers.lock().expect("parquet buffer map poisoned");
            let buffer = buffers.entry(path.clone()).or_default();
            buffer.push(row);
            buffer.len() >= self.config.row_group_size.max(1)
        };

        if should_flush {
            if let Err(err) = self.flush_path(&path) {
                return RouteOutcome::failed(destination.target.clone(), err);
            }
        }
        RouteOutcome::ok(destination.target.clone())
    }

    fn flush_all(&self) -> Vec<(PathBuf, Result<usize, String>)> {
        let paths: Vec<PathBuf> = self.buffers.lock().expect("parquet buffer map poisoned").keys().cloned().collect();
        paths.into_iter().map(|p| { let r = self.flush_path(&p); (p, r) }).collect()
    }
}

#[async_trait]
impl Replicator for ParquetDriver {
    fn driver_name(&self) -> &'static str {
        "parquet"
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
        let mut status = ReplicatorStatus::new("parquet", "parquet");
        status.enabled = self.config.enabled;
        status.connected = true;
        status.resources = self.routes.resources();
        status
    }

    fn state(&self) -> DriverState {
        self.state
    }

    /// Flushes every buffered row group before transitioning to `CLOSED`
    /// (spec.md §4.5 "flush ... on explicit close()").
    async fn close(&mut self) -> Result<(), ReplicationError> {
        if self.state == DriverState::Closed {
            return Ok(());
        }
        if matches!(self.state, DriverState::Ready) {
            self.state = state::transition(self.state, DriverState::Draining)
                .map_err(|e| ReplicationError::new(ErrorKind::InvalidState, "close", e.to_string(), false))?;
        }
        for (path, result) in self.flush_all() {
            if let Err(err) = result {
                tracing::warn!(path = %path.display(), error = %err, "parquet flush-on-close failed");
            }
        }
        self.state = state::transition(self.state, DriverState::Closed).unwrap_or(DriverState::Closed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::value::Value;

    #[tokio::test]
    async fn flushes_on_row_group_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("orders");
        let mut routes = HashMap::new();
        routes.insert(
            "orders".to_string(),
            RouteConfig::Parsed(model::route::RouteConfigInput::Single(target.to_string_lossy().to_string())),
        );
        let mut replicator = driver(ParquetDriverConfig {
            row_group_size: 2,
            routes,
            ..ParquetDriverConfig::default()
        });
        replicator.initialize(Vec::new()).await.unwrap();

        for i in 0..2 {
            let mut data = DataMap::new();
            data.insert("amount".to_string(), Value::Int(i));
            let event = EventTuple::new("orders", Operation::Insert, data, i.to_string());
            replicator.replicate(&event).await.unwrap();
        }

        assert!(target.with_extension("parquet").exists());
    }

    #[tokio::test]
    async fn close_flushes_a_partial_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("orders");
        let mut routes = HashMap::new();
        routes.insert(
            "orders".to_string(),
            RouteConfig::Parsed(model::route::RouteConfigInput::Single(target.to_string_lossy().to_string())),
        );
        let mut replicator = driver(ParquetDriverConfig {
            row_group_size: 100,
            routes,
            ..ParquetDriverConfig::default()
        });
        replicator.initialize(Vec::new()).await.unwrap();

        let mut data = DataMap::new();
        data.insert("amount".to_string(), Value::Int(1));
        let event = EventTuple::new("orders", Operation::Insert, data, "1");
        replicator.replicate(&event).await.unwrap();
        assert!(!target.with_extension("parquet").exists());

        replicator.close().await.unwrap();
        assert!(target.with_extension("parquet").exists());
    }
}
