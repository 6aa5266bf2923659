//! Excel (.xlsx) driver (spec.md §4.5/§6): buffers rows per destination
//! worksheet and rewrites the whole workbook either when the buffer
//! reaches a chunk threshold or on `close()`. Deletes are skipped — the
//! underlying `rust_xlsxwriter` workbook is write-only, so there is no
//! way to remove a previously written row.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use connectors::sinkfile::excel::ExcelAdapter;
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

pub const DEFAULT_CHUNK_SIZE: usize = 500;
/// BigQuery... no — this is Excel's own limit (spec.md §6): a single
/// worksheet is capped at this many rows.
pub const MAX_ROWS_PER_SHEET: usize = 1_048_576;

#[derive(Clone)]
pub struct ExcelDriverConfig {
    pub enabled: bool,
    pub batch_concurrency: usize,
    pub chunk_size: usize,
    pub rotation: RotationPolicy,
    pub routes: HashMap<String, RouteConfig>,
    pub default_resource: Option<String>,
}

impl Default for ExcelDriverConfig {
    fn default() -> Self {
        ExcelDriverConfig {
            enabled: true,
            batch_concurrency: engine_core::batch_pool::DEFAULT_CONCURRENCY,
            chunk_size: DEFAULT_CHUNK_SIZE,
            rotation: RotationPolicy::None,
            routes: HashMap::new(),
            default_resource: None,
        }
    }
}

struct SheetState {
    adapter: ExcelAdapter,
    pending: Vec<DataMap>,
    written_rows: usize,
}

pub struct ExcelDriver {
    config: ExcelDriverConfig,
    routes: ResourceRoutes,
    state: DriverState,
    metrics: Metrics,
    sheets: Mutex<HashMap<PathBuf, SheetState>>,
}

pub fn driver(config: ExcelDriverConfig) -> ExcelDriver {
    let routes = ResourceRoutes::from_config(&config.routes);
    ExcelDriver {
        config,
        routes,
        state: DriverState::Created,
        metrics: Metrics::default(),
        sheets: Mutex::new(HashMap::new()),
    }
}

impl ExcelDriver {
    fn flush_path(&self, path: &std::path::Path) -> Result<usize, String> {
        let mut sheets = self.sheets.lock().expect("excel sheet map poisoned");
        let Some(sheet) = sheets.get_mut(path) else { return Ok(0) };
        if sheet.pending.is_empty() {
            return Ok(0);
        }
        let pending = std::mem::take(&mut sheet.pending);
        let flushed = pending.len();
        sheet.adapter.append_batch(&pending).map_err(|e| e.to_string())?;
        sheet.written_rows += flushed;
        Ok(flushed)
    }

    fn write_one(&self, destination: &Destination, event: &EventTuple) -> RouteOutcome {
        if common::is_unsupported_file_delete(event.operation) {
            return RouteOutcome::ok(destination.target.clone());
        }

        let base = PathBuf::from(&destination.target);
        let path = common::rotated_path(&base, "xlsx", self.config.rotation);
        if let Err(err) = common::rotate_if_oversized(&path, self.config.rotation) {
            return RouteOutcome::failed(destination.target.clone(), err.to_string());
        }

        let row = common::prepare_payload(destination, &event.data, &[]);
        let sheet_name = destination
            .target
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&destination.target)
            .to_string();

        let should_flush = {
            let mut sheets = self.sheets.lock().expect("excel sheet map poisoned");
            let sheet = sheets
                .entry(path.clone())
                .or_insert_with(|| SheetState { adapter: ExcelAdapter::new(path.clone(), sheet_name), pending: Vec::new(), written_rows: 0 });
            if sheet.written_rows + sheet.pending.len() + 1 > MAX_ROWS_PER_SHEET {
                return RouteOutcome::failed(destination.target.clone(), "worksheet row limit exceeded");
            }
            sheet.pending.push(row);
            sheet.pending.len() >= self.config.chunk_size.max(1)
        };

        if should_flush {
            if let Err(err) = self.flush_path(&path) {
                return RouteOutcome::failed(destination.target.clone(), err);
            }
        }
        RouteOutcome::ok(destination.target.clone())
    }

    fn flush_all(&self) -> Vec<(PathBuf, Result<usize, String>)> {
        let paths: Vec<PathBuf> = self.sheets.lock().expect("excel sheet map poisoned").keys().cloned().collect();
        paths.into_iter().map(|p| { let r = self.flush_path(&p); (p, r) }).collect()
    }
}

#[async_trait]
impl Replicator for ExcelDriver {
    fn driver_name(&self) -> &'static str {
        "excel"
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
        let mut status = ReplicatorStatus::new("excel", "excel");
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
        if matches!(self.state, DriverState::Ready) {
            self.state = state::transition(self.state, DriverState::Draining)
                .map_err(|e| ReplicationError::new(ErrorKind::InvalidState, "close", e.to_string(), false))?;
        }
        for (path, result) in self.flush_all() {
            if let Err(err) = result {
                tracing::warn!(path = %path.display(), error = %err, "excel flush-on-close failed");
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
    async fn flushes_on_chunk_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("orders");
        let mut routes = HashMap::new();
        routes.insert(
            "orders".to_string(),
            RouteConfig::Parsed(model::route::RouteConfigInput::Single(target.to_string_lossy().to_string())),
        );
        let mut replicator = driver(ExcelDriverConfig {
            chunk_size: 2,
            routes,
            ..ExcelDriverConfig::default()
        });
        replicator.initialize(Vec::new()).await.unwrap();

        for i in 0..2 {
            let mut data = DataMap::new();
            data.insert("amount".to_string(), Value::Int(i));
            let event = EventTuple::new("orders", Operation::Insert, data, i.to_string());
            replicator.replicate(&event).await.unwrap();
        }

        assert!(target.with_extension("xlsx").exists());
    }
}
