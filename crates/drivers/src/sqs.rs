//! SQS driver (spec.md §4.5, §6): wraps every event in the canonical
//! envelope, routing single writes through `SendMessage` and batches
//! through `SendMessageBatch` in groups of ten. `deduplicationId`, when
//! enabled, is `resource:operation:id`; `messageGroupId` is passed
//! through unchanged for FIFO queues.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use connectors::queue::sqs::SqsAdapter;
use engine_core::{
    batch_pool::BatchPool,
    metrics::Metrics,
    replicator::Replicator,
    state::{self, DriverState},
};
use model::{
    batch::{ReplicateBatchResult, ReplicateResult, RouteOutcome},
    envelope::CanonicalEnvelope,
    error::{ErrorKind, ReplicationError},
    event::EventTuple,
    route::{Destination, RouteConfig},
    status::ReplicatorStatus,
};

use crate::common::{self, ResourceRoutes};

/// SQS's own batch-API limit; larger batches are chunked before sending
/// (spec.md §4.5 "batch uses SendMessageBatch in groups of ten").
const SQS_BATCH_LIMIT: usize = 10;

#[derive(Clone)]
pub struct SqsDriverConfig {
    pub enabled: bool,
    pub batch_concurrency: usize,
    pub region: Option<String>,
    pub deduplication_id: bool,
    pub message_group_id: Option<String>,
    pub routes: HashMap<String, RouteConfig>,
    pub default_resource: Option<String>,
}

impl Default for SqsDriverConfig {
    fn default() -> Self {
        SqsDriverConfig {
            enabled: true,
            batch_concurrency: engine_core::batch_pool::DEFAULT_CONCURRENCY,
            region: None,
            deduplication_id: false,
            message_group_id: None,
            routes: HashMap::new(),
            default_resource: None,
        }
    }
}

pub struct SqsDriver {
    config: SqsDriverConfig,
    adapter: Option<SqsAdapter>,
    routes: ResourceRoutes,
    state: DriverState,
    metrics: Metrics,
}

pub fn driver(config: SqsDriverConfig) -> SqsDriver {
    let routes = ResourceRoutes::from_config(&config.routes);
    SqsDriver {
        config,
        adapter: None,
        routes,
        state: DriverState::Created,
        metrics: Metrics::default(),
    }
}

impl SqsDriver {
    fn envelope(&self, destination: &Destination, event: &EventTuple) -> CanonicalEnvelope {
        let payload = common::prepare_payload(destination, &event.data, &[]);
        CanonicalEnvelope::new(event.resource_name.clone(), event.operation, payload, Utc::now())
            .with_before(event.before_data.clone())
    }

    fn dedup_id(&self, event: &EventTuple) -> Option<String> {
        if self.config.deduplication_id {
            Some(format!("{}:{}:{}", event.resource_name, event.operation, event.id))
        } else {
            None
        }
    }

    async fn write_one(&self, destination: &Destination, event: &EventTuple) -> RouteOutcome {
        let Some(adapter) = &self.adapter else {
            return RouteOutcome::failed(destination.target.clone(), "driver not initialized");
        };

        let envelope = self.envelope(destination, event);
        let dedup_id = self.dedup_id(event);
        let result = adapter
            .send_one(&envelope, dedup_id.as_deref(), self.config.message_group_id.as_deref())
            .await;

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
impl Replicator for SqsDriver {
    fn driver_name(&self) -> &'static str {
        "sqs"
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

        let first_queue_url = self
            .routes
            .resources()
            .iter()
            .find_map(|r| self.routes.for_resource(r).and_then(|d| d.first().map(|d| d.target.clone())));

        let Some(queue_url) = first_queue_url else {
            self.state = state::transition(self.state, DriverState::Ready)
                .map_err(|e| ReplicationError::new(ErrorKind::InvalidState, "initialize", e.to_string(), false))?;
            return Ok(());
        };

        let adapter = SqsAdapter::connect(&queue_url, self.config.region.as_deref())
            .await
            .map_err(|e| {
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
        Ok(ReplicateResult::from_route_outcomes(outcomes))
    }

    /// Groups events by destination then by `SQS_BATCH_LIMIT`-sized
    /// chunks and dispatches each chunk via `SendMessageBatch` (spec.md
    /// §4.5); a chunk-level transport failure aborts the remaining
    /// chunks for that call (spec.md §7 propagation policy).
    async fn replicate_batch(&self, events: &[EventTuple]) -> Result<ReplicateBatchResult, ReplicationError> {
        if !self.state.accepts_events() {
            return Err(ReplicationError::invalid_state("replicateBatch"));
        }
        if events.is_empty() {
            return Ok(ReplicateBatchResult::empty());
        }
        let Some(adapter) = &self.adapter else {
            return Err(ReplicationError::invalid_state("replicateBatch"));
        };

        let mut per_destination: HashMap<String, Vec<(CanonicalEnvelope, Option<String>)>> = HashMap::new();
        let mut results = Vec::with_capacity(events.len());

        for event in events {
            match common::resolve_destinations(self.config.enabled, &self.routes, event) {
                Ok(destinations) => {
                    for destination in destinations {
                        let envelope = self.envelope(destination, event);
                        per_destination
                            .entry(destination.target.clone())
                            .or_default()
                            .push((envelope, self.dedup_id(event)));
                    }
                }
                Err(reason) => results.push(ReplicateResult::skipped(reason.message())),
            }
        }

        let pool = BatchPool::new(self.config.batch_concurrency.max(1));
        for (target, pairs) in per_destination {
            let chunks: Vec<Vec<(CanonicalEnvelope, Option<String>)>> =
                pairs.chunks(SQS_BATCH_LIMIT).map(|c| c.to_vec()).collect();
            let group_id = self.config.message_group_id.clone();

            let outcome = pool
                .run(
                    chunks,
                    |chunk| {
                        let adapter = adapter;
                        let group_id = group_id.clone();
                        async move { adapter.send_batch(&chunk, group_id.as_deref()).await }
                    },
                    |e: &connectors::error::DbError| e.to_string(),
                )
                .await;

            let sent_chunks = outcome.results.len();
            for _ in 0..sent_chunks {
                results.push(ReplicateResult::from_route_outcomes(vec![RouteOutcome::ok(target.clone())]));
            }
            for err in &outcome.errors {
                self.metrics.increment_failures(1);
                results.push(ReplicateResult::from_route_outcomes(vec![RouteOutcome::failed(
                    target.clone(),
                    err.error.clone(),
                )]));
            }
            if sent_chunks > 0 {
                self.metrics.increment_records(sent_chunks as u64 * SQS_BATCH_LIMIT as u64).await;
            }
        }

        Ok(ReplicateBatchResult::from_results(results))
    }

    async fn test_connection(&self) -> Result<bool, ReplicationError> {
        match &self.adapter {
            Some(_) => Ok(true),
            None => Ok(false),
        }
    }

    fn status(&self) -> ReplicatorStatus {
        let mut status = ReplicatorStatus::new("sqs", "sqs");
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
        let replicator = driver(SqsDriverConfig::default());
        assert_eq!(replicator.state(), DriverState::Created);
    }
}
