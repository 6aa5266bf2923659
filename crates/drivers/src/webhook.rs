//! Webhook driver (spec.md §4.5): POSTs the canonical envelope per event,
//! retrying on network failure or a `{429,500,502,503,504}` response via
//! `RetryPolicy::for_http()` (spec.md §7). `testConnection()` issues a
//! HEAD probe independent of `initialize()` (SPEC_FULL.md §9).

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use connectors::http::webhook::WebhookAdapter;
use engine_core::{
    batch_pool::BatchPool,
    metrics::Metrics,
    replicator::Replicator,
    retry::{RetryDisposition, RetryError, RetryPolicy},
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
use std::collections::HashMap;

use crate::common::{self, ResourceRoutes};

#[derive(Clone)]
pub struct WebhookDriverConfig {
    pub enabled: bool,
    pub batch_concurrency: usize,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub routes: HashMap<String, RouteConfig>,
    pub default_resource: Option<String>,
}

impl Default for WebhookDriverConfig {
    fn default() -> Self {
        WebhookDriverConfig {
            enabled: true,
            batch_concurrency: engine_core::batch_pool::DEFAULT_CONCURRENCY,
            timeout: Duration::from_secs(10),
            retry: RetryPolicy::for_http(),
            routes: HashMap::new(),
            default_resource: None,
        }
    }
}

pub struct WebhookDriver {
    config: WebhookDriverConfig,
    adapter: Option<WebhookAdapter>,
    routes: ResourceRoutes,
    state: DriverState,
    metrics: Metrics,
    retried_requests: std::sync::atomic::AtomicU64,
}

pub fn driver(config: WebhookDriverConfig) -> WebhookDriver {
    let routes = ResourceRoutes::from_config(&config.routes);
    WebhookDriver {
        config,
        adapter: None,
        routes,
        state: DriverState::Created,
        metrics: Metrics::default(),
        retried_requests: std::sync::atomic::AtomicU64::new(0),
    }
}

impl WebhookDriver {
    async fn write_one(&self, destination: &Destination, event: &EventTuple) -> RouteOutcome {
        let Some(adapter) = &self.adapter else {
            return RouteOutcome::failed(destination.target.clone(), "driver not initialized");
        };

        let payload = common::prepare_payload(destination, &event.data, &[]);
        let envelope = CanonicalEnvelope::new(event.resource_name.clone(), event.operation, payload, Utc::now())
            .with_before(event.before_data.clone());

        let mut attempts_used = 0usize;
        let result = self
            .config
            .retry
            .run(
                || {
                    attempts_used += 1;
                    adapter.send_one(&envelope)
                },
                |err: &connectors::error::DbError| {
                    let message = err.to_string().to_ascii_lowercase();
                    if message.contains("retriable") {
                        RetryDisposition::Retry
                    } else {
                        RetryDisposition::Stop
                    }
                },
            )
            .await;

        if attempts_used > 1 {
            self.retried_requests
                .fetch_add((attempts_used - 1) as u64, std::sync::atomic::Ordering::Relaxed);
        }

        match result {
            Ok(()) => {
                self.metrics.increment_records(1).await;
                RouteOutcome::ok(destination.target.clone())
            }
            Err(RetryError::Fatal(e)) | Err(RetryError::AttemptsExceeded(e)) => {
                self.metrics.increment_failures(1);
                RouteOutcome::failed(destination.target.clone(), e.to_string())
            }
        }
    }
}

#[async_trait]
impl Replicator for WebhookDriver {
    fn driver_name(&self) -> &'static str {
        "webhook"
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

        // The URL lives per-destination (spec.md §3 struct form's `target`),
        // so there is no single connection to establish here; the adapter
        // for each destination is built lazily the first time it is used.
        // For the common single-URL-per-driver case we eagerly build one
        // adapter keyed off the first routed destination.
        let first_url = self
            .routes
            .resources()
            .iter()
            .find_map(|r| self.routes.for_resource(r).and_then(|d| d.first().map(|d| d.target.clone())));

        if let Some(url) = first_url {
            let adapter = WebhookAdapter::new(&url, self.config.timeout).map_err(|e| {
                self.state = DriverState::Failed;
                ReplicationError::connectivity("initialize", e.to_string())
            })?;
            self.adapter = Some(adapter);
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
            Some(adapter) => Ok(adapter.probe().await.unwrap_or(false)),
            None => Ok(false),
        }
    }

    fn status(&self) -> ReplicatorStatus {
        let mut status = ReplicatorStatus::new("webhook", "webhook");
        status.enabled = self.config.enabled;
        status.connected = self.adapter.is_some();
        status.resources = self.routes.resources();
        status.with_extra(
            "retriedRequests",
            self.retried_requests.load(std::sync::atomic::Ordering::Relaxed),
        )
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
        let replicator = driver(WebhookDriverConfig::default());
        assert_eq!(replicator.state(), DriverState::Created);
    }
}
