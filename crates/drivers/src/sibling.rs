//! Sibling-database driver (spec.md §4.5): forwards to another instance
//! of the source system via its own Resource API (`insert`/`update`/
//! `delete`). `resourcesMap` (spec.md §3) supports the same four route
//! forms as every other driver, plus the function form used nowhere
//! else: a same-named destination whose payload goes through a
//! transform before being forwarded.

use std::collections::HashMap;

use async_trait::async_trait;
use connectors::http::sibling::SiblingAdapter;
use engine_core::{
    batch_pool::BatchPool,
    metrics::Metrics,
    replicator::Replicator,
    state::{self, DriverState},
};
use model::{
    batch::{ReplicateBatchResult, ReplicateResult, RouteOutcome},
    error::{ErrorKind, ReplicationError},
    event::EventTuple,
    route::{Destination, RouteConfig},
    status::ReplicatorStatus,
};

use crate::common::{self, ResourceRoutes};

#[derive(Clone)]
pub struct SiblingDriverConfig {
    pub enabled: bool,
    pub batch_concurrency: usize,
    pub base_url: String,
    /// Logs the request that would have been sent instead of issuing it
    /// (SPEC_FULL.md ambient testing affordance).
    pub dry_run: bool,
    pub routes: HashMap<String, RouteConfig>,
    pub default_resource: Option<String>,
}

impl Default for SiblingDriverConfig {
    fn default() -> Self {
        SiblingDriverConfig {
            enabled: true,
            batch_concurrency: engine_core::batch_pool::DEFAULT_CONCURRENCY,
            base_url: String::new(),
            dry_run: false,
            routes: HashMap::new(),
            default_resource: None,
        }
    }
}

pub struct SiblingDriver {
    config: SiblingDriverConfig,
    adapter: Option<SiblingAdapter>,
    routes: ResourceRoutes,
    state: DriverState,
    metrics: Metrics,
}

pub fn driver(config: SiblingDriverConfig) -> SiblingDriver {
    let routes = ResourceRoutes::from_config(&config.routes);
    SiblingDriver {
        config,
        adapter: None,
        routes,
        state: DriverState::Created,
        metrics: Metrics::default(),
    }
}

impl SiblingDriver {
    /// `shouldReplicateResource` (spec.md §9 Open Question): with no
    /// `action`, "is this resource routed at all?"; with one, additionally
    /// requires a route whose `allowedActions` includes it.
    pub fn should_replicate_resource(&self, resource: &str, action: Option<model::event::Operation>) -> bool {
        self.routes.should_replicate_resource(resource, action)
    }

    async fn write_one(&self, destination: &Destination, event: &EventTuple) -> RouteOutcome {
        let Some(adapter) = &self.adapter else {
            return RouteOutcome::failed(destination.target.clone(), "driver not initialized");
        };

        let payload = common::prepare_payload(destination, &event.data, &[]);
        let result = adapter.apply(&destination.target, event.operation, &event.id, &payload).await;

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
impl Replicator for SiblingDriver {
    fn driver_name(&self) -> &'static str {
        "sibling"
    }

    fn validate_config(&self) -> model::validation::ValidationResult {
        let mut errors = Vec::new();
        common::validate_common(&mut errors, self.config.batch_concurrency, &self.config.routes);
        if self.config.base_url.is_empty() {
            errors.push("sibling.base_url must not be empty".to_string());
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

        let adapter = SiblingAdapter::new(&self.config.base_url, self.config.dry_run).map_err(|e| {
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
        let mut status = ReplicatorStatus::new("sibling", "sibling");
        status.enabled = self.config.enabled;
        status.connected = self.adapter.is_some();
        status.resources = self.routes.resources();
        status.with_extra("dryRun", self.config.dry_run)
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
        let replicator = driver(SiblingDriverConfig::default());
        assert_eq!(replicator.state(), DriverState::Created);
    }

    #[test]
    fn should_replicate_resource_without_action_checks_routing_only() {
        let input: model::route::RouteConfigInput = serde_json::from_str(r#""users_backup""#).unwrap();
        let mut config = SiblingDriverConfig::default();
        config.routes.insert("users".to_string(), RouteConfig::Parsed(input));
        let replicator = driver(config);

        assert!(replicator.should_replicate_resource("users", None));
        assert!(!replicator.should_replicate_resource("orders", None));
    }

    #[test]
    fn should_replicate_resource_with_action_checks_allowed_actions() {
        use model::event::Operation;

        let input: model::route::RouteConfigInput =
            serde_json::from_str(r#"{"table": "users_backup", "allowedActions": ["insert"]}"#).unwrap();
        let mut config = SiblingDriverConfig::default();
        config.routes.insert("users".to_string(), RouteConfig::Parsed(input));
        let replicator = driver(config);

        assert!(replicator.should_replicate_resource("users", Some(Operation::Insert)));
        assert!(!replicator.should_replicate_resource("users", Some(Operation::Delete)));
    }
}
