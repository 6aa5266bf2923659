//! The Driver Registry (spec.md §2): maps driver names to lazy
//! constructors so a peer dependency (e.g. `aws-sdk-dynamodb`) is only
//! exercised when that driver is actually instantiated. Each driver crate
//! registers itself via [`DriverRegistry::register`]; the config needed to
//! build a concrete driver is captured in the constructor closure, so the
//! registry itself stays config-agnostic.

use std::collections::BTreeMap;

use model::error::ReplicationError;

use crate::replicator::Replicator;

type Constructor = Box<dyn Fn() -> Box<dyn Replicator> + Send + Sync>;

#[derive(Default)]
pub struct DriverRegistry {
    constructors: BTreeMap<String, Constructor>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        DriverRegistry {
            constructors: BTreeMap::new(),
        }
    }

    /// Registers a lazy constructor under `driver_name`. Re-registering the
    /// same name overwrites the previous constructor.
    pub fn register(
        &mut self,
        driver_name: impl Into<String>,
        constructor: impl Fn() -> Box<dyn Replicator> + Send + Sync + 'static,
    ) {
        self.constructors.insert(driver_name.into(), Box::new(constructor));
    }

    /// Every driver name currently registered, sorted for deterministic
    /// error messages (spec.md §8: unknown driver lists available drivers).
    pub fn available_drivers(&self) -> Vec<String> {
        self.constructors.keys().cloned().collect()
    }

    /// Builds a fresh driver instance for `driver_name`, or a configuration
    /// error naming the available drivers (spec.md §8 boundary behaviour).
    pub fn build(&self, driver_name: &str) -> Result<Box<dyn Replicator>, ReplicationError> {
        match self.constructors.get(driver_name) {
            Some(constructor) => Ok(constructor()),
            None => {
                let available = self.available_drivers().join(", ");
                Err(ReplicationError::configuration(
                    "registry.build",
                    format!("unknown driver '{driver_name}'; available drivers: [{available}]"),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use model::{
        batch::{ReplicateBatchResult, ReplicateResult},
        event::EventTuple,
        route::Destination,
        status::ReplicatorStatus,
        validation::ValidationResult,
    };

    use crate::state::DriverState;

    struct StubReplicator;

    #[async_trait]
    impl Replicator for StubReplicator {
        fn driver_name(&self) -> &'static str {
            "stub"
        }

        fn validate_config(&self) -> ValidationResult {
            ValidationResult::ok()
        }

        async fn initialize(&mut self, _destinations: Vec<Destination>) -> Result<(), ReplicationError> {
            Ok(())
        }

        async fn replicate(&self, _event: &EventTuple) -> Result<ReplicateResult, ReplicationError> {
            Ok(ReplicateResult::skipped("stub"))
        }

        async fn replicate_batch(&self, _events: &[EventTuple]) -> Result<ReplicateBatchResult, ReplicationError> {
            Ok(ReplicateBatchResult::empty())
        }

        async fn test_connection(&self) -> Result<bool, ReplicationError> {
            Ok(true)
        }

        fn status(&self) -> ReplicatorStatus {
            ReplicatorStatus::new("stub", "stub")
        }

        fn state(&self) -> DriverState {
            DriverState::Ready
        }

        async fn close(&mut self) -> Result<(), ReplicationError> {
            Ok(())
        }
    }

    #[test]
    fn unknown_driver_lists_available_names() {
        let mut registry = DriverRegistry::new();
        registry.register("stub", || Box::new(StubReplicator));
        registry.register("postgres", || Box::new(StubReplicator));

        let err = registry.build("oracle").unwrap_err();
        assert!(err.message.contains("postgres"));
        assert!(err.message.contains("stub"));
        assert!(!err.retriable);
    }

    #[test]
    fn registered_driver_builds_successfully() {
        let mut registry = DriverRegistry::new();
        registry.register("stub", || Box::new(StubReplicator));

        let driver = registry.build("stub").expect("stub should build");
        assert_eq!(driver.driver_name(), "stub");
    }
}
