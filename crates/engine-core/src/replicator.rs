//! The Replicator contract (spec.md §2): every driver is a type that can
//! be initialized against a resource's route, accept single events and
//! batches, answer status queries, and close cleanly.

use async_trait::async_trait;
use model::{
    batch::{ReplicateBatchResult, ReplicateResult},
    error::ReplicationError,
    event::EventTuple,
    route::Destination,
    status::ReplicatorStatus,
    validation::ValidationResult,
};

use crate::state::DriverState;

#[async_trait]
pub trait Replicator: Send + Sync {
    /// Driver name as it appears in config and `ReplicatorStatus::driver`
    /// (e.g. `"postgres"`, `"bigquery"`, `"sqs"`).
    fn driver_name(&self) -> &'static str;

    /// Pure, side-effect-free configuration check (spec.md §4.1):
    /// mandatory fields, routing invariants. `initialize()` calls this
    /// first and fails fast when it reports invalid.
    fn validate_config(&self) -> ValidationResult;

    /// Transitions `CREATED -> INITIALIZING -> READY` (or `FAILED`).
    /// Idempotent: calling it again on an already-`READY` driver is a
    /// no-op success (spec.md §2 invariant).
    async fn initialize(&mut self, destinations: Vec<Destination>) -> Result<(), ReplicationError>;

    /// Applies one event. Requires `READY` state; drivers MUST NOT accept
    /// events while `INITIALIZING` or after `CLOSED`/`FAILED`.
    async fn replicate(&self, event: &EventTuple) -> Result<ReplicateResult, ReplicationError>;

    /// Applies a batch of events through the Batch Pool (spec.md §4.4).
    /// `results.len() + errors.len() == events.len()`, with no positional
    /// ordering guarantee between the two.
    async fn replicate_batch(
        &self,
        events: &[EventTuple],
    ) -> Result<ReplicateBatchResult, ReplicationError>;

    /// A lightweight reachability check, independent of `initialize()`.
    async fn test_connection(&self) -> Result<bool, ReplicationError>;

    fn status(&self) -> ReplicatorStatus;

    fn state(&self) -> DriverState;

    /// Transitions to `DRAINING` (if the driver buffers writes) then
    /// `CLOSED`. Idempotent.
    async fn close(&mut self) -> Result<(), ReplicationError>;
}
