//! Observability events (spec.md §4.6 "Events emitted"). Emission is
//! informational only — the return value of `replicate`/`replicateBatch`
//! is the sole contract (spec.md §9) — so these exist for the event bus
//! and logging, never for control flow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A type that can be published on an `EventBus`.
pub trait Event: Send + Sync + std::fmt::Debug + 'static {
    fn event_type(&self) -> &'static str;
}

/// The canonical set of lifecycle/write events named in spec.md §4.6.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplicatorEvent {
    /// Emitted once `initialize()` completes successfully.
    Initialized {
        driver: String,
        timestamp: DateTime<Utc>,
    },
    /// Emitted after the connectivity probe succeeds.
    Connected {
        driver: String,
        timestamp: DateTime<Utc>,
    },
    /// `db:plugin:initialized` — emitted when a database-backed driver
    /// finishes wiring its connection pool.
    DbPluginInitialized {
        driver: String,
        timestamp: DateTime<Utc>,
    },
    /// `plg:replicator:replicated` — emitted once per successful `replicate`.
    Replicated {
        driver: String,
        resource: String,
        operation: String,
        success: bool,
        timestamp: DateTime<Utc>,
    },
    /// `plg:replicator:error` — emitted when a `replicate` call fails.
    ReplicatorError {
        driver: String,
        resource: String,
        operation: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// Emitted once per successful `replicateBatch`.
    BatchReplicated {
        driver: String,
        total: usize,
        successful: usize,
        timestamp: DateTime<Utc>,
    },
    /// Emitted when a `replicateBatch` call fails outright (as opposed to
    /// individual per-event failures captured in its `errors[]`).
    BatchReplicatorError {
        driver: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// Emitted when the schema-sync orchestrator finishes (any strategy).
    SchemaSyncCompleted {
        driver: String,
        resource: String,
        strategy: String,
        timestamp: DateTime<Utc>,
    },
    TableCreated {
        driver: String,
        table: String,
        timestamp: DateTime<Utc>,
    },
    TableAltered {
        driver: String,
        table: String,
        columns_added: usize,
        timestamp: DateTime<Utc>,
    },
    TableRecreated {
        driver: String,
        table: String,
        timestamp: DateTime<Utc>,
    },
    /// Emitted when `testConnection()` (or the internal probe) fails.
    ConnectionError {
        driver: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// Emitted when `initialize()` fails.
    InitializationError {
        driver: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl ReplicatorEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ReplicatorEvent::Initialized { .. } => "initialized",
            ReplicatorEvent::Connected { .. } => "connected",
            ReplicatorEvent::DbPluginInitialized { .. } => "db:plugin:initialized",
            ReplicatorEvent::Replicated { .. } => "plg:replicator:replicated",
            ReplicatorEvent::ReplicatorError { .. } => "plg:replicator:error",
            ReplicatorEvent::BatchReplicated { .. } => "batch_replicated",
            ReplicatorEvent::BatchReplicatorError { .. } => "batch_replicator_error",
            ReplicatorEvent::SchemaSyncCompleted { .. } => "schema_sync_completed",
            ReplicatorEvent::TableCreated { .. } => "table_created",
            ReplicatorEvent::TableAltered { .. } => "table_altered",
            ReplicatorEvent::TableRecreated { .. } => "table_recreated",
            ReplicatorEvent::ConnectionError { .. } => "connection_error",
            ReplicatorEvent::InitializationError { .. } => "initialization_error",
        }
    }

    pub fn driver(&self) -> &str {
        match self {
            ReplicatorEvent::Initialized { driver, .. }
            | ReplicatorEvent::Connected { driver, .. }
            | ReplicatorEvent::DbPluginInitialized { driver, .. }
            | ReplicatorEvent::Replicated { driver, .. }
            | ReplicatorEvent::ReplicatorError { driver, .. }
            | ReplicatorEvent::BatchReplicated { driver, .. }
            | ReplicatorEvent::BatchReplicatorError { driver, .. }
            | ReplicatorEvent::SchemaSyncCompleted { driver, .. }
            | ReplicatorEvent::TableCreated { driver, .. }
            | ReplicatorEvent::TableAltered { driver, .. }
            | ReplicatorEvent::TableRecreated { driver, .. }
            | ReplicatorEvent::ConnectionError { driver, .. }
            | ReplicatorEvent::InitializationError { driver, .. } => driver,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            ReplicatorEvent::ReplicatorError { .. }
                | ReplicatorEvent::BatchReplicatorError { .. }
                | ReplicatorEvent::ConnectionError { .. }
                | ReplicatorEvent::InitializationError { .. }
        )
    }
}

impl fmt::Display for ReplicatorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.event_type(), self.driver())
    }
}

impl Event for ReplicatorEvent {
    fn event_type(&self) -> &'static str {
        self.event_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_matches_spec_canonical_name() {
        let event = ReplicatorEvent::Replicated {
            driver: "postgres".into(),
            resource: "users".into(),
            operation: "insert".into(),
            success: true,
            timestamp: Utc::now(),
        };
        assert_eq!(event.event_type(), "plg:replicator:replicated");
        assert!(!event.is_error());
    }

    #[test]
    fn error_events_are_flagged() {
        let event = ReplicatorEvent::ConnectionError {
            driver: "bigquery".into(),
            error: "dataset not found".into(),
            timestamp: Utc::now(),
        };
        assert!(event.is_error());
    }

    #[test]
    fn round_trips_through_json() {
        let event = ReplicatorEvent::TableAltered {
            driver: "mysql".into(),
            table: "users_table".into(),
            columns_added: 2,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: ReplicatorEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.event_type(), event.event_type());
    }
}
