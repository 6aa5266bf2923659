//! Maps connector-layer errors onto `model::error::ReplicationError`, the
//! single error type drivers return across the `Replicator` boundary
//! (spec.md §2 "Error Model").

use connectors::error::{AdapterError, ConnectorError, DbError};
use model::error::ReplicationError;

/// Classifies an [`AdapterError`] into a [`ReplicationError`] for the given
/// `operation`/`resource`, using `from_provider_message` for the
/// provider-specific heuristics and picking the structural kind directly
/// where the adapter layer already knows it (e.g. `UnsupportedCapability`
/// is always a configuration error, never transient).
pub fn classify_adapter_error(
    operation: &str,
    resource: Option<&str>,
    err: AdapterError,
) -> ReplicationError {
    let replication_error = match err {
        AdapterError::Connector(ConnectorError::InvalidUrl(msg)) => {
            ReplicationError::configuration(operation, format!("invalid destination URL or DSN: {msg}"))
        }
        AdapterError::Connector(ConnectorError::TlsConfig(e)) => {
            ReplicationError::connectivity(operation, format!("TLS configuration error: {e}"))
        }
        AdapterError::Connector(inner @ ConnectorError::Postgres(_))
        | AdapterError::Connector(inner @ ConnectorError::MySql(_))
        | AdapterError::Connector(inner @ ConnectorError::Sqlite(_))
        | AdapterError::Connector(inner @ ConnectorError::Http(_))
        | AdapterError::Connector(inner @ ConnectorError::Provider(_)) => {
            ReplicationError::from_provider_message(operation, &inner.to_string())
        }
        AdapterError::Database(DbError::Io(e)) => {
            ReplicationError::connectivity(operation, format!("I/O error: {e}"))
        }
        AdapterError::Database(DbError::QueryBuild(msg)) => {
            ReplicationError::configuration(operation, format!("query build error: {msg}"))
        }
        AdapterError::Database(inner) => ReplicationError::from_provider_message(operation, &inner.to_string()),
        AdapterError::UnsupportedCapability(msg) => ReplicationError::configuration(
            operation,
            format!("unsupported capability for this destination: {msg}"),
        ),
        AdapterError::InvalidConfig(msg) => ReplicationError::configuration(operation, msg),
    };

    match resource {
        Some(r) => replication_error.with_resource(r),
        None => replication_error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_capability_is_not_retriable() {
        let err = classify_adapter_error(
            "replicate",
            Some("users"),
            AdapterError::UnsupportedCapability("delete on append-only table".to_string()),
        );
        assert!(!err.retriable);
        assert_eq!(err.resource.as_deref(), Some("users"));
    }

    #[test]
    fn invalid_config_maps_to_configuration_kind() {
        let err = classify_adapter_error("initialize", None, AdapterError::InvalidConfig("missing dsn".to_string()));
        assert_eq!(err.kind, model::error::ErrorKind::Configuration);
    }
}
