//! `ReplicationError`: the single tagged error category every driver
//! surfaces (spec.md §2 "Error Model", §7 "Error Handling Design").
//!
//! Each constructor pins the `retriable` flag and carries a free-form
//! `suggestion`, so that `{kind, operation, resource, retriable,
//! suggestion, message}` is always serialisable for logging or re-queueing
//! (spec.md §7 "User-visible behaviour").

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Dependency,
    Connectivity,
    AuthPermission,
    SchemaMismatch,
    Payload,
    TransientProvider,
    /// Calling `replicate`/`replicateBatch` outside of `READY` (spec.md §4.1
    /// state machine).
    InvalidState,
}

#[derive(Debug, Clone, Error, Serialize)]
#[error("[{kind:?}] {operation}{resource_suffix}: {message}")]
pub struct ReplicationError {
    pub kind: ErrorKind,
    pub operation: String,
    pub resource: Option<String>,
    pub retriable: bool,
    pub suggestion: Option<String>,
    pub message: String,
}

impl ReplicationError {
    fn resource_suffix(&self) -> String {
        match &self.resource {
            Some(r) => format!(" (resource: {r})"),
            None => String::new(),
        }
    }

    pub fn new(
        kind: ErrorKind,
        operation: impl Into<String>,
        message: impl Into<String>,
        retriable: bool,
    ) -> Self {
        ReplicationError {
            kind,
            operation: operation.into(),
            resource: None,
            retriable,
            suggestion: None,
            message: message.into(),
        }
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn configuration(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, operation, message, false)
    }

    pub fn dependency(operation: impl Into<String>, install_hint: impl Into<String>) -> Self {
        let hint = install_hint.into();
        Self::new(
            ErrorKind::Dependency,
            operation,
            format!("required dependency is missing: {hint}"),
            false,
        )
        .with_suggestion(hint)
    }

    pub fn connectivity(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connectivity, operation, message, true)
    }

    pub fn auth(operation: impl Into<String>, message: impl Into<String>, retriable: bool) -> Self {
        Self::new(ErrorKind::AuthPermission, operation, message, retriable)
    }

    pub fn schema_mismatch(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SchemaMismatch, operation, message, false)
    }

    pub fn payload(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Payload, operation, message, false)
    }

    pub fn transient(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransientProvider, operation, message, true)
    }

    pub fn invalid_state(operation: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::InvalidState,
            operation,
            "driver is not in the READY state",
            true,
        )
        .with_suggestion("call initialize()")
    }

    /// Best-effort classification of a raw provider error message into a
    /// [`ReplicationError`], per spec.md §7 ("parsed from provider
    /// messages"). Drivers call this from their adapter error mapping.
    pub fn from_provider_message(operation: impl Into<String>, message: &str) -> Self {
        let operation = operation.into();
        let lower = message.to_ascii_lowercase();
        if lower.contains("invalid_grant") || lower.contains("permission denied") {
            return Self::auth(operation, message, false)
                .with_suggestion("reissue credentials or grant the required role");
        }
        if lower.contains("expiredtoken") || lower.contains("expired token") {
            return Self::auth(operation, message, true)
                .with_suggestion("refresh the AWS session token and retry");
        }
        if lower.contains("streaming buffer") {
            return Self::transient(operation, message)
                .with_suggestion("retry after the BigQuery streaming buffer flush delay");
        }
        if lower.contains("timeout") || lower.contains("connection refused") || lower.contains("econnrefused")
        {
            return Self::connectivity(operation, message);
        }
        Self::new(ErrorKind::TransientProvider, operation, message, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_are_not_retriable() {
        let err = ReplicationError::configuration("validateConfig", "missing credentials");
        assert!(!err.retriable);
        assert_eq!(err.kind, ErrorKind::Configuration);
    }

    #[test]
    fn invalid_state_suggests_initialize() {
        let err = ReplicationError::invalid_state("replicate");
        assert_eq!(err.suggestion.as_deref(), Some("call initialize()"));
        assert!(err.retriable);
    }

    #[test]
    fn provider_message_classifies_permission_denied_as_non_retriable_auth() {
        let err = ReplicationError::from_provider_message("replicate", "Permission denied on dataset");
        assert_eq!(err.kind, ErrorKind::AuthPermission);
        assert!(!err.retriable);
    }

    #[test]
    fn provider_message_classifies_streaming_buffer_as_transient() {
        let err = ReplicationError::from_provider_message("replicate", "UPDATE failed: streaming buffer");
        assert_eq!(err.kind, ErrorKind::TransientProvider);
        assert!(err.retriable);
    }
}
