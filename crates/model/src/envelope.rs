//! The canonical envelope shared by SQS and webhook sinks (spec.md §6).

use crate::core::value::DataMap;
use crate::event::Operation;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const ENVELOPE_SOURCE: &str = "s3db-replicator";

#[derive(Debug, Clone, Serialize)]
pub struct CanonicalEnvelope {
    pub resource: String,
    pub action: Operation,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub data: DataMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<DataMap>,
}

impl CanonicalEnvelope {
    pub fn new(resource: impl Into<String>, action: Operation, data: DataMap, timestamp: DateTime<Utc>) -> Self {
        CanonicalEnvelope {
            resource: resource.into(),
            action,
            timestamp,
            source: ENVELOPE_SOURCE.to_string(),
            data,
            before: None,
        }
    }

    pub fn with_before(mut self, before: Option<DataMap>) -> Self {
        self.before = before;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchEnvelope {
    pub batch: Vec<CanonicalEnvelope>,
}
