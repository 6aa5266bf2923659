use crate::core::value::DataMap;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }

    pub fn all() -> [Operation; 3] {
        [Operation::Insert, Operation::Update, Operation::Delete]
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `(resourceName, operation, data, id, beforeData?)` from spec.md §3.
#[derive(Debug, Clone)]
pub struct EventTuple {
    pub resource_name: String,
    pub operation: Operation,
    pub data: DataMap,
    pub id: String,
    pub before_data: Option<DataMap>,
    /// Free-form pass-through bag; the core never inspects it (SPEC_FULL.md §3).
    pub metadata: Option<DataMap>,
}

impl EventTuple {
    pub fn new(
        resource_name: impl Into<String>,
        operation: Operation,
        data: DataMap,
        id: impl Into<String>,
    ) -> Self {
        EventTuple {
            resource_name: resource_name.into(),
            operation,
            data,
            id: id.into(),
            before_data: None,
            metadata: None,
        }
    }

    pub fn with_before_data(mut self, before: DataMap) -> Self {
        self.before_data = Some(before);
        self
    }
}
