use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};
use uuid::Uuid;

/// A single scalar (or nested) field value carried through the replication
/// pipeline. Unlike the source database's own row representation, `Value`
/// is dialect-agnostic: each destination connector is responsible for
/// encoding it into whatever its wire format expects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i64),
    Float(f64),
    Decimal(BigDecimal),
    String(String),
    Uuid(Uuid),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Json(serde_json::Value),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Decimal(v) => v.to_f64(),
            Value::Boolean(v) => Some(if *v { 1.0 } else { 0.0 }),
            Value::String(v) => v.parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Render a human-readable representation, used by log-table/log-collection
    /// payloads and by CSV/JSONL serialisation.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Boolean(v) => v.to_string(),
            Value::Int(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Decimal(v) => v.to_string(),
            Value::String(v) => v.clone(),
            Value::Uuid(v) => v.to_string(),
            Value::Date(v) => v.to_string(),
            Value::Timestamp(v) => v.to_rfc3339(),
            Value::Bytes(v) => format!("\\x{}", hex_encode(v)),
            Value::Array(items) => {
                let rendered: Vec<String> = items.iter().map(Value::to_display_string).collect();
                format!("[{}]", rendered.join(","))
            }
            Value::Json(v) => v.to_string(),
        }
    }

    /// Convert to `serde_json::Value`, used whenever a destination wants a
    /// JSON-native representation (MongoDB documents, DynamoDB attribute
    /// values staged as JSON, log-table `data` columns, SQS/webhook bodies).
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(v) => serde_json::Value::Bool(*v),
            Value::Int(v) => serde_json::Value::from(*v),
            Value::Float(v) => serde_json::json!(v),
            Value::Decimal(v) => serde_json::Value::String(v.to_string()),
            Value::String(v) => serde_json::Value::String(v.clone()),
            Value::Uuid(v) => serde_json::Value::String(v.to_string()),
            Value::Date(v) => serde_json::Value::String(v.to_string()),
            Value::Timestamp(v) => serde_json::Value::String(v.to_rfc3339()),
            Value::Bytes(v) => serde_json::Value::String(hex_encode(v)),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Json(v) => v.clone(),
        }
    }

    pub fn from_json(value: serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or_default())
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            other @ (serde_json::Value::Array(_) | serde_json::Value::Object(_)) => {
                Value::Json(other)
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// An ordered, deterministic payload. `BTreeMap` gives us lexicographic key
/// order for free, which the CSV sink needs (spec: "columns are sorted
/// lexicographically") and which makes every other dialect's column
/// iteration order reproducible across replays.
pub type DataMap = BTreeMap<String, Value>;

/// Strip internal fields (keys starting with `$` or `_`) from a payload.
/// MongoDB is the one sink that preserves `_id`, so it calls
/// [`clean_payload_keep`] instead.
pub fn clean_payload(data: &DataMap) -> DataMap {
    data.iter()
        .filter(|(k, _)| !is_internal_key(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Strip internal fields except for an explicit allow-list (MongoDB's `_id`).
pub fn clean_payload_keep(data: &DataMap, keep: &[&str]) -> DataMap {
    data.iter()
        .filter(|(k, _)| !is_internal_key(k) || keep.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

pub fn is_internal_key(key: &str) -> bool {
    key.starts_with('$') || key.starts_with('_')
}

/// Remove plugin-injected attribute names from a payload or schema key set.
pub fn strip_plugin_attributes(data: &DataMap, plugin_attribute_names: &[String]) -> DataMap {
    data.iter()
        .filter(|(k, _)| !plugin_attribute_names.iter().any(|p| p == *k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_dollar_and_underscore_keys() {
        let mut data = DataMap::new();
        data.insert("id".into(), Value::String("u1".into()));
        data.insert("$meta".into(), Value::Boolean(true));
        data.insert("_internal".into(), Value::Int(1));
        let cleaned = clean_payload(&data);
        assert_eq!(cleaned.len(), 1);
        assert!(cleaned.contains_key("id"));
    }

    #[test]
    fn mongo_keeps_underscore_id() {
        let mut data = DataMap::new();
        data.insert("_id".into(), Value::String("u1".into()));
        data.insert("_secret".into(), Value::Int(1));
        let cleaned = clean_payload_keep(&data, &["_id"]);
        assert_eq!(cleaned.len(), 1);
        assert!(cleaned.contains_key("_id"));
    }

    #[test]
    fn data_map_iterates_in_lexicographic_order() {
        let mut data = DataMap::new();
        data.insert("zeta".into(), Value::Int(1));
        data.insert("alpha".into(), Value::Int(2));
        let keys: Vec<&String> = data.keys().collect();
        assert_eq!(keys, vec!["alpha", "zeta"]);
    }
}
