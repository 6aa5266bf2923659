//! Resource→Destination routing (spec.md §3 "ResourceRoute").
//!
//! Per the Design Note in spec.md §9, the four dynamically-typed input
//! forms the source tree accepts are parsed once, at construction, into a
//! single sum type (`RouteConfig`) and normalised into a `Vec<Destination>`.
//! Malformed input is rejected up-front by `validateConfig()`, not deep
//! inside a write path.

use crate::event::Operation;
use crate::transform::TransformFn;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// BigQuery-only write semantics (spec.md §3/§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mutability {
    AppendOnly,
    Mutable,
    Immutable,
}

/// BigQuery-only partitioning/clustering hints, consumed at `CREATE TABLE`
/// time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableOptions {
    pub partition_by: Option<String>,
    pub cluster_by: Vec<String>,
}

/// A single resolved destination for one source resource.
#[derive(Clone)]
pub struct Destination {
    pub target: String,
    pub allowed_actions: HashSet<Operation>,
    pub transform: Option<TransformFn>,
    pub primary_key: String,
    pub sort_key: Option<String>,
    pub mutability: Option<Mutability>,
    pub table_options: Option<TableOptions>,
}

impl Destination {
    pub fn new(target: impl Into<String>) -> Self {
        Destination {
            target: target.into(),
            allowed_actions: [Operation::Insert].into_iter().collect(),
            transform: None,
            primary_key: "id".to_string(),
            sort_key: None,
            mutability: None,
            table_options: None,
        }
    }

    pub fn with_actions(mut self, actions: impl IntoIterator<Item = Operation>) -> Self {
        let set: HashSet<Operation> = actions.into_iter().collect();
        self.allowed_actions = if set.is_empty() {
            [Operation::Insert].into_iter().collect()
        } else {
            set
        };
        self
    }

    pub fn with_transform(mut self, transform: TransformFn) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn with_mutability(mut self, mutability: Mutability) -> Self {
        self.mutability = Some(mutability);
        self
    }

    pub fn allows(&self, operation: Operation) -> bool {
        self.allowed_actions.contains(&operation)
    }
}

/// Wire shape accepted for form 2 (array of strings or structs) and form 3
/// (single struct). Deserialised with `serde(untagged)` so a bare string and
/// a full struct both parse against the same field.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DestinationInput {
    Name(String),
    Struct(DestinationStruct),
}

#[derive(Debug, Clone, Deserialize)]
pub struct DestinationStruct {
    #[serde(alias = "table", alias = "collection", alias = "queueUrl", alias = "queue_url")]
    pub target: String,
    #[serde(default, alias = "allowedActions")]
    pub allowed_actions: Vec<Operation>,
    #[serde(default, alias = "primaryKey")]
    pub primary_key: Option<String>,
    #[serde(default, alias = "sortKey")]
    pub sort_key: Option<String>,
    #[serde(default)]
    pub mutability: Option<Mutability>,
    #[serde(default, alias = "tableOptions")]
    pub table_options: Option<TableOptions>,
}

/// The four syntactic forms from spec.md §3, as parsed from configuration
/// (JSON/YAML/TOML). Form 4 ("function") has no serializable representation
/// — it is only ever constructed programmatically via
/// [`RouteConfig::function`], by the sibling-database driver.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RouteConfigInput {
    Single(String),
    Many(Vec<DestinationInput>),
    Struct(DestinationStruct),
}

#[derive(Clone)]
pub enum RouteConfig {
    Parsed(RouteConfigInput),
    /// Form 4: a transform applied to a same-named destination — only
    /// meaningful for the sibling-database replicator (spec.md §3).
    Function(TransformFn),
}

impl RouteConfig {
    pub fn function(transform: TransformFn) -> Self {
        RouteConfig::Function(transform)
    }

    /// Normalises any of the four forms into the canonical `Vec<Destination>`.
    pub fn normalize(&self, resource_name: &str) -> Vec<Destination> {
        match self {
            RouteConfig::Function(transform) => {
                vec![Destination::new(resource_name).with_transform(transform.clone())]
            }
            RouteConfig::Parsed(input) => match input {
                RouteConfigInput::Single(name) => vec![Destination::new(name)],
                RouteConfigInput::Many(items) => items
                    .iter()
                    .map(|item| destination_from_input(item))
                    .collect(),
                RouteConfigInput::Struct(s) => vec![destination_from_struct(s)],
            },
        }
    }
}

fn destination_from_input(input: &DestinationInput) -> Destination {
    match input {
        DestinationInput::Name(name) => Destination::new(name),
        DestinationInput::Struct(s) => destination_from_struct(s),
    }
}

fn destination_from_struct(s: &DestinationStruct) -> Destination {
    let mut dest = Destination::new(&s.target).with_actions(s.allowed_actions.clone());
    if let Some(pk) = &s.primary_key {
        dest.primary_key = pk.clone();
    }
    dest.sort_key = s.sort_key.clone();
    dest.mutability = s.mutability;
    dest.table_options = s.table_options.clone();
    dest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_form_normalizes_to_single_insert_only_destination() {
        let input: RouteConfigInput = serde_json::from_str(r#""users_table""#).unwrap();
        let dests = RouteConfig::Parsed(input).normalize("users");
        assert_eq!(dests.len(), 1);
        assert_eq!(dests[0].target, "users_table");
        assert!(dests[0].allows(Operation::Insert));
        assert!(!dests[0].allows(Operation::Delete));
    }

    #[test]
    fn array_form_mixes_strings_and_structs() {
        let json = r#"["users_backup", {"table": "users_audit", "allowedActions": ["insert", "update"]}]"#;
        let input: RouteConfigInput = serde_json::from_str(json).unwrap();
        let dests = RouteConfig::Parsed(input).normalize("users");
        assert_eq!(dests.len(), 2);
        assert_eq!(dests[0].target, "users_backup");
        assert_eq!(dests[1].target, "users_audit");
        assert!(dests[1].allows(Operation::Update));
    }

    #[test]
    fn struct_form_is_a_singleton_list() {
        let json = r#"{"queueUrl": "https://sqs/my-queue", "allowedActions": ["insert", "delete"]}"#;
        let input: RouteConfigInput = serde_json::from_str(json).unwrap();
        let dests = RouteConfig::Parsed(input).normalize("orders");
        assert_eq!(dests.len(), 1);
        assert_eq!(dests[0].target, "https://sqs/my-queue");
        assert!(dests[0].allows(Operation::Delete));
        assert!(!dests[0].allows(Operation::Update));
    }

    #[test]
    fn empty_allowed_actions_defaults_to_insert() {
        let json = r#"{"table": "t"}"#;
        let input: RouteConfigInput = serde_json::from_str(json).unwrap();
        let dests = RouteConfig::Parsed(input).normalize("r");
        assert!(dests[0].allows(Operation::Insert));
        assert_eq!(dests[0].allowed_actions.len(), 1);
    }

    #[test]
    fn function_form_is_pass_through_transform_on_same_named_destination() {
        let transform: TransformFn = std::sync::Arc::new(|data| data.clone());
        let dests = RouteConfig::function(transform).normalize("users");
        assert_eq!(dests.len(), 1);
        assert_eq!(dests[0].target, "users");
        assert!(dests[0].transform.is_some());
    }
}
