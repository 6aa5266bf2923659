//! The source database's `Resource` schema, as consumed (read-only) by the
//! core. The source database itself is out of scope (spec §1); this is
//! just the shape the core needs to read.

use crate::core::field_type::FieldType;
use serde_json::Value as Json;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct ResourceSchema {
    pub name: String,
    pub attributes: BTreeMap<String, FieldType>,
    pub plugin_attribute_names: HashSet<String>,
}

impl ResourceSchema {
    pub fn new(name: impl Into<String>) -> Self {
        ResourceSchema {
            name: name.into(),
            attributes: BTreeMap::new(),
            plugin_attribute_names: HashSet::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, notation: &str) -> Self {
        self.attributes
            .insert(name.into(), FieldType::parse(notation));
        self
    }

    pub fn with_plugin_attribute(mut self, name: impl Into<String>, notation: &str) -> Self {
        let name = name.into();
        self.attributes.insert(name.clone(), FieldType::parse(notation));
        self.plugin_attribute_names.insert(name);
        self
    }

    /// Accepts either bare-string or structured-config attribute values,
    /// per the supplemented data model (SPEC_FULL.md §3).
    pub fn from_json_attributes(
        name: impl Into<String>,
        attributes: &Json,
        plugin_attribute_names: impl IntoIterator<Item = String>,
    ) -> Option<ResourceSchema> {
        let obj = attributes.as_object()?;
        let mut parsed = BTreeMap::new();
        for (key, value) in obj {
            if let Some(ft) = FieldType::from_json(value) {
                parsed.insert(key.clone(), ft);
            }
        }
        Some(ResourceSchema {
            name: name.into(),
            attributes: parsed,
            plugin_attribute_names: plugin_attribute_names.into_iter().collect(),
        })
    }

    /// Attributes with plugin-injected fields removed — the schema view
    /// every DDL generator and payload cleaner must use.
    pub fn replicable_attributes(&self) -> BTreeMap<String, FieldType> {
        self.attributes
            .iter()
            .filter(|(name, _)| !self.plugin_attribute_names.contains(*name))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plugin_attributes_are_excluded_from_replicable_set() {
        let schema = ResourceSchema::new("users")
            .with_attribute("name", "string|required|maxlength:100")
            .with_plugin_attribute("embedding_vec", "embedding");

        let replicable = schema.replicable_attributes();
        assert!(replicable.contains_key("name"));
        assert!(!replicable.contains_key("embedding_vec"));
    }
}
