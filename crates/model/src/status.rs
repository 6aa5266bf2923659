use serde::Serialize;
use serde_json::Value as Json;
use std::collections::BTreeMap;

/// `{name, enabled, connected, resources: [...], driver-specific fields}`
/// (spec.md §3). Driver-specific fields are merged in as a flat JSON map so
/// each driver can contribute its own keys without a shared struct forcing
/// every driver to carry every other driver's fields.
#[derive(Debug, Clone, Serialize)]
pub struct ReplicatorStatus {
    pub name: String,
    pub driver: String,
    pub enabled: bool,
    pub connected: bool,
    pub resources: Vec<String>,
    /// `true` only for BigQuery immutable mode (SPEC_FULL.md §3): the
    /// in-process `_version` counter is not persisted across restarts.
    pub version_counters_tracked: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Json>,
}

impl ReplicatorStatus {
    pub fn new(name: impl Into<String>, driver: impl Into<String>) -> Self {
        ReplicatorStatus {
            name: name.into(),
            driver: driver.into(),
            enabled: true,
            connected: false,
            resources: Vec::new(),
            version_counters_tracked: false,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Json>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}
