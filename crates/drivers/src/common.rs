//! Shared machinery every driver builds its `Replicator` impl on top of:
//! route resolution, the "resource not routed"/"operation not allowed"
//! guards, and the log-table/log-collection row shape (spec.md §4.1,
//! §4.5, §6).

use std::collections::HashMap;

use chrono::Utc;
use model::{
    core::value::{clean_payload, DataMap, Value},
    event::{EventTuple, Operation},
    route::{Destination, RouteConfig},
};

/// A resource name's routes, normalised once at `initialize()` time
/// (spec.md §3: the four syntactic forms are parsed up front, not on
/// every write).
#[derive(Default)]
pub struct ResourceRoutes(HashMap<String, Vec<Destination>>);

impl ResourceRoutes {
    pub fn from_config(routes: &HashMap<String, RouteConfig>) -> Self {
        let mut map = HashMap::with_capacity(routes.len());
        for (resource, config) in routes {
            map.insert(resource.clone(), config.normalize(resource));
        }
        ResourceRoutes(map)
    }

    pub fn for_resource(&self, resource: &str) -> Option<&[Destination]> {
        self.0.get(resource).map(|v| v.as_slice())
    }

    /// Registers destinations for a resource outside of `from_config` — the
    /// ad hoc/CLI path (spec.md §2's `initialize(destinations)` argument),
    /// overwriting any config-driven route already present for it.
    pub fn insert(&mut self, resource: String, destinations: Vec<Destination>) {
        self.0.insert(resource, destinations);
    }

    pub fn resources(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `shouldReplicateResource` (spec.md §4.1/§9 Open Question). With no
    /// `action`, answers "is this resource routed at all?"; with an
    /// `action`, additionally requires at least one route whose
    /// `allowedActions` includes it.
    pub fn should_replicate_resource(&self, resource: &str, action: Option<Operation>) -> bool {
        let Some(destinations) = self.for_resource(resource) else {
            return false;
        };
        match action {
            None => !destinations.is_empty(),
            Some(action) => destinations.iter().any(|d| d.allows(action)),
        }
    }
}

/// Why a `replicate` call was skipped without contacting any sink
/// (spec.md §4.1 guards).
pub enum SkipReason {
    DriverDisabled,
    ResourceNotRouted,
    OperationNotAllowed,
}

impl SkipReason {
    pub fn message(&self) -> &'static str {
        match self {
            SkipReason::DriverDisabled => "driver is disabled",
            SkipReason::ResourceNotRouted => "resource has no configured route",
            SkipReason::OperationNotAllowed => "operation is not in any route's allowedActions",
        }
    }
}

/// Applies the three top-level guards from spec.md §4.1 and, if none
/// trip, returns the destinations whose `allowedActions` include
/// `event.operation` (a subset of the resource's full route list — a
/// destination that doesn't allow this operation is silently excluded
/// from the write, not reported as skipped, since at least one other
/// destination does allow it).
pub fn resolve_destinations<'a>(
    enabled: bool,
    routes: &'a ResourceRoutes,
    event: &EventTuple,
) -> Result<Vec<&'a Destination>, SkipReason> {
    if !enabled {
        return Err(SkipReason::DriverDisabled);
    }
    let destinations = routes.for_resource(&event.resource_name).ok_or(SkipReason::ResourceNotRouted)?;
    let applicable: Vec<&Destination> = destinations.iter().filter(|d| d.allows(event.operation)).collect();
    if applicable.is_empty() {
        return Err(SkipReason::OperationNotAllowed);
    }
    Ok(applicable)
}

/// The payload every destination write actually sees: internal fields
/// stripped (except MongoDB's `_id`, handled by its own driver), then the
/// destination's own transform applied.
pub fn prepare_payload(destination: &Destination, data: &DataMap, keep: &[&str]) -> DataMap {
    let cleaned = if keep.is_empty() {
        clean_payload(data)
    } else {
        model::core::value::clean_payload_keep(data, keep)
    };
    model::transform::apply_transform(destination.transform.as_ref(), &cleaned)
}

/// One row for the optional log-table/log-collection mirror (spec.md §6):
/// `{resource_name, operation, record_id, data, timestamp, source}`.
/// Log writes never fail the primary write (spec.md §4.1, §7), so callers
/// should swallow any error this produces.
pub fn log_row(event: &EventTuple, source: &str) -> DataMap {
    let mut row = DataMap::new();
    row.insert("resource_name".to_string(), Value::String(event.resource_name.clone()));
    row.insert("operation".to_string(), Value::String(event.operation.as_str().to_string()));
    row.insert("record_id".to_string(), Value::String(event.id.clone()));
    row.insert("data".to_string(), Value::Json(serde_json::to_value(&event.data).unwrap_or_default()));
    row.insert("timestamp".to_string(), Value::Timestamp(Utc::now()));
    row.insert("source".to_string(), Value::String(source.to_string()));
    row
}

pub const REPLICATOR_SOURCE: &str = "s3db-replicator";

/// Checks shared by every driver's `validate_config()` (spec.md §4.1,
/// §8 boundary behaviours): a concurrency cap of zero is rejected, and at
/// least one resource route must be configured. Routing invariants on the
/// routes themselves (non-empty target, legal action subset) are already
/// enforced at parse time by [`RouteConfig::normalize`](model::route::RouteConfig::normalize),
/// which defaults an empty target list to nothing and an empty action set
/// to `{insert}` rather than accepting a malformed shape.
pub fn validate_common(errors: &mut Vec<String>, batch_concurrency: usize, routes: &HashMap<String, RouteConfig>) {
    if batch_concurrency < 1 {
        errors.push("batchConcurrency must be >= 1".to_string());
    }
    if routes.is_empty() {
        errors.push("at least one resource route must be configured".to_string());
    }
}

/// `true` when `operation` should be silently skipped for file sinks,
/// which never support deletes (spec.md §4.5 "Deletes are skipped with a
/// documented reason").
pub fn is_unsupported_file_delete(operation: Operation) -> bool {
    operation == Operation::Delete
}

/// File-sink rotation policy (spec.md §4.5/§6): `None` writes straight to
/// `{name}.{ext}`; `Date` derives a per-day filename; `Size` rotates the
/// current file out to `{name}_{epoch}.{ext}` once it exceeds a byte
/// threshold.
#[derive(Debug, Clone, Copy)]
pub enum RotationPolicy {
    None,
    Date,
    Size { threshold_bytes: u64 },
}

/// Resolves the file a write should target right now, given `base` (the
/// destination's target, sans extension) and `extension` (without the
/// leading dot).
pub fn rotated_path(base: &std::path::Path, extension: &str, rotation: RotationPolicy) -> std::path::PathBuf {
    match rotation {
        RotationPolicy::None | RotationPolicy::Size { .. } => base.with_extension(extension),
        RotationPolicy::Date => {
            let date = Utc::now().format("%Y-%m-%d");
            let stem = base.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            let mut path = base.to_path_buf();
            path.set_file_name(format!("{stem}_{date}.{extension}"));
            path
        }
    }
}

/// For `RotationPolicy::Size`: if `path` already exceeds `threshold_bytes`,
/// renames it to `{name}_{epoch}.{ext}` so the next write starts a fresh
/// file at `path`. A no-op under any other policy or if the file is
/// missing/under threshold.
pub fn rotate_if_oversized(path: &std::path::Path, rotation: RotationPolicy) -> std::io::Result<()> {
    let RotationPolicy::Size { threshold_bytes } = rotation else {
        return Ok(());
    };
    let Ok(metadata) = std::fs::metadata(path) else {
        return Ok(());
    };
    if metadata.len() < threshold_bytes {
        return Ok(());
    }
    let epoch = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    let mut rotated = path.to_path_buf();
    rotated.set_file_name(format!("{stem}_{epoch}.{extension}"));
    std::fs::rename(path, rotated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::value::DataMap;

    fn routes_with(resource: &str, dest: Destination) -> ResourceRoutes {
        let mut map = HashMap::new();
        map.insert(resource.to_string(), vec![dest]);
        ResourceRoutes(map)
    }

    #[test]
    fn unrouted_resource_is_skipped() {
        let routes = ResourceRoutes::default();
        let event = EventTuple::new("orders", Operation::Insert, DataMap::new(), "1");
        let err = resolve_destinations(true, &routes, &event).unwrap_err();
        assert!(matches!(err, SkipReason::ResourceNotRouted));
    }

    #[test]
    fn disallowed_operation_is_skipped() {
        let dest = Destination::new("orders_table").with_actions([Operation::Insert]);
        let routes = routes_with("orders", dest);
        let event = EventTuple::new("orders", Operation::Delete, DataMap::new(), "1");
        let err = resolve_destinations(true, &routes, &event).unwrap_err();
        assert!(matches!(err, SkipReason::OperationNotAllowed));
    }

    #[test]
    fn disabled_driver_is_skipped_before_routing() {
        let routes = ResourceRoutes::default();
        let event = EventTuple::new("orders", Operation::Insert, DataMap::new(), "1");
        let err = resolve_destinations(false, &routes, &event).unwrap_err();
        assert!(matches!(err, SkipReason::DriverDisabled));
    }

    #[test]
    fn allowed_operation_resolves_destination() {
        let dest = Destination::new("orders_table").with_actions([Operation::Insert]);
        let routes = routes_with("orders", dest);
        let event = EventTuple::new("orders", Operation::Insert, DataMap::new(), "1");
        let resolved = resolve_destinations(true, &routes, &event).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].target, "orders_table");
    }

    #[test]
    fn internal_fields_are_stripped_before_transform() {
        let dest = Destination::new("t");
        let mut data = DataMap::new();
        data.insert("id".into(), Value::String("1".into()));
        data.insert("_secret".into(), Value::Int(1));
        let prepared = prepare_payload(&dest, &data, &[]);
        assert!(!prepared.contains_key("_secret"));
    }

    #[test]
    fn date_rotation_appends_todays_date_to_the_stem() {
        let path = rotated_path(std::path::Path::new("/tmp/orders"), "jsonl", RotationPolicy::Date);
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("orders_"));
        assert!(name.ends_with(".jsonl"));
    }

    #[test]
    fn no_rotation_just_adds_the_extension() {
        let path = rotated_path(std::path::Path::new("/tmp/orders"), "csv", RotationPolicy::None);
        assert_eq!(path, std::path::PathBuf::from("/tmp/orders.csv"));
    }

    #[test]
    fn should_replicate_resource_without_action_ignores_allowed_actions() {
        let dest = Destination::new("orders_table").with_actions([Operation::Insert]);
        let routes = routes_with("orders", dest);
        assert!(routes.should_replicate_resource("orders", None));
        assert!(!routes.should_replicate_resource("unknown", None));
    }

    #[test]
    fn should_replicate_resource_with_action_consults_allowed_actions() {
        let dest = Destination::new("orders_table").with_actions([Operation::Insert]);
        let routes = routes_with("orders", dest);
        assert!(routes.should_replicate_resource("orders", Some(Operation::Insert)));
        assert!(!routes.should_replicate_resource("orders", Some(Operation::Delete)));
    }

    #[test]
    fn size_rotation_is_a_no_op_under_threshold() {
        let dir = std::env::temp_dir().join(format!("s3db-replicator-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("small.jsonl");
        std::fs::write(&path, b"tiny").unwrap();
        rotate_if_oversized(&path, RotationPolicy::Size { threshold_bytes: 1024 }).unwrap();
        assert!(path.exists());
        std::fs::remove_dir_all(&dir).ok();
    }
}
