//! End-to-end scenarios against the generic `SqlReplicator<FakeSqlAdapter>`
//! (spec.md §8), covering the insert/auto-create-table path and the
//! validate-only mismatch path without a live Postgres/MySQL instance.

use std::collections::HashMap;

use drivers::sql_common::{ConnectFuture, SqlDriverConfig, SqlReplicator};
use engine_core::{
    replicator::Replicator,
    schema_sync::{OnMismatch, SchemaSyncConfig, SqlIntrospect, SyncStrategy},
    state::DriverState,
};
use model::{
    core::value::Value,
    error::ErrorKind,
    event::{EventTuple, Operation},
    resource::ResourceSchema,
    route::RouteConfig,
};
use planner::query::dialect::Postgres;

use crate::fakes::FakeSqlAdapter;

fn insert_event(id: &str, name: &str) -> EventTuple {
    let mut data = model::core::value::DataMap::new();
    data.insert("id".to_string(), Value::String(id.to_string()));
    data.insert("name".to_string(), Value::String(name.to_string()));
    EventTuple::new("users", Operation::Insert, data, id)
}

fn users_schema() -> ResourceSchema {
    ResourceSchema::new("users")
        .with_attribute("id", "uuid|required")
        .with_attribute("name", "string|required|maxlength:100")
}

fn replicator_with(adapter: FakeSqlAdapter, config: SqlDriverConfig) -> SqlReplicator<FakeSqlAdapter> {
    SqlReplicator::new(
        "test-postgres",
        Box::new(Postgres),
        Box::new(move || -> ConnectFuture<FakeSqlAdapter> {
            let adapter = adapter.clone();
            Box::pin(async move { Ok(adapter) })
        }),
        config,
    )
}

/// spec.md §8 scenario 1: an insert event for a resource whose destination
/// table does not exist yet auto-creates it (autoCreateTable, default
/// `alter` strategy) and then writes the row.
#[tokio::test]
async fn insert_auto_creates_table_and_writes_row() {
    let adapter = FakeSqlAdapter::new();
    let mut routes = HashMap::new();
    routes.insert("users".to_string(), RouteConfig::Parsed(model::route::RouteConfigInput::Single("users_table".to_string())));
    let mut schemas = HashMap::new();
    schemas.insert("users".to_string(), users_schema());

    let mut replicator = replicator_with(
        adapter.clone(),
        SqlDriverConfig {
            routes,
            schemas,
            ..SqlDriverConfig::default()
        },
    );

    replicator.initialize(vec![]).await.unwrap();
    assert_eq!(replicator.state(), DriverState::Ready);
    assert!(adapter.columns_of("users_table").unwrap().contains(&"name".to_string()));

    let result = replicator.replicate(&insert_event("u1", "Ada")).await.unwrap();
    assert!(result.success);
    assert_eq!(adapter.row_count("users_table"), 1);
    assert_eq!(
        adapter.row("users_table", "u1").unwrap().get("name").and_then(Value::as_str),
        Some("Ada")
    );
}

/// spec.md §8 scenario 5: validate-only strategy with a configured column
/// missing from the live table reports a non-retriable `SchemaMismatch`,
/// via `initialize()` failing fast before the driver reaches `Ready`.
#[tokio::test]
async fn validate_only_mismatch_is_a_nonretriable_schema_error() {
    let adapter = FakeSqlAdapter::new();
    // Pre-create the table with only `id`, missing `name`.
    adapter
        .execute("CREATE TABLE \"users_table\" (\"id\" VARCHAR(255) PRIMARY KEY)", &[])
        .await
        .unwrap();

    let mut routes = HashMap::new();
    routes.insert("users".to_string(), RouteConfig::Parsed(model::route::RouteConfigInput::Single("users_table".to_string())));
    let mut schemas = HashMap::new();
    schemas.insert("users".to_string(), users_schema());

    let mut replicator = replicator_with(
        adapter,
        SqlDriverConfig {
            routes,
            schemas,
            schema_sync: SchemaSyncConfig {
                strategy: SyncStrategy::ValidateOnly,
                on_mismatch: OnMismatch::Error,
                ..SchemaSyncConfig::default()
            },
            ..SqlDriverConfig::default()
        },
    );

    let err = replicator.initialize(vec![]).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::SchemaMismatch);
    assert!(!err.retriable);
}

/// An unrouted operation (the destination's `allowed_actions` excludes
/// delete) is skipped rather than attempted, per spec.md §3.
#[tokio::test]
async fn delete_outside_allowed_actions_is_skipped() {
    let adapter = FakeSqlAdapter::new();
    let mut routes = HashMap::new();
    routes.insert(
        "users".to_string(),
        RouteConfig::Parsed(model::route::RouteConfigInput::Many(vec![model::route::DestinationInput::Struct(
            model::route::DestinationStruct {
                target: "users_table".to_string(),
                allowed_actions: vec![Operation::Insert],
                primary_key: None,
                sort_key: None,
                mutability: None,
                table_options: None,
            },
        )])),
    );
    let mut schemas = HashMap::new();
    schemas.insert("users".to_string(), users_schema());

    let mut replicator = replicator_with(adapter, SqlDriverConfig { routes, schemas, ..SqlDriverConfig::default() });
    replicator.initialize(vec![]).await.unwrap();

    let mut data = model::core::value::DataMap::new();
    data.insert("id".to_string(), Value::String("u1".to_string()));
    let delete_event = EventTuple::new("users", Operation::Delete, data, "u1");

    let result = replicator.replicate(&delete_event).await.unwrap();
    assert!(result.skipped);
}
