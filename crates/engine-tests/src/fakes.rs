//! In-memory test doubles for the `Connector` capability set (spec.md §9
//! Design Note: "a systems implementation models each as a trait/interface
//! adapter so the core is unit-testable against an in-memory fake"). These
//! let `engine-tests` drive the real `SqlReplicator`/schema-sync code paths
//! end to end without a live Postgres/MySQL/SQLite instance.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use connectors::error::DbError;
use engine_core::schema_sync::SqlIntrospect;
use model::core::value::{DataMap, Value};

#[derive(Default, Clone)]
struct FakeTable {
    columns: Vec<String>,
    rows: BTreeMap<String, DataMap>,
}

/// A single-process stand-in for `PostgresAdapter`/`MySqlAdapter`/
/// `SqliteAdapter` that interprets the exact DDL/DML text the `planner`
/// crate renders, rather than talking to a real server. Good enough to
/// exercise `schema_sync`'s create/alter/validate loop and `SqlReplicator`'s
/// insert/delete path against the literal end-to-end scenarios in
/// spec.md §8.
#[derive(Clone, Default)]
pub struct FakeSqlAdapter {
    tables: Arc<Mutex<BTreeMap<String, FakeTable>>>,
}

impl FakeSqlAdapter {
    pub fn new() -> Self {
        FakeSqlAdapter::default()
    }

    pub fn columns_of(&self, table: &str) -> Option<Vec<String>> {
        self.tables.lock().unwrap().get(table).map(|t| t.columns.clone())
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables.lock().unwrap().get(table).map(|t| t.rows.len()).unwrap_or(0)
    }

    pub fn row(&self, table: &str, id: &str) -> Option<DataMap> {
        self.tables.lock().unwrap().get(table).and_then(|t| t.rows.get(id).cloned())
    }

    fn table_name(rest: &str) -> (String, &str) {
        let rest = rest
            .trim_start()
            .strip_prefix("IF NOT EXISTS ")
            .or_else(|| rest.trim_start().strip_prefix("IF EXISTS "))
            .unwrap_or(rest.trim_start());
        let rest = rest.trim_start_matches('"');
        let end = rest.find('"').expect("quoted table name");
        (rest[..end].to_string(), &rest[end + 1..])
    }

    /// Splits the text between a statement's outermost parens on
    /// top-level commas (type tokens like `VARCHAR(120)` nest one level
    /// deep, so naive `split(',')` would cut them in half).
    fn split_top_level(s: &str) -> Vec<String> {
        let mut parts = Vec::new();
        let mut depth = 0i32;
        let mut current = String::new();
        for ch in s.chars() {
            match ch {
                '(' => {
                    depth += 1;
                    current.push(ch);
                }
                ')' => {
                    depth -= 1;
                    current.push(ch);
                }
                ',' if depth == 0 => {
                    parts.push(current.trim().to_string());
                    current = String::new();
                }
                _ => current.push(ch),
            }
        }
        if !current.trim().is_empty() {
            parts.push(current.trim().to_string());
        }
        parts
    }

    fn quoted_identifier(def: &str) -> Option<String> {
        let def = def.trim().trim_start_matches('`');
        let def = def.strip_prefix('"').unwrap_or(def);
        let end = def.find(['"', '`'])?;
        Some(def[..end].to_string())
    }

    fn create_table(&self, rest: &str) {
        let (table, rest) = Self::table_name(rest);
        let open = rest.find('(').expect("create table column list");
        let close = rest.rfind(')').expect("create table column list");
        let columns: Vec<String> = Self::split_top_level(&rest[open + 1..close])
            .iter()
            .filter_map(|def| Self::quoted_identifier(def))
            .collect();
        let mut tables = self.tables.lock().unwrap();
        tables.entry(table).or_insert_with(|| FakeTable { columns, rows: BTreeMap::new() });
    }

    fn alter_table(&self, rest: &str) {
        let (table, rest) = Self::table_name(rest);
        let rest = rest.trim_start().strip_prefix("ADD COLUMN ").expect("ALTER TABLE ADD COLUMN");
        let column = Self::quoted_identifier(rest).expect("quoted new column name");
        let mut tables = self.tables.lock().unwrap();
        let entry = tables.entry(table).or_default();
        if !entry.columns.contains(&column) {
            entry.columns.push(column);
        }
    }

    fn drop_table(&self, rest: &str) {
        let (table, _) = Self::table_name(rest);
        self.tables.lock().unwrap().remove(&table);
    }

    fn insert(&self, rest: &str, params: &[Value]) {
        let (table, rest) = Self::table_name(rest);
        let open = rest.find('(').expect("insert column list");
        let close = rest[open..].find(')').expect("insert column list") + open;
        let columns: Vec<String> = Self::split_top_level(&rest[open + 1..close])
            .iter()
            .map(|c| c.trim().trim_matches(|ch| ch == '"' || ch == '`').to_string())
            .collect();
        let do_nothing = rest.contains("DO NOTHING") || rest.contains("UPDATE") && rest.contains("= `id` = `id`");
        let on_conflict_noop = rest.contains("ON DUPLICATE KEY UPDATE") || do_nothing;

        let mut row = DataMap::new();
        for (column, value) in columns.iter().zip(params.iter()) {
            row.insert(column.clone(), value.clone());
        }
        let id = row
            .get("id")
            .and_then(Value::as_str)
            .map(|s| s.to_string())
            .unwrap_or_else(|| row.get("id").map(Value::to_display_string).unwrap_or_default());

        let mut tables = self.tables.lock().unwrap();
        let entry = tables.entry(table).or_insert_with(|| FakeTable { columns: columns.clone(), rows: BTreeMap::new() });
        if on_conflict_noop && entry.rows.contains_key(&id) {
            return;
        }
        entry.rows.insert(id, row);
    }

    fn delete(&self, rest: &str, params: &[Value]) {
        let (table, _) = Self::table_name(rest);
        let id = params.first().and_then(Value::as_str).unwrap_or_default();
        if let Some(t) = self.tables.lock().unwrap().get_mut(&table) {
            t.rows.remove(id);
        }
    }
}

#[async_trait]
impl SqlIntrospect for FakeSqlAdapter {
    async fn table_exists(&self, table: &str) -> Result<bool, DbError> {
        Ok(self.tables.lock().unwrap().contains_key(table))
    }

    async fn column_names(&self, table: &str) -> Result<Vec<String>, DbError> {
        Ok(self.tables.lock().unwrap().get(table).map(|t| t.columns.clone()).unwrap_or_default())
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, DbError> {
        let trimmed = sql.trim();
        if trimmed == "SELECT 1" {
            return Ok(0);
        }
        if let Some(rest) = trimmed.strip_prefix("CREATE TABLE ") {
            self.create_table(rest);
        } else if let Some(rest) = trimmed.strip_prefix("ALTER TABLE ") {
            self.alter_table(rest);
        } else if let Some(rest) = trimmed.strip_prefix("DROP TABLE ") {
            self.drop_table(rest);
        } else if let Some(rest) = trimmed.strip_prefix("INSERT INTO ") {
            self.insert(rest, params);
        } else if let Some(rest) = trimmed.strip_prefix("DELETE FROM ") {
            self.delete(rest, params);
        } else {
            return Err(DbError::Provider(format!("fake adapter: unsupported statement: {sql}")));
        }
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planner::{ddl, query::dialect::Postgres};

    #[tokio::test]
    async fn create_then_insert_round_trips_a_row() {
        let adapter = FakeSqlAdapter::new();
        let schema = model::resource::ResourceSchema::new("users")
            .with_attribute("id", "uuid|required")
            .with_attribute("name", "string|required|maxlength:100");
        let sql = ddl::create_table_sql(&schema, "users_table", Some("id"), &Postgres);
        adapter.execute(&sql, &[]).await.unwrap();

        assert!(adapter.table_exists("users_table").await.unwrap());
        let columns = adapter.column_names("users_table").await.unwrap();
        assert_eq!(columns, vec!["id".to_string(), "name".to_string()]);
    }

    #[tokio::test]
    async fn alter_adds_a_new_column_without_dropping_existing_ones() {
        let adapter = FakeSqlAdapter::new();
        let schema = model::resource::ResourceSchema::new("users").with_attribute("id", "uuid|required");
        let create = ddl::create_table_sql(&schema, "users_table", Some("id"), &Postgres);
        adapter.execute(&create, &[]).await.unwrap();

        let field = model::core::field_type::FieldType::parse("string|maxlength:50");
        let alter = ddl::add_column_sql("users_table", "nickname", &field, &Postgres);
        adapter.execute(&alter, &[]).await.unwrap();

        let columns = adapter.column_names("users_table").await.unwrap();
        assert_eq!(columns, vec!["id".to_string(), "nickname".to_string()]);
    }
}
