//! Defines the `Dialect` trait for database-specific SQL syntax.
//!
//! BigQuery is not a SQL dialect here: its schema changes go through the
//! structured Tables API rather than hand-rendered DDL text, so it has its
//! own generator in `crate::bigquery_schema` instead of a `Dialect` impl.

use model::core::data_type::DataType;

pub trait Dialect: Send + Sync {
    /// Wraps an identifier (like a table or column name) in the correct
    /// quotation marks for the dialect.
    ///
    /// - PostgreSQL and SQLite use double quotes: `"my_column"`
    /// - MySQL uses backticks: `` `my_column` ``
    fn quote_identifier(&self, ident: &str) -> String;

    /// Returns the placeholder for a parameterized query.
    ///
    /// - PostgreSQL/SQLite use `$1`, `$2`, etc.
    /// - MySQL uses `?`
    fn get_placeholder(&self, index: usize) -> String;

    /// Renders a generic `DataType` into a database-specific SQL type
    /// string. Length/precision is already baked into `DataType` itself.
    fn render_data_type(&self, data_type: &DataType) -> String;

    /// Returns the name of the dialect (e.g., "PostgreSQL", "MySQL").
    fn name(&self) -> String;

    /// Whether `INSERT ... ON CONFLICT DO NOTHING` (vs. MySQL's
    /// `ON DUPLICATE KEY UPDATE`) is this dialect's idempotent-insert idiom.
    fn supports_on_conflict(&self) -> bool;
}

#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl Dialect for Postgres {
    fn quote_identifier(&self, ident: &str) -> String {
        format!(r#""{ident}""#)
    }

    fn get_placeholder(&self, index: usize) -> String {
        format!("${}", index + 1)
    }

    fn render_data_type(&self, data_type: &DataType) -> String {
        data_type.postgres_name()
    }

    fn name(&self) -> String {
        "PostgreSQL".into()
    }

    fn supports_on_conflict(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MySql;

impl Dialect for MySql {
    fn quote_identifier(&self, ident: &str) -> String {
        format!(r#"`{ident}`"#)
    }

    fn get_placeholder(&self, _index: usize) -> String {
        "?".into()
    }

    fn render_data_type(&self, data_type: &DataType) -> String {
        data_type.mysql_name()
    }

    fn name(&self) -> String {
        "MySQL".into()
    }

    fn supports_on_conflict(&self) -> bool {
        false
    }
}

/// Also used to render Turso/libSQL DDL, which is SQLite-compatible.
#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl Dialect for Sqlite {
    fn quote_identifier(&self, ident: &str) -> String {
        format!(r#""{ident}""#)
    }

    fn get_placeholder(&self, index: usize) -> String {
        format!("${}", index + 1)
    }

    fn render_data_type(&self, data_type: &DataType) -> String {
        data_type.sqlite_name()
    }

    fn name(&self) -> String {
        "SQLite".into()
    }

    fn supports_on_conflict(&self) -> bool {
        true
    }
}
