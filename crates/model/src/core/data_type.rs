//! Destination-facing column types and the dialect mapping table from
//! spec.md §4.2. This is the "Type Mapper" half of the Type Mapper & DDL
//! Generator component; the DDL rendering itself lives in the `planner`
//! crate's `Dialect` trait, grounded on the same split the teacher uses
//! between `model::core::data_type::DataType` (type identity) and
//! `planner::query::dialect::Dialect` (type rendering).

use crate::core::field_type::{BaseType, FieldType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    Postgres,
    MySql,
    Sqlite,
    BigQuery,
}

/// A destination column's resolved, dialect-agnostic type. `Dialect`
/// implementations (see `planner::query::dialect`) turn this into the
/// concrete DDL token (`VARCHAR(50)`, `STRING`, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum DataType {
    /// Bounded or unbounded text. `None` length means "unbounded" (TEXT).
    VarChar(Option<u64>),
    /// 32-bit-range bounded integer (spec: "number (bounded 0..2^31-1)").
    BoundedInt,
    /// Floating point (spec: "number (other)").
    Float,
    Boolean,
    /// object / json / array / embedding all collapse to the dialect's
    /// JSON-ish column type.
    Json,
    Ip4,
    Ip6,
    /// secret is always stored as opaque text.
    Secret,
    Uuid,
    Date,
    DateTime,
}

impl DataType {
    /// The "Type Mapper": resolves a source field-type notation into a
    /// destination column type, independent of any one dialect. Unknown
    /// base types defensively fall back to unbounded text (spec edge case).
    pub fn from_field_type(field: &FieldType) -> DataType {
        match &field.base {
            BaseType::String => DataType::VarChar(field.max_length),
            BaseType::Number => {
                if field.is_bounded_integer() {
                    DataType::BoundedInt
                } else {
                    DataType::Float
                }
            }
            BaseType::Boolean => DataType::Boolean,
            BaseType::Object | BaseType::Json | BaseType::Array | BaseType::Embedding => {
                DataType::Json
            }
            BaseType::Ip4 => DataType::Ip4,
            BaseType::Ip6 => DataType::Ip6,
            BaseType::Secret => DataType::Secret,
            BaseType::Uuid => DataType::Uuid,
            BaseType::Date => DataType::Date,
            BaseType::DateTime => DataType::DateTime,
            BaseType::Unknown(_) => DataType::VarChar(None),
        }
    }

    pub fn postgres_name(&self) -> String {
        match self {
            DataType::VarChar(Some(n)) => format!("VARCHAR({n})"),
            DataType::VarChar(None) => "TEXT".into(),
            DataType::BoundedInt => "INTEGER".into(),
            DataType::Float => "DOUBLE PRECISION".into(),
            DataType::Boolean => "BOOLEAN".into(),
            DataType::Json => "JSONB".into(),
            DataType::Ip4 | DataType::Ip6 => "INET".into(),
            DataType::Secret => "TEXT".into(),
            DataType::Uuid => "UUID".into(),
            DataType::Date | DataType::DateTime => "TIMESTAMPTZ".into(),
        }
    }

    pub fn mysql_name(&self) -> String {
        match self {
            DataType::VarChar(Some(n)) if *n <= 255 => format!("VARCHAR({n})"),
            DataType::VarChar(_) => "TEXT".into(),
            DataType::BoundedInt => "INT".into(),
            DataType::Float => "DOUBLE".into(),
            DataType::Boolean => "TINYINT(1)".into(),
            DataType::Json => "JSON".into(),
            DataType::Ip4 => "VARCHAR(15)".into(),
            DataType::Ip6 => "VARCHAR(45)".into(),
            DataType::Secret => "TEXT".into(),
            DataType::Uuid => "CHAR(36)".into(),
            DataType::Date | DataType::DateTime => "DATETIME".into(),
        }
    }

    pub fn sqlite_name(&self) -> String {
        match self {
            DataType::BoundedInt => "INTEGER".into(),
            DataType::Float => "REAL".into(),
            DataType::Boolean => "INTEGER".into(),
            // SQLite is dynamically typed; everything else is stored as TEXT.
            _ => "TEXT".into(),
        }
    }

    pub fn bigquery_name(&self) -> String {
        match self {
            DataType::VarChar(_) => "STRING".into(),
            DataType::BoundedInt => "INT64".into(),
            DataType::Float => "FLOAT64".into(),
            DataType::Boolean => "BOOL".into(),
            DataType::Json => "JSON".into(),
            DataType::Ip4 | DataType::Ip6 | DataType::Secret | DataType::Uuid => "STRING".into(),
            DataType::Date => "DATE".into(),
            DataType::DateTime => "TIMESTAMP".into(),
        }
    }

    pub fn name(&self, dialect: SqlDialect) -> String {
        match dialect {
            SqlDialect::Postgres => self.postgres_name(),
            SqlDialect::MySql => self.mysql_name(),
            SqlDialect::Sqlite => self.sqlite_name(),
            SqlDialect::BigQuery => self.bigquery_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_string_maps_to_varchar() {
        let ft = FieldType::parse("string|required|maxlength:100");
        let dt = DataType::from_field_type(&ft);
        assert_eq!(dt.postgres_name(), "VARCHAR(100)");
        assert_eq!(dt.mysql_name(), "VARCHAR(100)");
        assert_eq!(dt.bigquery_name(), "STRING");
    }

    #[test]
    fn unbounded_string_maps_to_text() {
        let ft = FieldType::parse("string");
        let dt = DataType::from_field_type(&ft);
        assert_eq!(dt.postgres_name(), "TEXT");
        assert_eq!(dt.sqlite_name(), "TEXT");
    }

    #[test]
    fn bounded_number_is_integer_everywhere() {
        let ft = FieldType::parse("number|min:0|max:120");
        let dt = DataType::from_field_type(&ft);
        assert_eq!(dt.postgres_name(), "INTEGER");
        assert_eq!(dt.mysql_name(), "INT");
        assert_eq!(dt.sqlite_name(), "INTEGER");
        assert_eq!(dt.bigquery_name(), "INT64");
    }

    #[test]
    fn unbounded_number_is_floating_point() {
        let ft = FieldType::parse("number");
        let dt = DataType::from_field_type(&ft);
        assert_eq!(dt.postgres_name(), "DOUBLE PRECISION");
        assert_eq!(dt.bigquery_name(), "FLOAT64");
    }

    #[test]
    fn long_mysql_varchar_falls_back_to_text() {
        let ft = FieldType::parse("string|maxlength:1000");
        let dt = DataType::from_field_type(&ft);
        assert_eq!(dt.mysql_name(), "TEXT");
    }

    #[test]
    fn unknown_base_type_defaults_to_text() {
        let ft = FieldType::parse("vectorblob");
        let dt = DataType::from_field_type(&ft);
        assert_eq!(dt.postgres_name(), "TEXT");
    }
}
