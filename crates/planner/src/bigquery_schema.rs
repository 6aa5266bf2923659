//! BigQuery schema generation. BigQuery's Tables API takes a structured
//! field list rather than DDL text, so this sits alongside `crate::ddl`
//! instead of going through the `Dialect`/`Renderer` pipeline.

use model::{core::data_type::DataType, resource::ResourceSchema, route::Mutability};
use serde::Serialize;

/// One entry in a BigQuery `TableSchema.fields` list.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub mode: String,
}

impl SchemaField {
    fn new(name: impl Into<String>, field_type: String, required: bool) -> Self {
        SchemaField {
            name: name.into(),
            field_type,
            mode: if required { "REQUIRED" } else { "NULLABLE" }.to_string(),
        }
    }
}

/// BigQuery tracking columns added to every mutable/immutable table
/// (spec.md §6, Mutability policy).
pub const OPERATION_TYPE_COLUMN: &str = "_operation_type";
pub const OPERATION_TIMESTAMP_COLUMN: &str = "_operation_timestamp";
pub const IS_DELETED_COLUMN: &str = "_is_deleted";
pub const VERSION_COLUMN: &str = "_version";

/// Builds the field list for a resource's replicable attributes under a
/// given mutability mode (spec.md §3 "Mutability-tracking columns"):
/// `id: STRING, REQUIRED` is always first; `append-only` and `immutable`
/// both append `_operation_type`/`_operation_timestamp`, and `immutable`
/// additionally appends `_is_deleted`/`_version`. `mutable` tables carry
/// no tracking columns at all, since DML updates/deletes the row in place.
pub fn schema_fields(schema: &ResourceSchema, mutability: Mutability) -> Vec<SchemaField> {
    let mut fields = vec![SchemaField::new("id", "STRING".into(), true)];

    fields.extend(
        schema
            .replicable_attributes()
            .into_iter()
            .filter(|(name, _)| name != "id")
            .map(|(name, field_type)| {
                let data_type = DataType::from_field_type(&field_type);
                SchemaField::new(name, data_type.bigquery_name(), field_type.required)
            }),
    );

    if matches!(mutability, Mutability::AppendOnly | Mutability::Immutable) {
        fields.push(SchemaField::new(OPERATION_TYPE_COLUMN, "STRING".into(), true));
        fields.push(SchemaField::new(
            OPERATION_TIMESTAMP_COLUMN,
            "TIMESTAMP".into(),
            true,
        ));
    }
    if matches!(mutability, Mutability::Immutable) {
        fields.push(SchemaField::new(IS_DELETED_COLUMN, "BOOL".into(), true));
        fields.push(SchemaField::new(VERSION_COLUMN, "INT64".into(), true));
    }

    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> ResourceSchema {
        ResourceSchema::new("orders")
            .with_attribute("id", "uuid|required")
            .with_attribute("total", "number")
    }

    #[test]
    fn id_is_always_first_and_string_regardless_of_attribute_type() {
        let fields = schema_fields(&sample_schema(), Mutability::Mutable);
        assert_eq!(fields[0].name, "id");
        assert_eq!(fields[0].field_type, "STRING");
        assert_eq!(fields[0].mode, "REQUIRED");
    }

    #[test]
    fn mutable_has_no_tracking_columns() {
        let fields = schema_fields(&sample_schema(), Mutability::Mutable);
        assert_eq!(fields.len(), 2);
        assert!(fields.iter().all(|f| f.name != OPERATION_TYPE_COLUMN));
    }

    #[test]
    fn append_only_adds_only_operation_tracking_columns() {
        let fields = schema_fields(&sample_schema(), Mutability::AppendOnly);
        assert_eq!(fields.len(), 4);
        assert!(fields.iter().any(|f| f.name == OPERATION_TYPE_COLUMN));
        assert!(fields.iter().any(|f| f.name == OPERATION_TIMESTAMP_COLUMN));
        assert!(fields.iter().all(|f| f.name != VERSION_COLUMN));
        assert!(fields.iter().all(|f| f.name != IS_DELETED_COLUMN));
    }

    #[test]
    fn immutable_adds_all_four_tracking_columns() {
        let fields = schema_fields(&sample_schema(), Mutability::Immutable);
        assert_eq!(fields.len(), 6);
        assert!(fields.iter().any(|f| f.name == VERSION_COLUMN));
        assert!(fields.iter().any(|f| f.name == IS_DELETED_COLUMN));
    }
}
