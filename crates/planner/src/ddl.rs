//! The Type Mapper & DDL Generator component (spec.md §4.2): turns a
//! `ResourceSchema` into dialect-correct DDL text for the three SQL
//! destinations (Postgres, MySQL/MariaDB/PlanetScale, SQLite/Turso).
//! BigQuery's schema changes go through `crate::bigquery_schema` instead.

use model::{core::data_type::DataType, resource::ResourceSchema};

use crate::query::{
    ast::create_table::ColumnDef,
    builder::{alter_table::AlterTableBuilder, create_table::CreateTableBuilder, drop_table::DropTableBuilder},
    dialect::Dialect,
    renderer::render,
    table_ref,
};

/// Builds the `CREATE TABLE` statement for a resource's replicable
/// attributes. `id VARCHAR(255) PRIMARY KEY` (rendered `TEXT` by the
/// SQLite dialect) is always the first column, per spec.md §4.2; any
/// `id` entry in the attribute map itself is skipped so it is never
/// duplicated. `primary_key`, when it names a different column (e.g. a
/// log table with its own autoincrement key), marks that column instead
/// of the synthesized `id`.
pub fn create_table_sql(
    schema: &ResourceSchema,
    table_name: &str,
    primary_key: Option<&str>,
    dialect: &dyn Dialect,
) -> String {
    let mut builder = CreateTableBuilder::new(table_ref!(table_name)).if_not_exists();

    if primary_key.is_none() || primary_key == Some("id") {
        builder = builder.column(ColumnDef::new("id", DataType::VarChar(Some(255)), false).primary_key());
    }

    for (name, field_type) in schema.replicable_attributes() {
        if name == "id" {
            continue;
        }
        let data_type = DataType::from_field_type(&field_type);
        let is_nullable = !field_type.required;
        let mut column = ColumnDef::new(name.clone(), data_type, is_nullable);
        if Some(name.as_str()) == primary_key {
            column = column.primary_key();
        }
        builder = builder.column(column);
    }

    let ast = builder.build();
    let (sql, _) = render(&ast, dialect);
    sql
}

/// Builds the `ALTER TABLE ... ADD COLUMN` statement for a single new
/// attribute discovered during schema sync (spec.md §5, `alter` strategy).
pub fn add_column_sql(
    table_name: &str,
    column_name: &str,
    field_type: &model::core::field_type::FieldType,
    dialect: &dyn Dialect,
) -> String {
    let data_type = DataType::from_field_type(field_type);
    let column = ColumnDef::new(column_name, data_type, !field_type.required);
    let ast = AlterTableBuilder::new(table_ref!(table_name)).add_column(column);
    let (sql, _) = render(&ast, dialect);
    sql
}

/// Builds the `DROP TABLE IF EXISTS` statement used by the `drop-create`
/// schema sync strategy (spec.md §5).
pub fn drop_table_sql(table_name: &str, dialect: &dyn Dialect) -> String {
    let ast = DropTableBuilder::new(table_ref!(table_name))
        .if_exists()
        .build();
    let (sql, _) = render(&ast, dialect);
    sql
}

#[cfg(test)]
mod tests {
    use model::core::field_type::FieldType;

    use super::*;
    use crate::query::dialect::{MySql, Postgres};

    fn sample_schema() -> ResourceSchema {
        ResourceSchema::new("users")
            .with_attribute("id", "uuid|required")
            .with_attribute("email", "string|required|maxlength:120")
    }

    #[test]
    fn generates_create_table_with_primary_key_postgres() {
        let schema = sample_schema();
        let sql = create_table_sql(&schema, "users", Some("id"), &Postgres);
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"users\" (\"id\" VARCHAR(255) PRIMARY KEY, "));
        assert!(sql.contains("\"email\" VARCHAR(120) NOT NULL"));
    }

    #[test]
    fn id_column_is_always_first_even_when_attributes_sort_earlier() {
        let schema = ResourceSchema::new("orders")
            .with_attribute("id", "uuid|required")
            .with_attribute("amount", "number|min:0|max:100");
        let sql = create_table_sql(&schema, "orders", Some("id"), &Postgres);
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"orders\" (\"id\" VARCHAR(255) PRIMARY KEY, \"amount\""));
    }

    #[test]
    fn sqlite_renders_id_as_text_primary_key() {
        use crate::query::dialect::Sqlite;
        let schema = sample_schema();
        let sql = create_table_sql(&schema, "users", Some("id"), &Sqlite);
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"users\" (\"id\" TEXT PRIMARY KEY, "));
    }

    #[test]
    fn generates_add_column_mysql() {
        let field = FieldType::parse("number|min:0|max:10");
        let sql = add_column_sql("users", "retry_count", &field, &MySql);
        assert_eq!(sql, "ALTER TABLE `users` ADD COLUMN `retry_count` INT NOT NULL;");
    }
}
