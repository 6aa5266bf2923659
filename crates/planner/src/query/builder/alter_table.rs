use crate::query::ast::{
    alter_table::{AlterAction, AlterTable},
    common::TableRef,
    create_table::ColumnDef,
};

#[derive(Debug, Clone)]
pub struct AlterTableBuilder {
    table: TableRef,
}

impl AlterTableBuilder {
    pub fn new(table: TableRef) -> Self {
        Self { table }
    }

    pub fn add_column(self, column: ColumnDef) -> AlterTable {
        AlterTable {
            table: self.table,
            action: AlterAction::AddColumn(column),
        }
    }
}

#[cfg(test)]
mod tests {
    use model::core::data_type::DataType;

    use super::*;

    #[test]
    fn builds_add_column() {
        let ast = AlterTableBuilder::new(TableRef {
            schema: None,
            name: "users".to_string(),
        })
        .add_column(ColumnDef::new("age", DataType::BoundedInt, true));

        assert_eq!(ast.table.name, "users");
        match ast.action {
            AlterAction::AddColumn(col) => assert_eq!(col.name, "age"),
        }
    }
}
