use crate::query::ast::{common::TableRef, create_table::{ColumnDef, CreateTable}};

#[derive(Debug, Clone)]
pub struct CreateTableBuilder {
    ast: CreateTable,
}

impl CreateTableBuilder {
    pub fn new(table: TableRef) -> Self {
        Self {
            ast: CreateTable {
                table,
                columns: Vec::new(),
                if_not_exists: false,
            },
        }
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.ast.columns.push(column);
        self
    }

    pub fn columns(mut self, columns: impl IntoIterator<Item = ColumnDef>) -> Self {
        self.ast.columns.extend(columns);
        self
    }

    pub fn if_not_exists(mut self) -> Self {
        self.ast.if_not_exists = true;
        self
    }

    pub fn build(self) -> CreateTable {
        self.ast
    }
}

#[cfg(test)]
mod tests {
    use model::core::data_type::DataType;

    use super::*;

    #[test]
    fn builds_table_with_columns() {
        let ast = CreateTableBuilder::new(TableRef {
            schema: None,
            name: "users".to_string(),
        })
        .if_not_exists()
        .column(ColumnDef::new("id", DataType::Uuid, false).primary_key())
        .column(ColumnDef::new("email", DataType::VarChar(Some(120)), false))
        .build();

        assert!(ast.if_not_exists);
        assert_eq!(ast.columns.len(), 2);
    }
}
