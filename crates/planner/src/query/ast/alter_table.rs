use crate::query::ast::{common::TableRef, create_table::ColumnDef};

#[derive(Debug, Clone)]
pub struct AlterTable {
    pub table: TableRef,
    pub action: AlterAction,
}

#[derive(Debug, Clone)]
pub enum AlterAction {
    AddColumn(ColumnDef),
}
