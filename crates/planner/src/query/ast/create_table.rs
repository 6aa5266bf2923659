use crate::query::ast::{common::TableRef, expr::Expr};
use model::core::data_type::DataType;

#[derive(Debug, Clone, Default)]
pub struct CreateTable {
    pub table: TableRef,
    pub columns: Vec<ColumnDef>,
    pub if_not_exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
    pub is_nullable: bool,
    pub is_primary_key: bool,
    pub default_value: Option<Expr>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: DataType, is_nullable: bool) -> Self {
        ColumnDef {
            name: name.into(),
            data_type,
            is_nullable,
            is_primary_key: false,
            default_value: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.is_nullable = false;
        self
    }

    pub fn with_default(mut self, default: Expr) -> Self {
        self.default_value = Some(default);
        self
    }
}
