use crate::query::ast::common::TableRef;

#[derive(Debug, Clone)]
pub struct Delete {
    pub table: TableRef,
    pub id_column: String,
    /// Postgres: append `RETURNING *` (spec.md §4.5).
    pub returning: bool,
}
