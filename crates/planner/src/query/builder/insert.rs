use crate::query::ast::{common::TableRef, expr::Expr, insert::{Insert, OnConflict}};

#[derive(Debug, Clone)]
pub struct InsertBuilder {
    ast: Insert,
}

impl InsertBuilder {
    pub fn new(table: TableRef) -> Self {
        Self {
            ast: Insert {
                table,
                columns: Vec::new(),
                values: Vec::new(),
                on_conflict: None,
                returning: false,
            },
        }
    }

    pub fn column(mut self, name: impl Into<String>, value: Expr) -> Self {
        self.ast.columns.push(name.into());
        self.ast.values.push(value);
        self
    }

    pub fn on_conflict(mut self, on_conflict: OnConflict) -> Self {
        self.ast.on_conflict = Some(on_conflict);
        self
    }

    pub fn returning(mut self) -> Self {
        self.ast.returning = true;
        self
    }

    pub fn build(self) -> Insert {
        self.ast
    }
}

#[cfg(test)]
mod tests {
    use model::core::value::Value;

    use super::*;
    use crate::value;

    #[test]
    fn builds_insert_with_columns_in_order() {
        let ast = InsertBuilder::new(TableRef {
            schema: None,
            name: "users".to_string(),
        })
        .column("id", value!(Value::Int(1)))
        .column("name", value!(Value::String("Alice".to_string())))
        .returning()
        .build();

        assert_eq!(ast.columns, vec!["id", "name"]);
        assert_eq!(ast.values.len(), 2);
        assert!(ast.returning);
    }
}
