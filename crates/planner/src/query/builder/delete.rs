use crate::query::ast::{common::TableRef, delete::Delete};

#[derive(Debug, Clone)]
pub struct DeleteBuilder {
    ast: Delete,
}

impl DeleteBuilder {
    pub fn new(table: TableRef, id_column: impl Into<String>) -> Self {
        Self {
            ast: Delete {
                table,
                id_column: id_column.into(),
                returning: false,
            },
        }
    }

    pub fn returning(mut self) -> Self {
        self.ast.returning = true;
        self
    }

    pub fn build(self) -> Delete {
        self.ast
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_delete_by_id() {
        let ast = DeleteBuilder::new(
            TableRef {
                schema: None,
                name: "users".to_string(),
            },
            "id",
        )
        .returning()
        .build();

        assert_eq!(ast.id_column, "id");
        assert!(ast.returning);
    }
}
