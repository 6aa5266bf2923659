use crate::query::{
    ast::delete::Delete,
    renderer::{Render, Renderer},
};

impl Render for Delete {
    fn render(&self, r: &mut Renderer) {
        r.sql.push_str("DELETE FROM ");
        r.render_table_ref(&self.table);
        r.sql.push_str(" WHERE ");
        r.sql.push_str(&r.dialect.quote_identifier(&self.id_column));
        r.sql.push_str(" = ");
        let placeholder = r.dialect.get_placeholder(0);
        r.sql.push_str(&placeholder);
        if self.returning {
            r.sql.push_str(" RETURNING *");
        }
        r.sql.push(';');
    }
}

#[cfg(test)]
mod tests {
    use crate::query::{ast::common::TableRef, dialect::Postgres, renderer::Renderer};

    use super::*;

    #[test]
    fn renders_delete_with_returning() {
        let ast = Delete {
            table: TableRef {
                schema: None,
                name: "users".to_string(),
            },
            id_column: "id".to_string(),
            returning: true,
        };

        let mut renderer = Renderer::new(&Postgres);
        ast.render(&mut renderer);
        let (sql, params) = renderer.finish();

        assert_eq!(sql, r#"DELETE FROM "users" WHERE "id" = $1 RETURNING *;"#);
        assert!(params.is_empty());
    }
}
