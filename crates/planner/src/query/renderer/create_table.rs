use crate::query::{
    ast::create_table::{ColumnDef, CreateTable},
    renderer::{Render, Renderer},
};

impl Render for CreateTable {
    fn render(&self, r: &mut Renderer) {
        r.sql.push_str("CREATE TABLE ");
        if self.if_not_exists {
            r.sql.push_str("IF NOT EXISTS ");
        }
        r.render_table_ref(&self.table);
        r.sql.push_str(" (");

        let pk_columns: Vec<&str> = self
            .columns
            .iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name.as_str())
            .collect();

        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                r.sql.push_str(", ");
            }
            render_column_def(column, r);
        }

        if pk_columns.len() > 1 {
            r.sql.push_str(", PRIMARY KEY (");
            let quoted: Vec<String> = pk_columns
                .iter()
                .map(|c| r.dialect.quote_identifier(c))
                .collect();
            r.sql.push_str(&quoted.join(", "));
            r.sql.push(')');
        }

        r.sql.push_str(");");
    }
}

fn render_column_def(column: &ColumnDef, r: &mut Renderer) {
    r.sql.push_str(&r.dialect.quote_identifier(&column.name));
    r.sql.push(' ');
    r.sql.push_str(&r.dialect.render_data_type(&column.data_type));

    if column.is_primary_key {
        r.sql.push_str(" PRIMARY KEY");
    }
    if !column.is_nullable {
        r.sql.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default_value {
        r.sql.push_str(" DEFAULT ");
        default.render(r);
    }
}

#[cfg(test)]
mod tests {
    use model::core::data_type::DataType;

    use crate::query::{
        ast::{common::TableRef, create_table::ColumnDef},
        dialect::Postgres,
        renderer::{Render, Renderer},
    };

    use super::CreateTable;

    #[test]
    fn renders_single_primary_key_inline() {
        let ast = CreateTable {
            table: TableRef {
                schema: None,
                name: "users".to_string(),
            },
            columns: vec![
                ColumnDef::new("id", DataType::Uuid, false).primary_key(),
                ColumnDef::new("email", DataType::VarChar(Some(120)), false),
            ],
            if_not_exists: true,
        };

        let mut renderer = Renderer::new(&Postgres);
        ast.render(&mut renderer);
        let (sql, params) = renderer.finish();

        assert_eq!(
            sql,
            r#"CREATE TABLE IF NOT EXISTS "users" ("id" UUID PRIMARY KEY, "email" VARCHAR(120) NOT NULL);"#
        );
        assert!(params.is_empty());
    }
}
