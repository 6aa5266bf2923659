use crate::query::{
    ast::alter_table::{AlterAction, AlterTable},
    renderer::{Render, Renderer},
};

impl Render for AlterTable {
    fn render(&self, r: &mut Renderer) {
        r.sql.push_str("ALTER TABLE ");
        r.render_table_ref(&self.table);
        match &self.action {
            AlterAction::AddColumn(column) => {
                r.sql.push_str(" ADD COLUMN ");
                r.sql.push_str(&r.dialect.quote_identifier(&column.name));
                r.sql.push(' ');
                r.sql.push_str(&r.dialect.render_data_type(&column.data_type));
                if !column.is_nullable {
                    r.sql.push_str(" NOT NULL");
                }
                if let Some(default) = &column.default_value {
                    r.sql.push_str(" DEFAULT ");
                    default.render(r);
                }
            }
        }
        r.sql.push(';');
    }
}

#[cfg(test)]
mod tests {
    use model::core::data_type::DataType;

    use crate::query::{
        ast::{common::TableRef, create_table::ColumnDef},
        dialect::MySql,
        renderer::{Render, Renderer},
    };

    use super::{AlterAction, AlterTable};

    #[test]
    fn renders_add_column_mysql() {
        let ast = AlterTable {
            table: TableRef {
                schema: None,
                name: "users".to_string(),
            },
            action: AlterAction::AddColumn(ColumnDef::new(
                "signup_source",
                DataType::VarChar(Some(32)),
                true,
            )),
        };

        let mut renderer = Renderer::new(&MySql);
        ast.render(&mut renderer);
        let (sql, _) = renderer.finish();

        assert_eq!(
            sql,
            "ALTER TABLE `users` ADD COLUMN `signup_source` VARCHAR(32);"
        );
    }
}
