use crate::query::{
    ast::insert::{Insert, OnConflict},
    renderer::{Render, Renderer},
};

impl Render for Insert {
    fn render(&self, r: &mut Renderer) {
        r.sql.push_str("INSERT INTO ");
        r.render_table_ref(&self.table);
        r.sql.push_str(" (");
        let quoted_columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| r.dialect.quote_identifier(c))
            .collect();
        r.sql.push_str(&quoted_columns.join(", "));
        r.sql.push_str(") VALUES (");
        for (i, val) in self.values.iter().enumerate() {
            if i > 0 {
                r.sql.push_str(", ");
            }
            val.render(r);
        }
        r.sql.push(')');

        if let Some(on_conflict) = &self.on_conflict {
            render_on_conflict(on_conflict, r);
        }

        if self.returning {
            r.sql.push_str(" RETURNING *");
        }
        r.sql.push(';');
    }
}

fn render_on_conflict(on_conflict: &OnConflict, r: &mut Renderer) {
    match on_conflict {
        OnConflict::DoNothing { columns } => {
            r.sql.push_str(" ON CONFLICT (");
            let quoted: Vec<String> = columns
                .iter()
                .map(|c| r.dialect.quote_identifier(c))
                .collect();
            r.sql.push_str(&quoted.join(", "));
            r.sql.push_str(") DO NOTHING");
        }
        OnConflict::OnDuplicateKeyNoop { column } => {
            let quoted = r.dialect.quote_identifier(column);
            r.sql
                .push_str(&format!(" ON DUPLICATE KEY UPDATE {quoted} = {quoted}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use model::core::value::Value;

    use crate::query::{
        ast::{common::TableRef, insert::OnConflict},
        dialect::{MySql, Postgres},
        renderer::{Render, Renderer},
    };
    use crate::value;

    use super::Insert;

    fn insert_fixture() -> Insert {
        Insert {
            table: TableRef {
                schema: None,
                name: "users".to_string(),
            },
            columns: vec!["id".to_string(), "name".to_string()],
            values: vec![
                value!(Value::Uuid(uuid::Uuid::nil())),
                value!(Value::String("Alice".to_string())),
            ],
            on_conflict: None,
            returning: false,
        }
    }

    #[test]
    fn renders_postgres_on_conflict_do_nothing_returning() {
        let mut ast = insert_fixture();
        ast.on_conflict = Some(OnConflict::DoNothing {
            columns: vec!["id".to_string()],
        });
        ast.returning = true;

        let mut renderer = Renderer::new(&Postgres);
        ast.render(&mut renderer);
        let (sql, params) = renderer.finish();

        assert_eq!(
            sql,
            r#"INSERT INTO "users" ("id", "name") VALUES ($1, $2) ON CONFLICT ("id") DO NOTHING RETURNING *;"#
        );
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn renders_mysql_on_duplicate_key_noop() {
        let mut ast = insert_fixture();
        ast.on_conflict = Some(OnConflict::OnDuplicateKeyNoop {
            column: "id".to_string(),
        });

        let mut renderer = Renderer::new(&MySql);
        ast.render(&mut renderer);
        let (sql, _) = renderer.finish();

        assert_eq!(
            sql,
            "INSERT INTO `users` (`id`, `name`) VALUES (?, ?) ON DUPLICATE KEY UPDATE `id` = `id`;"
        );
    }
}
