use crate::query::{
    ast::expr::{BinaryOperator, Expr},
    renderer::{Render, Renderer},
};

impl Render for Expr {
    fn render(&self, r: &mut Renderer) {
        match self {
            Expr::Identifier(ident) => {
                if let Some(qualifier) = &ident.qualifier {
                    r.sql.push_str(&r.dialect.quote_identifier(qualifier));
                    r.sql.push('.');
                }
                r.sql.push_str(&r.dialect.quote_identifier(&ident.name));
            }
            Expr::Value(value) => r.add_param(value.clone()),
            Expr::Literal(text) => r.sql.push_str(text),
            Expr::Cast { expr, data_type } => {
                r.sql.push_str("CAST(");
                expr.render(r);
                r.sql.push_str(" AS ");
                r.sql.push_str(data_type);
                r.sql.push(')');
            }
            Expr::BinaryOp(op) => op.render(r),
        }
    }
}

impl Render for crate::query::ast::expr::BinaryOp {
    fn render(&self, r: &mut Renderer) {
        self.left.render(r);
        r.sql.push(' ');
        r.sql.push_str(match self.op {
            BinaryOperator::Eq => "=",
            BinaryOperator::And => "AND",
        });
        r.sql.push(' ');
        self.right.render(r);
    }
}
