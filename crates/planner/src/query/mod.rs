use crate::query::ast::common::Ident;
use model::core::value::Value;

pub mod ast;
pub mod builder;
pub mod dialect;
pub mod macros;
pub mod renderer;

pub fn ident(name: &str) -> ast::expr::Expr {
    ast::expr::Expr::Identifier(Ident {
        qualifier: None,
        name: name.to_string(),
    })
}

pub fn value(val: Value) -> ast::expr::Expr {
    ast::expr::Expr::Value(val)
}
