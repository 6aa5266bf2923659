use crate::query::ast::common::Ident;
use model::core::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Identifier(Ident),
    Value(Value),
    /// A raw SQL fragment, used for dialect-specific escape hatches
    /// (e.g. `EXCLUDED.col`, `VALUES(col)`).
    Literal(String),
    Cast {
        expr: Box<Expr>,
        data_type: String,
    },
    BinaryOp(Box<BinaryOp>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Eq,
    And,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryOp {
    pub left: Expr,
    pub op: BinaryOperator,
    pub right: Expr,
}
