//! Lexer and recursive-descent parser for the Java-like "sketch" syntax.
//!
//! The same grammar is used for rule templates (expressions only) and for the
//! reference host's compilation units (imports and statements).

pub mod errors;
pub mod expr;
pub mod lexer;
pub mod parser;

pub use errors::SyntaxError;
pub use expr::{
    AssignOp, BinaryOp, Expr, ExprKind, Literal, Stmt, StmtKind, UnaryOp, Unit, UpdateOp,
};
pub use parser::{parse_expression, parse_type, parse_unit};
