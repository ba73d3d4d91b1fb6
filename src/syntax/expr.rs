//! Surface syntax trees produced by the parser.
//!
//! These are untyped and unresolved. Rule templates are lowered from them into
//! [`crate::template::TemplateNode`]s; host units are lowered into a typed
//! [`crate::ast::SyntaxTree`].

use crate::ast::{Range, Type};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Integer literal, compared by value. `raw` keeps the spelling (`0L`, `0x10`).
    Int { value: i128, long: bool, raw: String },
    Float { value: f64, double: bool, raw: String },
    Str(String),
    Char(char),
    Bool(bool),
    Null,
}

impl Literal {
    /// Value equality: `0` and `0L` are the same value, spelling is ignored.
    pub fn same_value(&self, other: &Literal) -> bool {
        match (self, other) {
            (Literal::Int { value: a, .. }, Literal::Int { value: b, .. }) => a == b,
            (Literal::Float { value: a, .. }, Literal::Float { value: b, .. }) => a == b,
            (Literal::Int { value: a, .. }, Literal::Float { value: b, .. })
            | (Literal::Float { value: b, .. }, Literal::Int { value: a, .. }) => *a as f64 == *b,
            (a, b) => a == b,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Literal::Null)
    }

    /// Source spelling of the literal.
    pub fn spelling(&self) -> String {
        match self {
            Literal::Int { raw, .. } | Literal::Float { raw, .. } => raw.clone(),
            Literal::Str(s) => format!("\"{}\"", escape(s)),
            Literal::Char(c) => format!("'{}'", escape(&c.to_string())),
            Literal::Bool(b) => b.to_string(),
            Literal::Null => "null".to_string(),
        }
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '"' => out.push_str("\\\""),
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            other => out.push(other),
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    BitNot,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Neg => "-",
            UnaryOp::Plus => "+",
            UnaryOp::BitNot => "~",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        }
    }

    /// Binding strength, higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 3,
            BinaryOp::And => 4,
            BinaryOp::Eq | BinaryOp::Ne => 5,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 6,
            BinaryOp::Add | BinaryOp::Sub => 7,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 8,
        }
    }

    /// The operator yielding the logical complement, for comparisons only.
    pub fn negated(self) -> Option<BinaryOp> {
        match self {
            BinaryOp::Eq => Some(BinaryOp::Ne),
            BinaryOp::Ne => Some(BinaryOp::Eq),
            BinaryOp::Lt => Some(BinaryOp::Ge),
            BinaryOp::Ge => Some(BinaryOp::Lt),
            BinaryOp::Gt => Some(BinaryOp::Le),
            BinaryOp::Le => Some(BinaryOp::Gt),
            _ => None,
        }
    }

    pub fn is_comparison(self) -> bool {
        self.negated().is_some()
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::Or | BinaryOp::And)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
}

impl AssignOp {
    pub fn symbol(self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::AddAssign => "+=",
            AssignOp::SubAssign => "-=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Name(String),
    Field {
        receiver: Box<Expr>,
        name: String,
    },
    Call {
        receiver: Option<Box<Expr>>,
        type_args: Vec<Type>,
        name: String,
        args: Vec<Expr>,
    },
    MethodRef {
        target: Box<Expr>,
        name: String,
    },
    Lambda {
        params: Vec<(String, Range)>,
        body: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Parens(Box<Expr>),
    ArrayInit(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Import {
        path: String,
        is_static: bool,
    },
    Local {
        ty: Type,
        name: String,
        init: Option<Expr>,
    },
    Assign {
        target: Expr,
        op: AssignOp,
        value: Expr,
    },
    Update {
        target: Expr,
        op: UpdateOp,
    },
    Return(Expr),
    If {
        cond: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },
    Block(Vec<Stmt>),
    Expr(Expr),
}

/// A parsed compilation unit: a flat sequence of statements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Unit {
    pub stmts: Vec<Stmt>,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(value: i128, raw: &str) -> Literal {
        Literal::Int {
            value,
            long: raw.ends_with('L'),
            raw: raw.to_string(),
        }
    }

    #[test]
    fn numeric_literals_compare_by_value() {
        assert!(int(0, "0").same_value(&int(0, "0L")));
        assert!(int(16, "0x10").same_value(&int(16, "16")));
        assert!(!int(0, "0").same_value(&int(1, "1")));
    }

    #[test]
    fn comparison_negation_is_an_involution() {
        for op in [
            BinaryOp::Eq,
            BinaryOp::Ne,
            BinaryOp::Lt,
            BinaryOp::Le,
            BinaryOp::Gt,
            BinaryOp::Ge,
        ] {
            let negated = op.negated().unwrap();
            assert_eq!(negated.negated(), Some(op));
        }
        assert_eq!(BinaryOp::Add.negated(), None);
    }

    #[test]
    fn string_spelling_escapes_quotes() {
        assert_eq!(Literal::Str("a\"b".into()).spelling(), "\"a\\\"b\"");
    }
}
