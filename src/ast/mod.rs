//! Typed AST view: the engine's only window onto host code.

pub mod errors;
pub mod hierarchy;
pub mod tree;
pub mod types;
pub mod view;

pub use errors::AstError;
pub use hierarchy::{ClassDecl, FunctionalSignature, TypeHierarchy};
pub use tree::{
    Import, KindTag, Node, NodeId, NodeKind, Retype, RewriteMark, Symbol, SymbolId,
    SymbolKind, SyntaxTree,
};
pub use types::{simple_class_name, Primitive, Range, Type};
pub use view::AstView;
