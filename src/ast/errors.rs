use crate::ast::tree::NodeId;
use crate::ast::types::Range;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AstError {
    #[error("type of node {node:?} could not be resolved{}", range.map(|r| format!(" at {r}")).unwrap_or_default())]
    UnresolvedType { node: NodeId, range: Option<Range> },
}
