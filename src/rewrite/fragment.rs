use crate::ast::{Import, NodeId, NodeKind, SymbolId, Type};

/// How a synthesized identifier resolves once grafted.
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolRef {
    Existing(SymbolId),
    Class { simple: String, qualified: String },
    /// A lambda parameter introduced by the rewrite, shared by its uses.
    Fresh(usize),
}

/// An instantiated after-template, not yet part of the tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// A subtree of the matched code, reused as is.
    Existing(NodeId),
    Node {
        kind: NodeKind,
        children: Vec<Fragment>,
        symbol: Option<SymbolRef>,
        ty: Option<Type>,
    },
}

impl Fragment {
    pub fn node(kind: NodeKind, children: Vec<Fragment>) -> Self {
        Fragment::Node {
            kind,
            children,
            symbol: None,
            ty: None,
        }
    }

    pub fn kind(&self) -> Option<&NodeKind> {
        match self {
            Fragment::Node { kind, .. } => Some(kind),
            Fragment::Existing(_) => None,
        }
    }
}

/// A rewrite ready to be grafted at `slot`.
#[derive(Debug, Clone, PartialEq)]
pub struct Replacement {
    pub rule: String,
    pub site: NodeId,
    /// `site` together with the parentheses wrapping it.
    pub slot: NodeId,
    pub fragment: Fragment,
    pub imports: Vec<Import>,
    pub comments: Vec<String>,
}
