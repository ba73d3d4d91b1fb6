use crate::ast::{NodeId, SymbolId};
use crate::matcher::unify::TypeEnv;
use crate::template::{HoleId, PlaceholderId, TemplateNode};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoleValue {
    Single(NodeId),
    /// Trailing arguments bound by a repeated hole.
    Many(Vec<NodeId>),
}

/// A host lambda parameter standing in for a template lambda parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LambdaParam {
    pub name: String,
    pub symbol: Option<SymbolId>,
}

/// What a placeholder matched: the subexpression plus every position where it
/// uses one of the placeholder's arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderCapture {
    pub node: NodeId,
    /// `(node, parameter index)` in pre-order.
    pub occurrences: Vec<(NodeId, usize)>,
}

impl PlaceholderCapture {
    pub fn occurrence(&self, node: NodeId) -> Option<usize> {
        self.occurrences
            .iter()
            .find(|(at, _)| *at == node)
            .map(|(_, param)| *param)
    }
}

/// A placeholder seen during the structural match, checked once the whole
/// before-template has matched.
#[derive(Debug, Clone)]
pub(crate) struct PendingPlaceholder {
    pub id: PlaceholderId,
    pub args: Vec<TemplateNode>,
    pub node: NodeId,
    pub lambdas: BTreeMap<String, LambdaParam>,
}

/// Result of a successful match attempt.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    pub holes: BTreeMap<HoleId, HoleValue>,
    pub types: TypeEnv,
    pub placeholders: BTreeMap<PlaceholderId, PlaceholderCapture>,
    /// Template lambda parameters in scope during the structural walk.
    pub(crate) lambdas: BTreeMap<String, LambdaParam>,
    pub(crate) pending: Vec<PendingPlaceholder>,
}

impl Bindings {
    pub fn new(types: TypeEnv) -> Self {
        Self {
            types,
            ..Self::default()
        }
    }

    pub fn hole(&self, id: HoleId) -> Option<&HoleValue> {
        self.holes.get(&id)
    }

    pub fn single(&self, id: HoleId) -> Option<NodeId> {
        match self.holes.get(&id) {
            Some(HoleValue::Single(node)) => Some(*node),
            _ => None,
        }
    }

    pub fn placeholder(&self, id: PlaceholderId) -> Option<&PlaceholderCapture> {
        self.placeholders.get(&id)
    }
}
