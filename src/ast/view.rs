use crate::ast::errors::AstError;
use crate::ast::hierarchy::TypeHierarchy;
use crate::ast::tree::{Import, NodeId, NodeKind, Symbol};
use crate::ast::types::{Range, Type};
use crate::syntax::UnaryOp;
use std::collections::BTreeSet;
use std::path::Path;

/// Read-only capability set the engine needs from a typed AST.
///
/// Required methods expose raw structure; the provided ones implement the
/// normalisation the matcher relies on (parenthesis stripping, structural
/// equality, negation detection).
pub trait AstView {
    fn root(&self) -> NodeId;
    fn kind(&self, node: NodeId) -> &NodeKind;
    fn children(&self, node: NodeId) -> &[NodeId];
    fn parent(&self, node: NodeId) -> Option<NodeId>;
    fn type_of(&self, node: NodeId) -> Option<&Type>;
    fn symbol_of(&self, node: NodeId) -> Option<&Symbol>;
    fn range_of(&self, node: NodeId) -> Option<Range>;
    /// Original source text, only for subtrees no rewrite has touched.
    fn source_text(&self, node: NodeId) -> Option<&str>;
    fn path(&self) -> &Path;
    fn hierarchy(&self) -> &TypeHierarchy;
    fn has_import(&self, import: &Import) -> bool;
    /// Simple names of classes visible in the unit.
    fn visible_classes(&self) -> BTreeSet<String>;

    fn strip_parens(&self, mut node: NodeId) -> NodeId {
        while let NodeKind::Parens = self.kind(node) {
            match self.children(node).first() {
                Some(&inner) => node = inner,
                None => break,
            }
        }
        node
    }

    /// The outermost parenthesis chain wrapping `node`, or `node` itself.
    fn paren_slot(&self, mut node: NodeId) -> NodeId {
        while let Some(parent) = self.parent(node) {
            if let NodeKind::Parens = self.kind(parent) {
                node = parent;
            } else {
                break;
            }
        }
        node
    }

    fn require_type(&self, node: NodeId) -> Result<&Type, AstError> {
        self.type_of(node).ok_or_else(|| AstError::UnresolvedType {
            node,
            range: self.range_of(node),
        })
    }

    fn is_subtype(&self, sub: &Type, sup: &Type) -> bool {
        self.hierarchy().is_subtype(sub, sup)
    }

    fn is_effectively_final(&self, node: NodeId) -> bool {
        self.symbol_of(node)
            .map(|symbol| symbol.effectively_final)
            .unwrap_or(true)
    }

    /// Syntactic equality after stripping parentheses. Identifiers compare by
    /// resolved symbol when both sides have one, by name otherwise.
    fn struct_eq(&self, a: NodeId, b: NodeId) -> bool {
        let a = self.strip_parens(a);
        let b = self.strip_parens(b);
        if a == b {
            return true;
        }
        match (self.kind(a), self.kind(b)) {
            (NodeKind::Name(x), NodeKind::Name(y)) => {
                match (self.symbol_of(a), self.symbol_of(b)) {
                    (Some(sa), Some(sb)) => sa.id == sb.id,
                    _ => x == y,
                }
            }
            (ka, kb) if ka.same_label(kb) => {
                let (ca, cb) = (self.children(a), self.children(b));
                ca.len() == cb.len() && ca.iter().zip(cb).all(|(&x, &y)| self.struct_eq(x, y))
            }
            _ => false,
        }
    }

    /// `n` is `!m`, `m` is `!n`, or both are complementary comparisons over
    /// the same operands.
    fn is_logical_negation_of(&self, n: NodeId, m: NodeId) -> bool {
        let n = self.strip_parens(n);
        let m = self.strip_parens(m);
        let negation_operand = |node: NodeId| match self.kind(node) {
            NodeKind::Unary(UnaryOp::Not) => self.children(node).first().copied(),
            _ => None,
        };
        if negation_operand(n).is_some_and(|inner| self.struct_eq(inner, m)) {
            return true;
        }
        if negation_operand(m).is_some_and(|inner| self.struct_eq(inner, n)) {
            return true;
        }
        match (self.kind(n), self.kind(m)) {
            (NodeKind::Binary(a), NodeKind::Binary(b)) if a.negated() == Some(*b) => {
                let (cn, cm) = (self.children(n), self.children(m));
                cn.len() == 2
                    && cm.len() == 2
                    && self.struct_eq(cn[0], cm[0])
                    && self.struct_eq(cn[1], cm[1])
            }
            _ => false,
        }
    }

    /// Local variable and lambda parameter names visible at `node`.
    fn names_in_scope(&self, node: NodeId) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        let mut current = self.parent(node);
        while let Some(ancestor) = current {
            for &child in self.children(ancestor) {
                match self.kind(child) {
                    NodeKind::Param(name) => {
                        names.insert(name.clone());
                    }
                    NodeKind::LocalDecl { name, .. } => {
                        names.insert(name.clone());
                    }
                    _ => {}
                }
            }
            current = self.parent(ancestor);
        }
        names
    }

    /// Identifiers referenced anywhere below `node`.
    fn referenced_names(&self, node: NodeId) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if let NodeKind::Name(name) | NodeKind::Param(name) = self.kind(current) {
                names.insert(name.clone());
            }
            stack.extend(self.children(current).iter().copied());
        }
        names
    }
}
