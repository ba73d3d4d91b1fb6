use crate::ast::hierarchy::TypeHierarchy;
use crate::ast::types::{Range, Type};
use crate::ast::view::AstView;
use crate::syntax::{AssignOp, BinaryOp, Literal, UnaryOp, UpdateOp};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolId(pub u32);

/// Node kinds of the typed tree. Children layout per kind:
///
/// | kind | children |
/// |---|---|
/// | `Unit`, `Block` | statements |
/// | `ExprStmt`, `Return` | expression |
/// | `LocalDecl` | initializer, if any |
/// | `Assign` | target, value |
/// | `Update` | target |
/// | `If` | condition, then, optional else |
/// | `FieldAccess`, `MethodRef` | receiver |
/// | `MethodCall` | receiver (when `has_receiver`), arguments |
/// | `Lambda` | `Param`s, then the body |
/// | `Unary` | operand |
/// | `Binary` | lhs, rhs |
/// | `Conditional` | condition, then, else |
/// | `Parens` | inner expression |
/// | `ArrayInit` | elements |
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Unit,
    Import(Import),
    Block,
    ExprStmt,
    Return,
    LocalDecl { name: String, ty: Type },
    Assign(AssignOp),
    Update(UpdateOp),
    If,
    Literal(Literal),
    Name(String),
    FieldAccess(String),
    MethodCall {
        name: String,
        has_receiver: bool,
        type_args: Vec<Type>,
    },
    MethodRef(String),
    Lambda,
    Param(String),
    Unary(UnaryOp),
    Binary(BinaryOp),
    Conditional,
    Parens,
    ArrayInit,
}

/// Data-free discriminant of [`NodeKind`], used to pre-filter rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KindTag {
    Unit,
    Import,
    Block,
    ExprStmt,
    Return,
    LocalDecl,
    Assign,
    Update,
    If,
    Literal,
    Name,
    FieldAccess,
    MethodCall,
    MethodRef,
    Lambda,
    Param,
    Unary,
    Binary,
    Conditional,
    Parens,
    ArrayInit,
}

impl NodeKind {
    pub fn tag(&self) -> KindTag {
        match self {
            NodeKind::Unit => KindTag::Unit,
            NodeKind::Import(_) => KindTag::Import,
            NodeKind::Block => KindTag::Block,
            NodeKind::ExprStmt => KindTag::ExprStmt,
            NodeKind::Return => KindTag::Return,
            NodeKind::LocalDecl { .. } => KindTag::LocalDecl,
            NodeKind::Assign(_) => KindTag::Assign,
            NodeKind::Update(_) => KindTag::Update,
            NodeKind::If => KindTag::If,
            NodeKind::Literal(_) => KindTag::Literal,
            NodeKind::Name(_) => KindTag::Name,
            NodeKind::FieldAccess(_) => KindTag::FieldAccess,
            NodeKind::MethodCall { .. } => KindTag::MethodCall,
            NodeKind::MethodRef(_) => KindTag::MethodRef,
            NodeKind::Lambda => KindTag::Lambda,
            NodeKind::Param(_) => KindTag::Param,
            NodeKind::Unary(_) => KindTag::Unary,
            NodeKind::Binary(_) => KindTag::Binary,
            NodeKind::Conditional => KindTag::Conditional,
            NodeKind::Parens => KindTag::Parens,
            NodeKind::ArrayInit => KindTag::ArrayInit,
        }
    }

    /// Label equality used by structural comparison: literals compare by
    /// value, lambda parameter names and explicit type arguments are ignored.
    /// `Name` labels are compared by the caller, which knows about symbols.
    pub fn same_label(&self, other: &NodeKind) -> bool {
        match (self, other) {
            (NodeKind::Literal(a), NodeKind::Literal(b)) => a.same_value(b),
            (NodeKind::Param(_), NodeKind::Param(_)) => true,
            (
                NodeKind::MethodCall {
                    name: a,
                    has_receiver: ra,
                    ..
                },
                NodeKind::MethodCall {
                    name: b,
                    has_receiver: rb,
                    ..
                },
            ) => a == b && ra == rb,
            (a, b) => a == b,
        }
    }

    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            NodeKind::Import(_)
                | NodeKind::Block
                | NodeKind::ExprStmt
                | NodeKind::Return
                | NodeKind::LocalDecl { .. }
                | NodeKind::Assign(_)
                | NodeKind::Update(_)
                | NodeKind::If
        )
    }

    pub fn is_expression(&self) -> bool {
        !self.is_statement() && !matches!(self, NodeKind::Unit | NodeKind::Param(_))
    }
}

/// An import declaration, either present in a unit or requested by a rewrite.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Import {
    pub path: String,
    pub is_static: bool,
}

impl Import {
    pub fn class(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_static: false,
        }
    }

    pub fn member(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_static: true,
        }
    }

    /// Whether this import makes `other` visible, counting on-demand imports.
    pub fn covers(&self, other: &Import) -> bool {
        if self == other {
            return true;
        }
        match self.path.strip_suffix(".*") {
            Some(prefix) if self.is_static == other.is_static => other
                .path
                .rsplit_once('.')
                .is_some_and(|(owner, _)| owner == prefix),
            _ => false,
        }
    }
}

impl fmt::Display for Import {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_static {
            write!(f, "import static {};", self.path)
        } else {
            write!(f, "import {};", self.path)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Local,
    Param,
    Class,
    Field,
    Method,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    pub kind: SymbolKind,
    /// Fully qualified name for classes and static members.
    pub qualified: Option<String>,
    pub ty: Option<Type>,
    pub effectively_final: bool,
}

impl Symbol {
    pub fn is_variable(&self) -> bool {
        matches!(self.kind, SymbolKind::Local | SymbolKind::Param)
    }
}

/// Metadata left on the root of a grafted replacement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RewriteMark {
    pub rule: String,
    pub comments: Vec<String>,
    pub imports: Vec<Import>,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
    pub ty: Option<Type>,
    pub symbol: Option<SymbolId>,
    /// Source range; `None` for nodes synthesized by a rewrite.
    pub range: Option<Range>,
    /// No rewrite happened in this subtree; its source text is authoritative.
    pub pristine: bool,
    /// For replacement roots: the original source range they stand in for.
    pub anchor: Option<Range>,
    pub mark: Option<RewriteMark>,
}

/// Host-side typing of nodes synthesized by a rewrite.
///
/// Installed by the host that built the tree. After a graft the tree hands the
/// new subtree back so later passes see it typed like parsed code.
pub trait Retype: fmt::Debug + Send + Sync {
    /// Fills in missing types (and symbols) below `node`.
    fn retype(&self, tree: &mut SyntaxTree, node: NodeId);
}

/// Arena-backed typed tree for one compilation unit.
///
/// Host adapters build it once; the driver grafts replacements into it between
/// passes. Nodes are never removed, detached subtrees simply become
/// unreachable from the root.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    path: PathBuf,
    source: String,
    nodes: Vec<Node>,
    symbols: Vec<Symbol>,
    root: NodeId,
    hierarchy: Arc<TypeHierarchy>,
    added_imports: Vec<Import>,
    retyper: Option<Arc<dyn Retype>>,
}

impl SyntaxTree {
    /// Creates a tree holding a single empty `Unit` root.
    pub fn new(
        path: impl Into<PathBuf>,
        source: impl Into<String>,
        hierarchy: Arc<TypeHierarchy>,
    ) -> Self {
        let source = source.into();
        let mut tree = Self {
            path: path.into(),
            nodes: Vec::new(),
            symbols: Vec::new(),
            root: NodeId(0),
            hierarchy,
            added_imports: Vec::new(),
            retyper: None,
            source,
        };
        let range = Range::new(0, tree.source.len());
        tree.root = tree.alloc(NodeKind::Unit, Some(range));
        tree
    }

    pub fn alloc(&mut self, kind: NodeKind, range: Option<Range>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            children: Vec::new(),
            parent: None,
            ty: None,
            symbol: None,
            pristine: range.is_some(),
            range,
            anchor: None,
            mark: None,
        });
        id
    }

    pub fn push_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0 as usize].parent = Some(parent);
        self.nodes[parent.0 as usize].children.push(child);
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    pub fn set_type(&mut self, id: NodeId, ty: Option<Type>) {
        self.node_mut(id).ty = ty;
    }

    pub fn set_symbol(&mut self, id: NodeId, symbol: SymbolId) {
        self.node_mut(id).symbol = Some(symbol);
    }

    pub fn add_symbol(
        &mut self,
        name: impl Into<String>,
        kind: SymbolKind,
        qualified: Option<String>,
        ty: Option<Type>,
    ) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(Symbol {
            id,
            name: name.into(),
            kind,
            qualified,
            ty,
            effectively_final: true,
        });
        id
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    pub fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.0 as usize]
    }

    /// Returns the class symbol for `qualified`, creating it on first use.
    pub fn class_symbol(&mut self, simple: &str, qualified: &str) -> SymbolId {
        let existing = self.symbols.iter().find(|symbol| {
            symbol.kind == SymbolKind::Class && symbol.qualified.as_deref() == Some(qualified)
        });
        match existing {
            Some(symbol) => symbol.id,
            None => self.add_symbol(simple, SymbolKind::Class, Some(qualified.to_string()), None),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn hierarchy_arc(&self) -> Arc<TypeHierarchy> {
        Arc::clone(&self.hierarchy)
    }

    /// Imports declared by the unit itself.
    pub fn declared_imports(&self) -> Vec<Import> {
        self.children(self.root)
            .iter()
            .filter_map(|&child| match &self.node(child).kind {
                NodeKind::Import(import) => Some(import.clone()),
                _ => None,
            })
            .collect()
    }

    /// Imports requested by grafted rewrites so far.
    pub fn added_imports(&self) -> &[Import] {
        &self.added_imports
    }

    pub fn set_retyper(&mut self, retyper: Arc<dyn Retype>) {
        self.retyper = Some(retyper);
    }

    /// Types the synthesized subtree at `node` through the host, when one
    /// was installed.
    pub fn retype(&mut self, node: NodeId) {
        if let Some(retyper) = self.retyper.clone() {
            retyper.retype(self, node);
        }
    }

    /// Records an import requested by a grafted rewrite.
    pub fn note_import(&mut self, import: Import) {
        if !self.added_imports.contains(&import) {
            self.added_imports.push(import);
        }
    }

    /// Deep copy of `node`, keeping ranges, symbols, types and marks.
    pub fn copy_subtree(&mut self, node: NodeId) -> NodeId {
        let original = self.node(node).clone();
        let copy = self.alloc(original.kind.clone(), original.range);
        {
            let target = self.node_mut(copy);
            target.ty = original.ty;
            target.symbol = original.symbol;
            target.pristine = original.pristine;
            target.anchor = original.anchor;
            target.mark = original.mark;
        }
        for child in original.children {
            let child_copy = self.copy_subtree(child);
            self.push_child(copy, child_copy);
        }
        copy
    }

    /// Puts `replacement` where `slot` was. The replacement inherits the slot's
    /// anchor (or its source range) and every ancestor loses pristine status.
    pub fn replace(&mut self, slot: NodeId, replacement: NodeId) {
        let anchor = self.node(slot).anchor.or(self.node(slot).range);
        let parent = self.node(slot).parent;
        {
            let node = self.node_mut(replacement);
            node.parent = parent;
            node.anchor = anchor;
            node.pristine = false;
        }
        self.node_mut(slot).parent = None;
        if let Some(parent) = parent {
            if let Some(position) = self.node(parent).children.iter().position(|&c| c == slot) {
                self.node_mut(parent).children[position] = replacement;
            }
        } else if self.root == slot {
            self.root = replacement;
        }
        let mut current = parent;
        while let Some(id) = current {
            self.node_mut(id).pristine = false;
            current = self.node(id).parent;
        }
    }

    /// Nodes reachable from `start`, children before parents.
    pub fn post_order(&self, start: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![(start, false)];
        while let Some((node, expanded)) = stack.pop() {
            if expanded {
                out.push(node);
                continue;
            }
            stack.push((node, true));
            for &child in self.children(node).iter().rev() {
                stack.push((child, false));
            }
        }
        out
    }

    /// Nodes reachable from `start`, parents before children.
    pub fn pre_order(&self, start: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            out.push(node);
            for &child in self.children(node).iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// Source range of `node`, or of the nearest anchored ancestor for
    /// synthesized nodes.
    pub fn effective_range(&self, node: NodeId) -> Option<Range> {
        let mut current = Some(node);
        while let Some(id) = current {
            let n = self.node(id);
            if let Some(anchor) = n.anchor {
                return Some(anchor);
            }
            if let Some(range) = n.range {
                return Some(range);
            }
            current = n.parent;
        }
        None
    }
}

impl AstView for SyntaxTree {
    fn root(&self) -> NodeId {
        self.root
    }

    fn kind(&self, node: NodeId) -> &NodeKind {
        &self.node(node).kind
    }

    fn children(&self, node: NodeId) -> &[NodeId] {
        &self.node(node).children
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).parent
    }

    fn type_of(&self, node: NodeId) -> Option<&Type> {
        self.node(node).ty.as_ref()
    }

    fn symbol_of(&self, node: NodeId) -> Option<&Symbol> {
        self.node(node).symbol.map(|id| self.symbol(id))
    }

    fn range_of(&self, node: NodeId) -> Option<Range> {
        self.node(node).range
    }

    fn source_text(&self, node: NodeId) -> Option<&str> {
        let n = self.node(node);
        if !n.pristine {
            return None;
        }
        n.range.and_then(|range| self.source.get(range.start..range.end))
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn hierarchy(&self) -> &TypeHierarchy {
        &self.hierarchy
    }

    fn has_import(&self, import: &Import) -> bool {
        self.added_imports.iter().any(|added| added.covers(import))
            || self
                .declared_imports()
                .iter()
                .any(|declared| declared.covers(import))
    }

    fn visible_classes(&self) -> BTreeSet<String> {
        self.symbols
            .iter()
            .filter(|symbol| symbol.kind == SymbolKind::Class)
            .map(|symbol| symbol.name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> SyntaxTree {
        SyntaxTree::new("Test.sketch", "a + b", Arc::new(TypeHierarchy::new()))
    }

    #[test]
    fn replace_marks_ancestors_dirty() {
        let mut tree = tree();
        let root = tree.root();
        let stmt = tree.alloc(NodeKind::ExprStmt, Some(Range::new(0, 5)));
        tree.push_child(root, stmt);
        let sum = tree.alloc(NodeKind::Binary(BinaryOp::Add), Some(Range::new(0, 5)));
        tree.push_child(stmt, sum);

        let replacement = tree.alloc(NodeKind::Name("c".into()), None);
        tree.replace(sum, replacement);

        assert_eq!(tree.children(stmt), &[replacement]);
        assert_eq!(tree.node(replacement).anchor, Some(Range::new(0, 5)));
        assert!(!tree.node(stmt).pristine);
        assert!(!tree.node(root).pristine);
        assert_eq!(tree.parent(sum), None);
    }

    #[test]
    fn copies_are_deep() {
        let mut tree = tree();
        let sum = tree.alloc(NodeKind::Binary(BinaryOp::Add), Some(Range::new(0, 5)));
        let a = tree.alloc(NodeKind::Name("a".into()), Some(Range::new(0, 1)));
        let b = tree.alloc(NodeKind::Name("b".into()), Some(Range::new(4, 5)));
        tree.push_child(sum, a);
        tree.push_child(sum, b);

        let copy = tree.copy_subtree(sum);
        assert_ne!(copy, sum);
        assert_eq!(tree.children(copy).len(), 2);
        assert_eq!(tree.source_text(copy), Some("a + b"));
    }

    #[test]
    fn on_demand_imports_cover_members() {
        let star = Import::class("java.util.*");
        assert!(star.covers(&Import::class("java.util.Optional")));
        assert!(!star.covers(&Import::class("java.time.Instant")));
        assert!(!star.covers(&Import::member("java.util.Optional.of")));
    }

    #[test]
    fn post_order_visits_children_first() {
        let mut tree = tree();
        let sum = tree.alloc(NodeKind::Binary(BinaryOp::Add), Some(Range::new(0, 5)));
        let a = tree.alloc(NodeKind::Name("a".into()), Some(Range::new(0, 1)));
        let b = tree.alloc(NodeKind::Name("b".into()), Some(Range::new(4, 5)));
        tree.push_child(sum, a);
        tree.push_child(sum, b);
        assert_eq!(tree.post_order(sum), vec![a, b, sum]);
        assert_eq!(tree.pre_order(sum), vec![sum, a, b]);
    }
}
