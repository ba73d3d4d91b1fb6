//! The reference host: parses `.sketch` compilation units and resolves them
//! into a typed [`SyntaxTree`].
//!
//! Resolution is a single forward pass. Locals are visible from their
//! declaration on, lambda parameters inside their body. Method calls are
//! typed against the [`Library`]: the first signature whose arity, argument
//! shapes and argument types fit is chosen, its generic parameters inferred
//! from the target type, the arguments and (for lambdas and method
//! references) the functional interface's return type. Parameters nothing
//! constrains default to `Object`.

use crate::ast::{
    AstView, Import, NodeId, NodeKind, Primitive, Range, Retype, SymbolId, SymbolKind,
    SyntaxTree, Type, TypeHierarchy,
};
use crate::host::errors::HostError;
use crate::host::library::{Library, Signature};
use crate::matcher::TypeEnv;
use crate::syntax::{
    parse_unit, AssignOp, BinaryOp, Expr, ExprKind, Literal, Stmt, StmtKind, UnaryOp,
};
use crate::template::TypeParam;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SketchHost {
    library: Arc<Library>,
    hierarchy: Arc<TypeHierarchy>,
}

impl SketchHost {
    pub fn new(library: Library) -> Self {
        let hierarchy = Arc::new(library.hierarchy().clone());
        Self {
            library: Arc::new(library),
            hierarchy,
        }
    }

    /// A host over the embedded signature library.
    pub fn builtin() -> Result<Self, HostError> {
        Ok(Self::new(Library::builtin()?))
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn load(&self, path: impl Into<PathBuf>, source: &str) -> Result<SyntaxTree, HostError> {
        let path = path.into();
        let unit = parse_unit(source).map_err(|source| HostError::Syntax {
            path: path.clone(),
            source,
        })?;
        let mut tree = SyntaxTree::new(path, source, Arc::clone(&self.hierarchy));
        tree.set_retyper(Arc::new(SketchRetyper {
            library: Arc::clone(&self.library),
        }));
        let root = tree.root();
        let mut resolver = Resolver::new(&self.library, &mut tree);
        for stmt in &unit.stmts {
            let node = resolver.stmt(stmt);
            resolver.tree.push_child(root, node);
        }
        tracing::debug!(
            path = %tree.path().display(),
            statements = unit.stmts.len(),
            "resolved unit"
        );
        Ok(tree)
    }
}

/// Types grafted subtrees by resolving them again in the scope of their site.
///
/// The subtree is lifted back to an expression and resolved into scratch
/// nodes, which are then read off onto the grafted nodes. Types the rewrite
/// already carried are kept.
#[derive(Debug)]
struct SketchRetyper {
    library: Arc<Library>,
}

impl Retype for SketchRetyper {
    fn retype(&self, tree: &mut SyntaxTree, node: NodeId) {
        let Some(expr) = lift(tree, node) else {
            tracing::trace!(?node, "grafted subtree is not an expression");
            return;
        };
        let expected = tree.type_of(node).cloned().or_else(|| declared_type(tree, node));
        let scope = visible_symbols(tree, node);
        let imports: Vec<Import> = tree
            .declared_imports()
            .into_iter()
            .chain(tree.added_imports().iter().cloned())
            .collect();
        let scratch = {
            let mut resolver = Resolver::new(&self.library, tree);
            for import in &imports {
                resolver.import(&import.path, import.is_static);
            }
            resolver.scopes = vec![scope];
            resolver.expr(&expr, expected.as_ref())
        };
        copy_types(tree, node, scratch);
        // Parentheses kept around the slot take the new type.
        let mut current = tree.parent(node);
        while let Some(parent) = current {
            if !matches!(tree.kind(parent), NodeKind::Parens) || tree.type_of(parent).is_some() {
                break;
            }
            let ty = tree.type_of(node).cloned();
            tree.set_type(parent, ty);
            current = tree.parent(parent);
        }
    }
}

/// Rebuilds the expression a subtree stands for.
fn lift(tree: &SyntaxTree, node: NodeId) -> Option<Expr> {
    let range = tree.effective_range(node).unwrap_or_default();
    let children = tree.children(node);
    let nth = |idx: usize| -> Option<Box<Expr>> { lift(tree, *children.get(idx)?).map(Box::new) };
    let all = |nodes: &[NodeId]| -> Option<Vec<Expr>> {
        nodes.iter().map(|&child| lift(tree, child)).collect()
    };
    let kind = match tree.kind(node) {
        NodeKind::Literal(literal) => ExprKind::Literal(literal.clone()),
        NodeKind::Name(name) => ExprKind::Name(name.clone()),
        NodeKind::FieldAccess(name) => ExprKind::Field {
            receiver: nth(0)?,
            name: name.clone(),
        },
        NodeKind::MethodCall {
            name,
            has_receiver,
            type_args,
        } => {
            let (receiver, args) = match children.split_first() {
                Some((&receiver, args)) if *has_receiver => {
                    (Some(Box::new(lift(tree, receiver)?)), args)
                }
                _ => (None, children),
            };
            ExprKind::Call {
                receiver,
                type_args: type_args.clone(),
                name: name.clone(),
                args: all(args)?,
            }
        }
        NodeKind::MethodRef(name) => ExprKind::MethodRef {
            target: nth(0)?,
            name: name.clone(),
        },
        NodeKind::Lambda => {
            let (&body, params) = children.split_last()?;
            let params = params
                .iter()
                .map(|&param| match tree.kind(param) {
                    NodeKind::Param(name) => Some((name.clone(), range)),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()?;
            ExprKind::Lambda {
                params,
                body: Box::new(lift(tree, body)?),
            }
        }
        NodeKind::Unary(op) => ExprKind::Unary {
            op: *op,
            operand: nth(0)?,
        },
        NodeKind::Binary(op) => ExprKind::Binary {
            op: *op,
            lhs: nth(0)?,
            rhs: nth(1)?,
        },
        NodeKind::Conditional => ExprKind::Conditional {
            cond: nth(0)?,
            then: nth(1)?,
            otherwise: nth(2)?,
        },
        NodeKind::Parens => ExprKind::Parens(nth(0)?),
        NodeKind::ArrayInit => ExprKind::ArrayInit(all(children)?),
        _ => return None,
    };
    Some(Expr { kind, range })
}

/// The declared type a local's initializer is checked against.
fn declared_type(tree: &SyntaxTree, node: NodeId) -> Option<Type> {
    let mut current = tree.parent(node)?;
    while matches!(tree.kind(current), NodeKind::Parens) {
        current = tree.parent(current)?;
    }
    match tree.kind(current) {
        NodeKind::LocalDecl { ty, .. } => Some(ty.clone()),
        _ => None,
    }
}

/// Locals and lambda parameters visible at `node`, inner declarations
/// shadowing outer ones.
fn visible_symbols(tree: &SyntaxTree, node: NodeId) -> BTreeMap<String, SymbolId> {
    let mut levels = Vec::new();
    let mut child = node;
    while let Some(parent) = tree.parent(child) {
        levels.push((parent, child));
        child = parent;
    }
    let mut scope = BTreeMap::new();
    for (parent, child) in levels.into_iter().rev() {
        for &sibling in tree.children(parent) {
            if sibling == child {
                break;
            }
            let declares = matches!(
                tree.kind(sibling),
                NodeKind::LocalDecl { .. } | NodeKind::Param(_)
            );
            if let (true, Some(symbol)) = (declares, tree.node(sibling).symbol) {
                scope.insert(tree.symbol(symbol).name.clone(), symbol);
            }
        }
    }
    scope
}

/// Reads the scratch resolution off onto the grafted nodes, which have the
/// same shape.
fn copy_types(tree: &mut SyntaxTree, grafted: NodeId, scratch: NodeId) {
    let resolved = tree.node(scratch).ty.clone();
    if tree.node(grafted).ty.is_none() && resolved.is_some() {
        tree.set_type(grafted, resolved.clone());
    }
    match (tree.node(grafted).symbol, tree.node(scratch).symbol) {
        (None, Some(symbol)) => tree.set_symbol(grafted, symbol),
        (Some(symbol), _) if matches!(tree.kind(grafted), NodeKind::Param(_)) => {
            let symbol = tree.symbol_mut(symbol);
            if symbol.ty.is_none() {
                symbol.ty = resolved;
            }
        }
        _ => {}
    }
    let pairs: Vec<(NodeId, NodeId)> = tree
        .children(grafted)
        .iter()
        .copied()
        .zip(tree.children(scratch).iter().copied())
        .collect();
    for (grafted, scratch) in pairs {
        copy_types(tree, grafted, scratch);
    }
}

/// What a qualifier denotes: a class (static access) or a value.
#[derive(Debug, Clone)]
enum Site {
    Static(String),
    Instance(Type),
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Plain,
    Lambda(usize),
    MethodRef,
}

fn shape(expr: &Expr) -> Shape {
    match &expr.kind {
        ExprKind::Parens(inner) => shape(inner),
        ExprKind::Lambda { params, .. } => Shape::Lambda(params.len()),
        ExprKind::MethodRef { .. } => Shape::MethodRef,
        _ => Shape::Plain,
    }
}

/// A signature as seen through a particular receiver type.
#[derive(Debug, Clone)]
struct Candidate {
    signature: Signature,
    type_params: Vec<TypeParam>,
}

impl Candidate {
    fn env(&self) -> TypeEnv {
        TypeEnv::new(&self.type_params)
    }

    /// Formal type of argument `idx` of `count`. A lone array in variadic
    /// position is passed as the array itself.
    fn param(&self, idx: usize, count: usize, actual: Option<&Type>) -> Option<Type> {
        let params = &self.signature.params;
        if self.signature.varargs
            && count == params.len()
            && idx + 1 == count
            && actual.is_some_and(Type::is_array)
        {
            return params.last().cloned();
        }
        self.signature.param_for(idx)
    }

    fn fits_shapes(&self, h: &TypeHierarchy, shapes: &[Shape]) -> bool {
        shapes.iter().enumerate().all(|(idx, shape)| {
            let functional = self
                .signature
                .param_for(idx)
                .and_then(|param| h.functional_signature(&param));
            match shape {
                Shape::Plain => true,
                Shape::Lambda(arity) => functional.is_some_and(|f| f.params.len() == *arity),
                Shape::MethodRef => functional.is_some(),
            }
        })
    }

    fn result(&self, env: &TypeEnv) -> Type {
        default_unbound(&env.resolve(&self.signature.returns))
    }
}

struct Resolver<'a> {
    library: &'a Library,
    tree: &'a mut SyntaxTree,
    scopes: Vec<BTreeMap<String, SymbolId>>,
    /// Simple name to qualified name of every class visible in the unit.
    classes: BTreeMap<String, String>,
    /// Statically imported member name to owning class.
    static_members: BTreeMap<String, String>,
    /// Locals declared without an initializer and not assigned yet.
    unassigned: BTreeSet<SymbolId>,
}

impl<'a> Resolver<'a> {
    fn new(library: &'a Library, tree: &'a mut SyntaxTree) -> Self {
        let classes = library
            .hierarchy()
            .classes()
            .filter(|decl| {
                decl.qualified
                    .strip_prefix("java.lang.")
                    .is_some_and(|rest| !rest.contains('.'))
            })
            .map(|decl| (decl.name.clone(), decl.qualified.clone()))
            .collect();
        Self {
            library,
            tree,
            scopes: vec![BTreeMap::new()],
            classes,
            static_members: BTreeMap::new(),
            unassigned: BTreeSet::new(),
        }
    }

    fn hierarchy(&self) -> &'a TypeHierarchy {
        self.library.hierarchy()
    }

    fn type_of(&self, node: NodeId) -> Option<Type> {
        self.tree.node(node).ty.clone()
    }

    fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    fn declare(&mut self, name: &str, symbol: SymbolId) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), symbol);
        }
    }

    fn node(&mut self, kind: NodeKind, range: Range, children: &[NodeId]) -> NodeId {
        let node = self.tree.alloc(kind, Some(range));
        for &child in children {
            self.tree.push_child(node, child);
        }
        node
    }

    // ---- statements -------------------------------------------------------

    fn stmt(&mut self, stmt: &Stmt) -> NodeId {
        let range = stmt.range;
        match &stmt.kind {
            StmtKind::Import { path, is_static } => {
                self.import(path, *is_static);
                let import = Import {
                    path: path.clone(),
                    is_static: *is_static,
                };
                self.node(NodeKind::Import(import), range, &[])
            }
            StmtKind::Local { ty, name, init } => {
                let ty = ty.simplify_names();
                let kind = NodeKind::LocalDecl {
                    name: name.clone(),
                    ty: ty.clone(),
                };
                let children: Vec<NodeId> = init
                    .iter()
                    .map(|init| self.expr(init, Some(&ty)))
                    .collect();
                let node = self.node(kind, range, &children);
                let symbol = self
                    .tree
                    .add_symbol(name.clone(), SymbolKind::Local, None, Some(ty));
                if init.is_none() {
                    self.unassigned.insert(symbol);
                }
                self.tree.set_symbol(node, symbol);
                self.declare(name, symbol);
                node
            }
            StmtKind::Assign { target, op, value } => {
                let target = self.expr(target, None);
                self.reassigned(target, *op == AssignOp::Assign);
                let expected = self.type_of(target);
                let value = self.expr(value, expected.as_ref());
                self.node(NodeKind::Assign(*op), range, &[target, value])
            }
            StmtKind::Update { target, op } => {
                let target = self.expr(target, None);
                self.reassigned(target, false);
                self.node(NodeKind::Update(*op), range, &[target])
            }
            StmtKind::Return(expr) => {
                let value = self.expr(expr, None);
                self.node(NodeKind::Return, range, &[value])
            }
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                let mut children = vec![self.expr(cond, Some(&Type::boolean()))];
                children.push(self.scoped(then));
                if let Some(otherwise) = otherwise {
                    children.push(self.scoped(otherwise));
                }
                self.node(NodeKind::If, range, &children)
            }
            StmtKind::Block(stmts) => {
                self.scopes.push(BTreeMap::new());
                let children: Vec<NodeId> = stmts.iter().map(|stmt| self.stmt(stmt)).collect();
                self.scopes.pop();
                self.node(NodeKind::Block, range, &children)
            }
            StmtKind::Expr(expr) => {
                let value = self.expr(expr, None);
                self.node(NodeKind::ExprStmt, range, &[value])
            }
        }
    }

    fn scoped(&mut self, stmt: &Stmt) -> NodeId {
        self.scopes.push(BTreeMap::new());
        let node = self.stmt(stmt);
        self.scopes.pop();
        node
    }

    /// A variable written after its declaration is no longer effectively
    /// final, except for the first plain assignment of an uninitialized local.
    fn reassigned(&mut self, target: NodeId, plain: bool) {
        let target = self.tree.strip_parens(target);
        let Some(symbol) = self.tree.node(target).symbol else {
            return;
        };
        if !self.tree.symbol(symbol).is_variable() {
            return;
        }
        if plain && self.unassigned.remove(&symbol) {
            return;
        }
        self.tree.symbol_mut(symbol).effectively_final = false;
    }

    fn import(&mut self, path: &str, is_static: bool) {
        let library = self.library;
        let hierarchy = self.hierarchy();
        if is_static {
            let Some((owner, member)) = path.rsplit_once('.') else {
                return;
            };
            let Some(decl) = hierarchy.by_qualified(owner) else {
                tracing::trace!(%path, "static import from an unknown class");
                return;
            };
            if member == "*" {
                for signature in library.statics(&decl.name) {
                    self.static_members
                        .insert(signature.name.clone(), decl.name.clone());
                }
            } else {
                self.static_members
                    .insert(member.to_string(), decl.name.clone());
            }
        } else if let Some(package) = path.strip_suffix(".*") {
            for decl in library.classes_in(package) {
                self.classes
                    .insert(decl.name.clone(), decl.qualified.clone());
            }
        } else {
            let simple = match hierarchy.by_qualified(path) {
                Some(decl) => decl.name.clone(),
                None => path.rsplit('.').next().unwrap_or(path).to_string(),
            };
            self.classes.insert(simple, path.to_string());
        }
    }

    // ---- expressions ------------------------------------------------------

    fn expr(&mut self, expr: &Expr, expected: Option<&Type>) -> NodeId {
        let range = expr.range;
        match &expr.kind {
            ExprKind::Literal(literal) => {
                let node = self.node(NodeKind::Literal(literal.clone()), range, &[]);
                self.tree.set_type(node, Some(literal_type(literal)));
                node
            }
            ExprKind::Name(name) => self.name(name, range),
            ExprKind::Field { receiver, name } => self.field(range, receiver, name),
            ExprKind::Call {
                receiver,
                type_args,
                name,
                args,
            } => self.call(range, receiver.as_deref(), type_args, name, args, expected),
            ExprKind::Lambda { .. } | ExprKind::MethodRef { .. } => {
                let mut env = TypeEnv::default();
                self.functional(expr, expected, &mut env)
            }
            ExprKind::Unary { op, operand } => {
                let operand_expected = (*op == UnaryOp::Not).then(Type::boolean);
                let child = self.expr(operand, operand_expected.as_ref());
                let ty = match op {
                    UnaryOp::Not => Some(Type::boolean()),
                    _ => self
                        .type_of(child)
                        .and_then(|ty| ty.unboxed())
                        .filter(|p| p.is_numeric())
                        .map(|p| Type::Primitive(p.promote(Primitive::Int))),
                };
                let node = self.node(NodeKind::Unary(*op), range, &[child]);
                self.tree.set_type(node, ty);
                node
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let operand_expected = op.is_logical().then(Type::boolean);
                let lhs = self.expr(lhs, operand_expected.as_ref());
                let rhs = self.expr(rhs, operand_expected.as_ref());
                let ty = binary_type(*op, self.type_of(lhs), self.type_of(rhs));
                let node = self.node(NodeKind::Binary(*op), range, &[lhs, rhs]);
                self.tree.set_type(node, ty);
                node
            }
            ExprKind::Conditional {
                cond,
                then,
                otherwise,
            } => {
                let cond = self.expr(cond, Some(&Type::boolean()));
                let then = self.expr(then, expected);
                let otherwise = self.expr(otherwise, expected);
                let ty = self.conditional_type(self.type_of(then), self.type_of(otherwise), expected);
                let node = self.node(NodeKind::Conditional, range, &[cond, then, otherwise]);
                self.tree.set_type(node, ty);
                node
            }
            ExprKind::Parens(inner) => {
                let child = self.expr(inner, expected);
                let ty = self.type_of(child);
                let node = self.node(NodeKind::Parens, range, &[child]);
                self.tree.set_type(node, ty);
                node
            }
            ExprKind::ArrayInit(elements) => {
                let element = match expected {
                    Some(Type::Array(element)) => Some((**element).clone()),
                    _ => None,
                };
                let children: Vec<NodeId> = elements
                    .iter()
                    .map(|element_expr| self.expr(element_expr, element.as_ref()))
                    .collect();
                let node = self.node(NodeKind::ArrayInit, range, &children);
                self.tree
                    .set_type(node, expected.filter(|ty| ty.is_array()).cloned());
                node
            }
        }
    }

    fn name(&mut self, name: &str, range: Range) -> NodeId {
        let node = self.node(NodeKind::Name(name.to_string()), range, &[]);
        if let Some(symbol) = self.lookup(name) {
            let ty = self.tree.symbol(symbol).ty.clone();
            self.tree.set_symbol(node, symbol);
            self.tree.set_type(node, ty);
        } else if let Some(qualified) = self.classes.get(name).cloned() {
            let symbol = self.tree.class_symbol(name, &qualified);
            self.tree.set_symbol(node, symbol);
        } else if let Some(owner) = self.static_members.get(name).cloned() {
            let ty = self
                .library
                .declared(&owner, name)
                .find(|signature| signature.field)
                .map(|signature| signature.returns.clone());
            let qualified = self
                .hierarchy()
                .qualified_name(&owner)
                .map(|owner| format!("{owner}.{name}"));
            let symbol = self
                .tree
                .add_symbol(name, SymbolKind::Field, qualified, ty.clone());
            self.tree.set_symbol(node, symbol);
            self.tree.set_type(node, ty);
        } else {
            tracing::trace!(name, "unresolved identifier");
        }
        node
    }

    /// Lowers a qualifier, telling class names apart from values.
    fn receiver(&mut self, expr: &Expr) -> (NodeId, Site) {
        if let ExprKind::Name(name) = &expr.kind {
            if self.lookup(name).is_none() {
                if let Some(qualified) = self.classes.get(name).cloned() {
                    let node = self.name(name, expr.range);
                    let owner = self
                        .hierarchy()
                        .by_qualified(&qualified)
                        .map(|decl| decl.name.clone())
                        .unwrap_or_else(|| name.clone());
                    return (node, Site::Static(owner));
                }
            }
        }
        let node = self.expr(expr, None);
        let site = match self.type_of(node) {
            Some(ty) => Site::Instance(ty),
            None => Site::Unknown,
        };
        (node, site)
    }

    fn field(&mut self, range: Range, receiver: &Expr, name: &str) -> NodeId {
        let hierarchy = self.hierarchy();
        let (receiver, site) = self.receiver(receiver);
        let ty = match &site {
            Site::Static(owner) if name == "class" => {
                Some(Type::generic("Class", vec![Type::class(owner.clone())]))
            }
            Site::Static(owner) => self
                .library
                .declared(owner, name)
                .find(|signature| signature.field && signature.is_static)
                .map(|signature| signature.returns.clone()),
            Site::Instance(Type::Array(_)) if name == "length" => {
                Some(Type::Primitive(Primitive::Int))
            }
            Site::Instance(ty) => self
                .library
                .members_of(ty, name)
                .into_iter()
                .find(|(signature, _)| signature.field)
                .map(|(signature, owner)| substitute_owner(hierarchy, signature, &owner).returns),
            Site::Unknown => None,
        };
        let node = self.node(NodeKind::FieldAccess(name.to_string()), range, &[receiver]);
        self.tree.set_type(node, ty);
        node
    }

    fn candidates(&self, site: &Site, name: &str) -> Vec<Candidate> {
        let hierarchy = self.hierarchy();
        match site {
            Site::Static(owner) => {
                let owner_params = hierarchy
                    .get(owner)
                    .map(|decl| decl.params.clone())
                    .unwrap_or_default();
                self.library
                    .declared(owner, name)
                    .filter(|signature| signature.is_static && !signature.field)
                    .map(|signature| Candidate {
                        type_params: type_params(
                            signature.type_params.iter().chain(owner_params.iter()),
                        ),
                        signature: signature.clone(),
                    })
                    .collect()
            }
            Site::Instance(receiver) => self
                .library
                .members_of(receiver, name)
                .into_iter()
                .filter(|(signature, _)| !signature.field)
                .map(|(signature, owner)| Candidate {
                    type_params: type_params(signature.type_params.iter()),
                    signature: substitute_owner(hierarchy, signature, &owner),
                })
                .collect(),
            Site::Unknown => Vec::new(),
        }
    }

    fn applicable(&self, candidate: &Candidate, lowered: &[Option<NodeId>]) -> bool {
        let hierarchy = self.hierarchy();
        let mut env = candidate.env();
        lowered.iter().enumerate().all(|(idx, child)| {
            let Some(actual) = child.and_then(|child| self.type_of(child)) else {
                return true;
            };
            match candidate.param(idx, lowered.len(), Some(&actual)) {
                Some(formal) => bind_argument(hierarchy, &mut env, &actual, &formal),
                None => false,
            }
        })
    }

    fn call(
        &mut self,
        range: Range,
        receiver: Option<&Expr>,
        type_args: &[Type],
        name: &str,
        args: &[Expr],
        expected: Option<&Type>,
    ) -> NodeId {
        let hierarchy = self.hierarchy();
        let type_args: Vec<Type> = type_args.iter().map(Type::simplify_names).collect();
        let mut children = Vec::with_capacity(args.len() + 1);
        let site = match receiver {
            Some(receiver) => {
                let (node, site) = self.receiver(receiver);
                children.push(node);
                site
            }
            None => match self.static_members.get(name) {
                Some(owner) => Site::Static(owner.clone()),
                None => Site::Unknown,
            },
        };

        let shapes: Vec<Shape> = args.iter().map(shape).collect();
        let candidates: Vec<Candidate> = self
            .candidates(&site, name)
            .into_iter()
            .filter(|candidate| {
                candidate.signature.accepts_arity(args.len())
                    && candidate.fits_shapes(hierarchy, &shapes)
            })
            .collect();
        let mut lowered: Vec<Option<NodeId>> = vec![None; args.len()];
        // Overloads are told apart by argument types, which are then computed
        // without a target type.
        if candidates.len() != 1 {
            for (idx, arg) in args.iter().enumerate() {
                if shapes[idx] == Shape::Plain {
                    lowered[idx] = Some(self.expr(arg, None));
                }
            }
        }
        let chosen = candidates
            .into_iter()
            .find(|candidate| self.applicable(candidate, &lowered));

        let kind = NodeKind::MethodCall {
            name: name.to_string(),
            has_receiver: receiver.is_some(),
            type_args: type_args.clone(),
        };
        let Some(chosen) = chosen else {
            tracing::trace!(method = name, "no applicable signature");
            for (idx, arg) in args.iter().enumerate() {
                let child = match lowered[idx] {
                    Some(child) => child,
                    None => self.expr(arg, None),
                };
                children.push(child);
            }
            return self.node(kind, range, &children);
        };

        let mut env = chosen.env();
        for (arg, param) in type_args.iter().zip(&chosen.signature.type_params) {
            env.unify_exact(hierarchy, arg, &Type::Var(param.clone()));
        }
        if let Some(expected) = expected {
            target_type(hierarchy, &mut env, &chosen.signature.returns, expected);
        }
        for (idx, arg) in args.iter().enumerate() {
            if shapes[idx] != Shape::Plain {
                continue;
            }
            let child = match lowered[idx] {
                Some(child) => child,
                None => {
                    let expected = chosen
                        .signature
                        .param_for(idx)
                        .map(|param| env.resolve(&param))
                        .filter(Type::is_ground);
                    let child = self.expr(arg, expected.as_ref());
                    lowered[idx] = Some(child);
                    child
                }
            };
            if let Some(actual) = self.type_of(child) {
                if let Some(formal) = chosen.param(idx, args.len(), Some(&actual)) {
                    bind_argument(hierarchy, &mut env, &actual, &formal);
                }
            }
        }
        for (idx, arg) in args.iter().enumerate() {
            if shapes[idx] != Shape::Plain {
                let formal = chosen.signature.param_for(idx);
                lowered[idx] = Some(self.functional(arg, formal.as_ref(), &mut env));
            }
        }
        children.extend(lowered.into_iter().flatten());
        let node = self.node(kind, range, &children);
        self.tree.set_type(node, Some(chosen.result(&env)));
        node
    }

    /// Lowers an argument in a position of type `formal`. Lambdas and method
    /// references are typed from it, and what they return feeds back into
    /// `env`.
    fn functional(&mut self, expr: &Expr, formal: Option<&Type>, env: &mut TypeEnv) -> NodeId {
        match &expr.kind {
            ExprKind::Parens(inner) => {
                let child = self.functional(inner, formal, env);
                let ty = self.type_of(child);
                let node = self.node(NodeKind::Parens, expr.range, &[child]);
                self.tree.set_type(node, ty);
                node
            }
            ExprKind::Lambda { params, body } => self.lambda(expr.range, params, body, formal, env),
            ExprKind::MethodRef { target, name } => {
                self.method_ref(expr.range, target, name, formal, env)
            }
            _ => {
                let expected = formal.map(|formal| env.resolve(formal)).filter(Type::is_ground);
                let node = self.expr(expr, expected.as_ref());
                if let (Some(actual), Some(formal)) = (self.type_of(node), formal) {
                    env.unify_lower(self.hierarchy(), &actual, formal);
                }
                node
            }
        }
    }

    fn lambda(
        &mut self,
        range: Range,
        params: &[(String, Range)],
        body: &Expr,
        formal: Option<&Type>,
        env: &mut TypeEnv,
    ) -> NodeId {
        let hierarchy = self.hierarchy();
        let signature = formal
            .and_then(|formal| hierarchy.functional_signature(&env.resolve(formal)))
            .filter(|signature| signature.params.len() == params.len());
        self.scopes.push(BTreeMap::new());
        let mut children = Vec::with_capacity(params.len() + 1);
        for (idx, (name, param_range)) in params.iter().enumerate() {
            let ty = signature
                .as_ref()
                .and_then(|signature| signature.params.get(idx))
                .map(|ty| env.resolve(ty))
                .filter(Type::is_ground);
            let param = self.node(NodeKind::Param(name.clone()), *param_range, &[]);
            let symbol = self
                .tree
                .add_symbol(name.clone(), SymbolKind::Param, None, ty.clone());
            self.tree.set_symbol(param, symbol);
            self.tree.set_type(param, ty);
            self.declare(name, symbol);
            children.push(param);
        }
        let returns = signature
            .map(|signature| signature.returns)
            .filter(|returns| *returns != Type::Primitive(Primitive::Void));
        let expected = returns
            .as_ref()
            .map(|returns| env.resolve(returns))
            .filter(Type::is_ground);
        let body = self.expr(body, expected.as_ref());
        children.push(body);
        if let (Some(returns), Some(actual)) = (&returns, self.type_of(body)) {
            env.unify_lower(hierarchy, &actual, returns);
        }
        self.scopes.pop();
        let node = self.node(NodeKind::Lambda, range, &children);
        let ty = formal.map(|formal| env.resolve(formal)).filter(Type::is_ground);
        self.tree.set_type(node, ty);
        node
    }

    fn method_ref(
        &mut self,
        range: Range,
        target: &Expr,
        name: &str,
        formal: Option<&Type>,
        env: &mut TypeEnv,
    ) -> NodeId {
        let hierarchy = self.hierarchy();
        let (target, site) = self.receiver(target);
        let node = self.node(NodeKind::MethodRef(name.to_string()), range, &[target]);
        let Some(signature) =
            formal.and_then(|formal| hierarchy.functional_signature(&env.resolve(formal)))
        else {
            return node;
        };
        let params: Vec<Option<Type>> = signature
            .params
            .iter()
            .map(|param| Some(env.resolve(param)).filter(Type::is_ground))
            .collect();
        let mut returned = self.invoke(&site, name, &params);
        if returned.is_none() {
            // `Type::instanceMethod` takes its receiver as the first argument.
            if let (Site::Static(owner), Some((Some(first), rest))) = (&site, params.split_first())
            {
                if hierarchy.as_super(first, owner).is_some() {
                    returned = self.invoke(&Site::Instance(first.clone()), name, rest);
                }
            }
        }
        if let Some(returned) = returned {
            if signature.returns != Type::Primitive(Primitive::Void) {
                env.unify_lower(hierarchy, &returned, &signature.returns);
            }
        }
        let ty = formal.map(|formal| env.resolve(formal)).filter(Type::is_ground);
        self.tree.set_type(node, ty);
        node
    }

    /// Result type of calling `name` on `site` with arguments of the given
    /// (possibly unknown) types.
    fn invoke(&self, site: &Site, name: &str, args: &[Option<Type>]) -> Option<Type> {
        let hierarchy = self.hierarchy();
        self.candidates(site, name)
            .into_iter()
            .filter(|candidate| candidate.signature.accepts_arity(args.len()))
            .find_map(|candidate| {
                let mut env = candidate.env();
                for (idx, arg) in args.iter().enumerate() {
                    let Some(actual) = arg else {
                        continue;
                    };
                    let formal = candidate.param(idx, args.len(), Some(actual))?;
                    if !bind_argument(hierarchy, &mut env, actual, &formal) {
                        return None;
                    }
                }
                Some(candidate.result(&env))
            })
    }

    fn conditional_type(
        &self,
        then: Option<Type>,
        otherwise: Option<Type>,
        expected: Option<&Type>,
    ) -> Option<Type> {
        let hierarchy = self.hierarchy();
        match (then, otherwise) {
            (Some(Type::Null), Some(Type::Null)) => expected.cloned(),
            (Some(Type::Null), Some(other)) | (Some(other), Some(Type::Null)) => Some(other.boxed()),
            (Some(a), Some(b)) if a == b => Some(a),
            (Some(a), Some(b)) => match (a.unboxed(), b.unboxed()) {
                (Some(p), Some(q)) if p.is_numeric() && q.is_numeric() => {
                    Some(Type::Primitive(p.promote(q)))
                }
                (Some(Primitive::Boolean), Some(Primitive::Boolean)) => Some(Type::boolean()),
                _ if hierarchy.is_subtype(&a, &b) => Some(b),
                _ if hierarchy.is_subtype(&b, &a) => Some(a),
                _ => expected.cloned(),
            },
            (Some(Type::Null), None) | (None, Some(Type::Null)) | (None, None) => expected.cloned(),
            (Some(known), None) | (None, Some(known)) => expected.cloned().or(Some(known)),
        }
    }
}

fn type_params<'s>(names: impl Iterator<Item = &'s String>) -> Vec<TypeParam> {
    let mut params: Vec<TypeParam> = Vec::new();
    for name in names {
        if !params.iter().any(|param| &param.name == name) {
            params.push(TypeParam {
                name: name.clone(),
                bound: None,
            });
        }
    }
    params
}

/// Rewrites `signature` in terms of the receiver's type arguments.
/// Wildcards are replaced by their bound.
fn substitute_owner(h: &TypeHierarchy, signature: &Signature, owner: &Type) -> Signature {
    let mut bindings = BTreeMap::new();
    if let (Type::Class { args, .. }, Some(decl)) = (owner, h.get(&signature.owner)) {
        for (idx, param) in decl.params.iter().enumerate() {
            if signature.type_params.contains(param) {
                continue;
            }
            let arg = match args.get(idx) {
                Some(Type::Wildcard(Some(bound))) => (**bound).clone(),
                Some(Type::Wildcard(None)) | None => Type::class("Object"),
                Some(arg) => arg.clone(),
            };
            bindings.insert(param.clone(), arg);
        }
    }
    let mut signature = signature.clone();
    signature.params = signature
        .params
        .iter()
        .map(|param| param.substitute(&bindings))
        .collect();
    signature.returns = signature.returns.substitute(&bindings);
    signature
}

/// Unconstrained type variables become `Object`.
fn default_unbound(ty: &Type) -> Type {
    let bindings: BTreeMap<String, Type> = ty
        .type_vars()
        .into_iter()
        .map(|var| (var, Type::class("Object")))
        .collect();
    ty.substitute(&bindings)
}

/// Binds the method's type parameters from the call's target type, when the
/// two agree.
fn target_type(h: &TypeHierarchy, env: &mut TypeEnv, returns: &Type, expected: &Type) {
    let mut trial = env.clone();
    let fits = match (returns, expected) {
        (Type::Var(_), _) => trial.unify_lower(h, &expected.boxed(), returns),
        (
            Type::Class { .. },
            Type::Class {
                name,
                args: expected_args,
            },
        ) => match h.as_super(returns, name) {
            Some(Type::Class { args, .. }) if args.len() == expected_args.len() => expected_args
                .iter()
                .zip(&args)
                .filter(|(expected, _)| {
                    expected.is_ground() && !matches!(expected, Type::Wildcard(_))
                })
                .all(|(expected, formal)| trial.unify_exact(h, expected, formal)),
            _ => false,
        },
        _ => false,
    };
    if fits {
        *env = trial;
    }
}

fn bind_argument(h: &TypeHierarchy, env: &mut TypeEnv, actual: &Type, formal: &Type) -> bool {
    if formal.is_ground() {
        assignable(h, actual, formal)
    } else {
        env.unify_lower(h, actual, formal)
    }
}

/// Method-invocation conversion: subtyping, boxing and primitive widening.
fn assignable(h: &TypeHierarchy, actual: &Type, formal: &Type) -> bool {
    match (actual, formal) {
        (Type::Primitive(from), Type::Primitive(to)) => from == to || widens(*from, *to),
        (Type::Class { .. }, Type::Primitive(to)) => actual
            .unboxed()
            .is_some_and(|from| from == *to || widens(from, *to)),
        _ => h.is_subtype(actual, formal),
    }
}

fn widens(from: Primitive, to: Primitive) -> bool {
    let rank = |p: Primitive| match p {
        Primitive::Byte => 1,
        Primitive::Short | Primitive::Char => 2,
        Primitive::Int => 3,
        Primitive::Long => 4,
        Primitive::Float => 5,
        Primitive::Double => 6,
        Primitive::Boolean | Primitive::Void => 0,
    };
    rank(from) > 0 && rank(from) < rank(to) && to != Primitive::Char
}

fn literal_type(literal: &Literal) -> Type {
    match literal {
        Literal::Int { long: true, .. } => Type::Primitive(Primitive::Long),
        Literal::Int { .. } => Type::Primitive(Primitive::Int),
        Literal::Float { double: false, .. } => Type::Primitive(Primitive::Float),
        Literal::Float { .. } => Type::Primitive(Primitive::Double),
        Literal::Str(_) => Type::string(),
        Literal::Char(_) => Type::Primitive(Primitive::Char),
        Literal::Bool(_) => Type::boolean(),
        Literal::Null => Type::Null,
    }
}

fn binary_type(op: BinaryOp, lhs: Option<Type>, rhs: Option<Type>) -> Option<Type> {
    if op.is_logical() || op.is_comparison() {
        return Some(Type::boolean());
    }
    let (lhs, rhs) = (lhs?, rhs?);
    if op == BinaryOp::Add && (lhs == Type::string() || rhs == Type::string()) {
        return Some(Type::string());
    }
    let (p, q) = (lhs.unboxed()?, rhs.unboxed()?);
    (p.is_numeric() && q.is_numeric()).then(|| Type::Primitive(p.promote(q)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(source: &str) -> SyntaxTree {
        SketchHost::builtin()
            .unwrap()
            .load("Test.sketch", source)
            .unwrap()
    }

    /// Initializer of the last declaration in the unit.
    fn last_init(tree: &SyntaxTree) -> NodeId {
        let last = *tree.children(tree.root()).last().unwrap();
        tree.children(last)[0]
    }

    fn last_type(source: &str) -> String {
        let tree = load(source);
        tree.type_of(last_init(&tree))
            .map(ToString::to_string)
            .unwrap_or_else(|| "<untyped>".to_string())
    }

    #[test]
    fn generic_calls_take_the_target_type() {
        assert_eq!(
            last_type("import java.util.Optional;\nOptional<String> o = Optional.empty();"),
            "Optional<String>"
        );
        assert_eq!(
            last_type("import java.util.List;\nList<String> l = List.of(\"a\", \"b\");"),
            "List<String>"
        );
    }

    #[test]
    fn arguments_infer_method_type_parameters() {
        assert_eq!(
            last_type("import java.util.Optional;\nint x = 1;\nObject o = Optional.of(x);"),
            "Optional<Integer>"
        );
    }

    #[test]
    fn unconstrained_parameters_default_to_object() {
        assert_eq!(
            last_type("import java.util.Optional;\nObject o = Optional.empty();"),
            "Optional<Object>"
        );
    }

    #[test]
    fn instance_members_see_receiver_type_arguments() {
        let source = "import java.util.List;\n\
                      List<String> l = List.of(\"a\");\n\
                      Object first = l.stream().findFirst();";
        assert_eq!(last_type(source), "Optional<String>");
    }

    #[test]
    fn lambdas_are_typed_by_their_target() {
        let source = "import java.util.Optional;\n\
                      Optional<String> o = Optional.of(\"a\");\n\
                      Object mapped = o.map(v -> v.isEmpty());";
        assert_eq!(last_type(source), "Optional<Boolean>");
        let tree = load(source);
        let lambda = tree.children(last_init(&tree))[1];
        let param = tree.children(lambda)[0];
        assert_eq!(tree.type_of(param), Some(&Type::string()));
    }

    #[test]
    fn method_references_resolve_bound_and_unbound_receivers() {
        let source = "import java.util.Optional;\n\
                      import java.util.stream.Stream;\n\
                      Stream<Optional<String>> s = Stream.of(Optional.of(\"a\"));\n\
                      Object flat = s.flatMap(Optional::stream);";
        assert_eq!(last_type(source), "Stream<String>");
    }

    #[test]
    fn overloads_are_chosen_by_argument_shape_and_type() {
        let source = "import java.time.Instant;\n\
                      Object a = Instant.ofEpochSecond(0, 0);";
        assert_eq!(last_type(source), "Instant");
        let source = "import reactor.core.publisher.Mono;\n\
                      import java.util.function.Supplier;\n\
                      Supplier<IllegalStateException> s = () -> new_error();\n\
                      Mono<String> m = Mono.error(s);";
        assert_eq!(last_type(source), "Mono<String>");
    }

    #[test]
    fn conditional_branches_unify() {
        assert_eq!(
            last_type("String s = \"a\";\nObject o = s == null ? null : s;"),
            "String"
        );
        assert_eq!(last_type("int i = 1;\nlong j = 2L;\nObject o = true ? i : j;"), "long");
    }

    #[test]
    fn class_names_resolve_to_class_symbols() {
        let tree = load("import java.time.Instant;\nInstant i = Instant.EPOCH;");
        let access = last_init(&tree);
        assert_eq!(tree.type_of(access), Some(&Type::class("Instant")));
        let qualifier = tree.children(access)[0];
        let symbol = tree.symbol_of(qualifier).unwrap();
        assert_eq!(symbol.kind, SymbolKind::Class);
        assert_eq!(symbol.qualified.as_deref(), Some("java.time.Instant"));
        assert_eq!(tree.type_of(qualifier), None);
    }

    #[test]
    fn reassignment_clears_effective_finality() {
        let tree = load("int a = 1;\nint b = 2;\nb = 3;\nint c;\nc = 4;\nint d = a + b + c;");
        let finals: BTreeMap<String, bool> = tree
            .post_order(tree.root())
            .into_iter()
            .filter_map(|node| tree.symbol_of(node))
            .map(|symbol| (symbol.name.clone(), symbol.effectively_final))
            .collect();
        assert!(finals["a"]);
        assert!(!finals["b"]);
        assert!(finals["c"]);
    }

    #[test]
    fn static_imports_resolve_members() {
        let source = "import static java.util.Optional.ofNullable;\n\
                      String s = \"a\";\n\
                      Object o = ofNullable(s);";
        assert_eq!(last_type(source), "Optional<String>");
    }

    #[test]
    fn on_demand_imports_bring_classes_into_scope() {
        assert_eq!(
            last_type("import java.time.*;\nObject d = Duration.ofMillis(5);"),
            "Duration"
        );
    }

    #[test]
    fn syntax_errors_carry_the_path() {
        let err = SketchHost::builtin()
            .unwrap()
            .load("Broken.sketch", "int x = ;")
            .unwrap_err();
        assert!(err.to_string().contains("Broken.sketch"));
    }
}
