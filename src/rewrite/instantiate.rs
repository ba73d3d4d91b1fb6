use crate::ast::{AstView, Import, NodeId, NodeKind};
use crate::matcher::{Bindings, HoleValue, PlaceholderCapture, RuleMatch};
use crate::rewrite::errors::RewriteError;
use crate::rewrite::fragment::{Fragment, Replacement, SymbolRef};
use crate::template::{HoleId, ImportPolicy, PlaceholderId, Rule, Tag, TemplateNode};
use std::collections::BTreeSet;

/// Builds the replacement for a match: the after-template with holes,
/// placeholders and type names filled in.
pub fn instantiate<V: AstView + ?Sized>(
    view: &V,
    rule: &Rule,
    found: &RuleMatch,
) -> Result<Replacement, RewriteError> {
    let site = view.strip_parens(found.node);
    let mut taken = view.names_in_scope(site);
    taken.extend(view.referenced_names(site));
    let mut instantiator = Instantiator {
        view,
        rule,
        bindings: &found.bindings,
        taken,
        scopes: Vec::new(),
        fresh: 0,
        imports: Vec::new(),
        comments: Vec::new(),
    };
    let mut fragment = instantiator.instantiate(rule.after_for(found.negated))?;
    if let Fragment::Node { ty, .. } = &mut fragment {
        *ty = view.type_of(site).cloned();
    }
    Ok(Replacement {
        rule: rule.name.clone(),
        site,
        slot: view.paren_slot(found.node),
        fragment,
        imports: instantiator.imports,
        comments: instantiator.comments,
    })
}

struct Instantiator<'a, V: AstView + ?Sized> {
    view: &'a V,
    rule: &'a Rule,
    bindings: &'a Bindings,
    /// Names a fresh lambda parameter must avoid.
    taken: BTreeSet<String>,
    /// Template lambda parameters in scope: (template name, host name, fresh id).
    scopes: Vec<(String, String, usize)>,
    fresh: usize,
    imports: Vec<Import>,
    comments: Vec<String>,
}

impl<V: AstView + ?Sized> Instantiator<'_, V> {
    fn instantiate(&mut self, template: &TemplateNode) -> Result<Fragment, RewriteError> {
        match template {
            TemplateNode::Skeleton { kind, children } => self.skeleton(kind, children),
            TemplateNode::Hole(id) => match self.hole(*id)? {
                HoleValue::Single(node) => Ok(Fragment::Existing(*node)),
                HoleValue::Many(_) => Err(self.malformed("repeated hole outside an argument list")),
            },
            TemplateNode::Placeholder { id, args } => self.placeholder(*id, args),
            TemplateNode::TypeName { name, qualified } => {
                self.require_class(qualified);
                Ok(type_name(name, qualified))
            }
            TemplateNode::LambdaVar(name) => {
                let Some((_, host, fresh)) = self.scopes.iter().rev().find(|(t, _, _)| t == name)
                else {
                    return Err(self.malformed(&format!("lambda parameter '{name}' out of scope")));
                };
                Ok(Fragment::Node {
                    kind: NodeKind::Name(host.clone()),
                    children: Vec::new(),
                    symbol: Some(SymbolRef::Fresh(*fresh)),
                    ty: None,
                })
            }
            TemplateNode::Alternation(_) => Err(self.malformed("alternation in after-template")),
            TemplateNode::Tagged { tag, body } => {
                match tag {
                    Tag::CommentBefore(message) => {
                        if !self.comments.contains(message) {
                            self.comments.push(message.clone());
                        }
                    }
                }
                self.instantiate(body)
            }
        }
    }

    fn skeleton(
        &mut self,
        kind: &NodeKind,
        children: &[TemplateNode],
    ) -> Result<Fragment, RewriteError> {
        match kind {
            NodeKind::Lambda => self.lambda(children),
            NodeKind::MethodCall {
                name,
                has_receiver: true,
                type_args,
            } => {
                let (receiver, args) = children
                    .split_first()
                    .ok_or_else(|| self.malformed("method call without receiver"))?;
                let args = self.arguments(args)?;
                // Explicit type arguments survive only where nothing else
                // could drive inference.
                let type_args = if args.is_empty() {
                    let resolved: Vec<_> = type_args
                        .iter()
                        .map(|ty| self.bindings.types.resolve(ty))
                        .collect();
                    if resolved.iter().all(|ty| ty.is_ground()) {
                        resolved
                    } else {
                        Vec::new()
                    }
                } else {
                    Vec::new()
                };
                if let (
                    ImportPolicy::StaticImportAlways,
                    TemplateNode::TypeName { qualified, .. },
                ) = (self.rule.import_policy, receiver)
                {
                    self.add_import(Import::member(format!("{qualified}.{name}")));
                    return Ok(Fragment::node(
                        NodeKind::MethodCall {
                            name: name.clone(),
                            has_receiver: false,
                            type_args,
                        },
                        args,
                    ));
                }
                let mut all = vec![self.instantiate(receiver)?];
                all.extend(args);
                Ok(Fragment::node(
                    NodeKind::MethodCall {
                        name: name.clone(),
                        has_receiver: true,
                        type_args,
                    },
                    all,
                ))
            }
            NodeKind::MethodCall { .. } => Ok(Fragment::node(kind.clone(), self.arguments(children)?)),
            NodeKind::FieldAccess(name) if name != "class" => {
                if let (
                    ImportPolicy::StaticImportAlways,
                    [TemplateNode::TypeName { qualified, .. }],
                ) = (self.rule.import_policy, children)
                {
                    self.add_import(Import::member(format!("{qualified}.{name}")));
                    return Ok(Fragment::node(NodeKind::Name(name.clone()), Vec::new()));
                }
                let children = children
                    .iter()
                    .map(|child| self.instantiate(child))
                    .collect::<Result<_, _>>()?;
                Ok(Fragment::node(kind.clone(), children))
            }
            _ => {
                let children = children
                    .iter()
                    .map(|child| self.instantiate(child))
                    .collect::<Result<_, _>>()?;
                Ok(Fragment::node(kind.clone(), children))
            }
        }
    }

    /// Argument lists flatten repeated holes.
    fn arguments(&mut self, args: &[TemplateNode]) -> Result<Vec<Fragment>, RewriteError> {
        let mut out = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                TemplateNode::Hole(id) => match self.hole(*id)? {
                    HoleValue::Single(node) => out.push(Fragment::Existing(*node)),
                    HoleValue::Many(nodes) => {
                        out.extend(nodes.iter().map(|&node| Fragment::Existing(node)))
                    }
                },
                other => out.push(self.instantiate(other)?),
            }
        }
        Ok(out)
    }

    fn lambda(&mut self, children: &[TemplateNode]) -> Result<Fragment, RewriteError> {
        let (body, params) = children
            .split_last()
            .ok_or_else(|| self.malformed("lambda without body"))?;
        let depth = self.scopes.len();
        let mut fragments = Vec::with_capacity(children.len());
        for param in params {
            let TemplateNode::Skeleton {
                kind: NodeKind::Param(name),
                ..
            } = param
            else {
                return Err(self.malformed("lambda parameter is not a name"));
            };
            let host = self.fresh_name(name);
            let fresh = self.fresh;
            self.fresh += 1;
            self.scopes.push((name.clone(), host.clone(), fresh));
            fragments.push(Fragment::Node {
                kind: NodeKind::Param(host),
                children: Vec::new(),
                symbol: Some(SymbolRef::Fresh(fresh)),
                ty: None,
            });
        }
        let body = self.instantiate(body);
        self.scopes.truncate(depth);
        fragments.push(body?);
        Ok(Fragment::node(NodeKind::Lambda, fragments))
    }

    /// The template's spelling when free, otherwise the first free
    /// `{spelling}{n}`.
    fn fresh_name(&mut self, spelling: &str) -> String {
        let mut candidate = spelling.to_string();
        let mut counter = 1;
        while self.taken.contains(&candidate) {
            candidate = format!("{spelling}{counter}");
            counter += 1;
        }
        self.taken.insert(candidate.clone());
        candidate
    }

    fn placeholder(
        &mut self,
        id: PlaceholderId,
        args: &[TemplateNode],
    ) -> Result<Fragment, RewriteError> {
        let bindings = self.bindings;
        let capture = bindings
            .placeholder(id)
            .ok_or_else(|| RewriteError::UnboundPlaceholder {
                rule: self.rule.name.clone(),
                placeholder: self.rule.placeholder(id).name.clone(),
            })?;
        let args = args
            .iter()
            .map(|arg| self.instantiate(arg))
            .collect::<Result<Vec<_>, _>>()?;
        let mut on_path = BTreeSet::new();
        for &(occurrence, _) in &capture.occurrences {
            let mut current = Some(occurrence);
            while let Some(node) = current {
                if !on_path.insert(node) || node == capture.node {
                    break;
                }
                current = self.view.parent(node);
            }
        }
        Ok(rebuild(self.view, capture, capture.node, &args, &on_path))
    }

    fn hole(&self, id: HoleId) -> Result<&HoleValue, RewriteError> {
        self.bindings
            .hole(id)
            .ok_or_else(|| RewriteError::UnboundHole {
                rule: self.rule.name.clone(),
                hole: self.rule.hole_names[id.0].clone(),
            })
    }

    fn require_class(&mut self, qualified: &str) {
        let implicit = qualified
            .strip_prefix("java.lang.")
            .is_some_and(|rest| !rest.contains('.'));
        if !implicit {
            self.add_import(Import::class(qualified));
        }
    }

    fn add_import(&mut self, import: Import) {
        if !self.view.has_import(&import) && !self.imports.contains(&import) {
            self.imports.push(import);
        }
    }

    fn malformed(&self, message: &str) -> RewriteError {
        RewriteError::Malformed {
            rule: self.rule.name.clone(),
            message: message.to_string(),
        }
    }
}

fn type_name(name: &str, qualified: &str) -> Fragment {
    Fragment::Node {
        kind: NodeKind::Name(name.to_string()),
        children: Vec::new(),
        symbol: Some(SymbolRef::Class {
            simple: name.to_string(),
            qualified: qualified.to_string(),
        }),
        ty: None,
    }
}

/// Copies the captured expression, substituting argument occurrences.
fn rebuild<V: AstView + ?Sized>(
    view: &V,
    capture: &PlaceholderCapture,
    node: NodeId,
    args: &[Fragment],
    on_path: &BTreeSet<NodeId>,
) -> Fragment {
    if let Some(param) = capture.occurrence(node) {
        return args[param].clone();
    }
    if !on_path.contains(&node) {
        return Fragment::Existing(node);
    }
    Fragment::Node {
        kind: view.kind(node).clone(),
        children: view
            .children(node)
            .iter()
            .map(|&child| rebuild(view, capture, child, args, on_path))
            .collect(),
        symbol: view.symbol_of(node).map(|symbol| SymbolRef::Existing(symbol.id)),
        ty: view.type_of(node).cloned(),
    }
}
