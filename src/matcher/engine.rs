use crate::ast::{AstView, NodeId, NodeKind, SymbolId, SymbolKind, Type};
use crate::matcher::bindings::{
    Bindings, HoleValue, LambdaParam, PendingPlaceholder, PlaceholderCapture,
};
use crate::matcher::unify::TypeEnv;
use crate::template::{BeforeTemplate, HoleId, Rule, TemplateNode};

/// A successful match of one of a rule's before-templates.
#[derive(Debug, Clone)]
pub struct RuleMatch {
    pub node: NodeId,
    /// Index into [`Rule::all_befores`].
    pub before: usize,
    pub negated: bool,
    pub bindings: Bindings,
    /// Later befores that also matched `node` with different hole bindings.
    pub ambiguous: Vec<usize>,
}

#[derive(Debug, Clone)]
pub enum MatchOutcome {
    Matched(RuleMatch),
    NoMatch,
    /// Matched, but a placeholder captured variables that are not effectively
    /// final. The rewrite must be suppressed.
    Suspect { before: usize, symbols: Vec<String> },
    /// A type needed by the match could not be resolved.
    Unresolved(String),
}

impl MatchOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, MatchOutcome::Matched(_))
    }
}

enum Attempt {
    Matched(Bindings),
    NoMatch,
    Suspect(Vec<String>),
    Unresolved(String),
}

/// Tries every before-template of `rule` (negated variants last) against
/// `node`. The first success in declaration order wins; the remaining
/// befores are still tried so that disagreeing alternatives are noticed.
pub fn match_rule<V: AstView + ?Sized>(view: &V, rule: &Rule, node: NodeId) -> MatchOutcome {
    let mut fallback = MatchOutcome::NoMatch;
    let mut chosen: Option<RuleMatch> = None;
    for (idx, (before, negated)) in rule.all_befores().enumerate() {
        match match_before(view, rule, before, node) {
            Attempt::Matched(bindings) => {
                if let Some(first) = chosen.as_mut() {
                    if first.negated != negated || !same_holes(view, &first.bindings, &bindings) {
                        tracing::debug!(
                            rule = %rule.name,
                            chosen = first.before,
                            other = idx,
                            "before-templates disagree"
                        );
                        first.ambiguous.push(idx);
                    }
                    continue;
                }
                tracing::trace!(rule = %rule.name, before = idx, ?node, "matched");
                chosen = Some(RuleMatch {
                    node,
                    before: idx,
                    negated,
                    bindings,
                    ambiguous: Vec::new(),
                });
            }
            Attempt::Suspect(symbols) => {
                if !matches!(fallback, MatchOutcome::Suspect { .. }) {
                    fallback = MatchOutcome::Suspect {
                        before: idx,
                        symbols,
                    };
                }
            }
            Attempt::Unresolved(reason) => {
                if matches!(fallback, MatchOutcome::NoMatch) {
                    fallback = MatchOutcome::Unresolved(reason);
                }
            }
            Attempt::NoMatch => {}
        }
    }
    match chosen {
        Some(found) => MatchOutcome::Matched(found),
        None => fallback,
    }
}

/// Every hole is bound to structurally equal code in both.
fn same_holes<V: AstView + ?Sized>(view: &V, a: &Bindings, b: &Bindings) -> bool {
    a.holes.len() == b.holes.len()
        && a.holes.iter().all(|(id, value)| match (value, b.hole(*id)) {
            (HoleValue::Single(x), Some(HoleValue::Single(y))) => view.struct_eq(*x, *y),
            (HoleValue::Many(xs), Some(HoleValue::Many(ys))) => {
                xs.len() == ys.len() && xs.iter().zip(ys).all(|(&x, &y)| view.struct_eq(x, y))
            }
            _ => false,
        })
}

fn match_before<V: AstView + ?Sized>(
    view: &V,
    rule: &Rule,
    before: &BeforeTemplate,
    node: NodeId,
) -> Attempt {
    let mut matcher = Matcher {
        view,
        rule,
        before,
        bindings: Bindings::new(TypeEnv::new(&rule.type_params)),
        unresolved: None,
    };
    if !matcher.matches(&before.root, node) {
        return matcher.abandon();
    }
    let suspects = match matcher.resolve_placeholders() {
        Ok(suspects) => suspects,
        Err(attempt) => return attempt,
    };
    if let Some(result) = &rule.result {
        // The result check is skipped when the candidate itself is untyped.
        if let Some(ty) = view.type_of(view.strip_parens(node)) {
            if !matcher
                .bindings
                .types
                .unify_lower(view.hierarchy(), ty, result)
            {
                return Attempt::NoMatch;
            }
        }
    }
    let unbound = matcher.bindings.types.unbound();
    if !unbound.is_empty() {
        let reason = format!("type parameter(s) {} left unresolved", unbound.join(", "));
        tracing::debug!(rule = %rule.name, "{reason}");
        return Attempt::Unresolved(reason);
    }
    if !suspects.is_empty() {
        return Attempt::Suspect(suspects);
    }
    Attempt::Matched(matcher.bindings)
}

enum Target {
    Hole(HoleId, NodeId),
    Lambda(LambdaParam),
}

struct Matcher<'a, V: AstView + ?Sized> {
    view: &'a V,
    rule: &'a Rule,
    before: &'a BeforeTemplate,
    bindings: Bindings,
    unresolved: Option<String>,
}

impl<'a, V: AstView + ?Sized> Matcher<'a, V> {
    fn abandon(&mut self) -> Attempt {
        match self.unresolved.take() {
            Some(reason) => Attempt::Unresolved(reason),
            None => Attempt::NoMatch,
        }
    }

    fn matches(&mut self, template: &TemplateNode, node: NodeId) -> bool {
        let node = self.view.strip_parens(node);
        match template {
            TemplateNode::Skeleton { kind, children } => self.match_skeleton(kind, children, node),
            TemplateNode::Hole(id) => self.match_hole(*id, node),
            TemplateNode::Placeholder { id, args } => {
                self.bindings.pending.push(PendingPlaceholder {
                    id: *id,
                    args: args.clone(),
                    node,
                    lambdas: self.bindings.lambdas.clone(),
                });
                true
            }
            TemplateNode::TypeName { name, qualified } => {
                self.match_type_name(name, qualified, node)
            }
            TemplateNode::LambdaVar(name) => self.match_lambda_var(name, node),
            TemplateNode::Alternation(alternatives) => {
                for alternative in alternatives {
                    let snapshot = self.bindings.clone();
                    if self.matches(alternative, node) {
                        return true;
                    }
                    self.bindings = snapshot;
                }
                false
            }
            TemplateNode::Tagged { body, .. } => self.matches(body, node),
        }
    }

    fn match_all(&mut self, templates: &[TemplateNode], nodes: &[NodeId]) -> bool {
        templates
            .iter()
            .zip(nodes)
            .all(|(template, &node)| self.matches(template, node))
    }

    fn match_skeleton(&mut self, kind: &NodeKind, children: &[TemplateNode], node: NodeId) -> bool {
        let view = self.view;
        if !kind.same_label(view.kind(node)) {
            return false;
        }
        if let NodeKind::Lambda = kind {
            return self.match_lambda(children, node);
        }
        let node_children = view.children(node);
        let before = self.before;
        match children.split_last() {
            Some((TemplateNode::Hole(id), fixed)) if before.hole(*id).repeated => {
                if node_children.len() < fixed.len() {
                    return false;
                }
                let (head, rest) = node_children.split_at(fixed.len());
                self.match_all(fixed, head) && self.match_repeated(*id, rest)
            }
            _ => {
                node_children.len() == children.len() && self.match_all(children, node_children)
            }
        }
    }

    fn match_lambda(&mut self, children: &[TemplateNode], node: NodeId) -> bool {
        let view = self.view;
        let node_children = view.children(node);
        let (Some((body, params)), Some((&node_body, node_params))) =
            (children.split_last(), node_children.split_last())
        else {
            return false;
        };
        if params.len() != node_params.len() {
            return false;
        }
        let saved = self.bindings.lambdas.clone();
        for (param, &node_param) in params.iter().zip(node_params) {
            match (param, view.kind(node_param)) {
                (
                    TemplateNode::Skeleton {
                        kind: NodeKind::Param(name),
                        ..
                    },
                    NodeKind::Param(node_name),
                ) => {
                    self.bindings.lambdas.insert(
                        name.clone(),
                        LambdaParam {
                            name: node_name.clone(),
                            symbol: view.symbol_of(node_param).map(|symbol| symbol.id),
                        },
                    );
                }
                _ => {
                    self.bindings.lambdas = saved;
                    return false;
                }
            }
        }
        let matched = self.matches(body, node_body);
        self.bindings.lambdas = saved;
        matched
    }

    fn match_hole(&mut self, id: HoleId, node: NodeId) -> bool {
        let view = self.view;
        let before = self.before;
        let decl = before.hole(id);
        if self.references_template_lambda(node) {
            return false;
        }
        let Some(ty) = self.node_type(node) else {
            return false;
        };
        if decl.array && !ty.is_array() {
            return false;
        }
        if let Some(HoleValue::Many(_)) = self.bindings.hole(id) {
            return false;
        }
        if let Some(existing) = self.bindings.single(id) {
            return view.struct_eq(existing, node)
                && self
                    .bindings
                    .types
                    .unify_lower(view.hierarchy(), &ty, &decl.ty);
        }
        if !self
            .bindings
            .types
            .unify_lower(view.hierarchy(), &ty, &decl.ty)
        {
            return false;
        }
        self.bindings.holes.insert(id, HoleValue::Single(node));
        true
    }

    fn match_repeated(&mut self, id: HoleId, rest: &[NodeId]) -> bool {
        let view = self.view;
        let before = self.before;
        let decl = before.hole(id);
        let element = match &decl.ty {
            Type::Array(element) => (**element).clone(),
            other => other.clone(),
        };
        let stripped: Vec<NodeId> = rest.iter().map(|&arg| view.strip_parens(arg)).collect();
        for &arg in &stripped {
            if self.references_template_lambda(arg) {
                return false;
            }
            let Some(ty) = self.node_type(arg) else {
                return false;
            };
            // A single array argument stands for the whole variadic tail.
            let formal = if ty.is_array() && stripped.len() == 1 {
                &decl.ty
            } else {
                &element
            };
            if !self.bindings.types.unify_lower(view.hierarchy(), &ty, formal) {
                return false;
            }
        }
        match self.bindings.hole(id) {
            Some(HoleValue::Many(existing)) => {
                existing.len() == stripped.len()
                    && existing
                        .iter()
                        .zip(&stripped)
                        .all(|(&a, &b)| view.struct_eq(a, b))
            }
            Some(HoleValue::Single(_)) => false,
            None => {
                self.bindings.holes.insert(id, HoleValue::Many(stripped));
                true
            }
        }
    }

    fn match_type_name(&self, name: &str, qualified: &str, node: NodeId) -> bool {
        let view = self.view;
        match view.kind(node) {
            NodeKind::Name(simple) => match view.symbol_of(node) {
                Some(symbol) if symbol.kind == SymbolKind::Class => {
                    symbol.qualified.as_deref() == Some(qualified)
                }
                Some(_) => false,
                None => simple == name,
            },
            _ => false,
        }
    }

    fn match_lambda_var(&self, name: &str, node: NodeId) -> bool {
        let view = self.view;
        let Some(param) = self.bindings.lambdas.get(name) else {
            return false;
        };
        match view.kind(node) {
            NodeKind::Name(node_name) => {
                same_variable(param, node_name, view.symbol_of(node).map(|symbol| symbol.id))
            }
            _ => false,
        }
    }

    /// Holes may not bind expressions that use a template lambda's parameter.
    fn references_template_lambda(&self, node: NodeId) -> bool {
        if self.bindings.lambdas.is_empty() {
            return false;
        }
        let view = self.view;
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if let NodeKind::Name(name) = view.kind(current) {
                let symbol = view.symbol_of(current).map(|symbol| symbol.id);
                if self
                    .bindings
                    .lambdas
                    .values()
                    .any(|param| same_variable(param, name, symbol))
                {
                    return true;
                }
            }
            stack.extend(view.children(current).iter().copied());
        }
        false
    }

    fn node_type(&mut self, node: NodeId) -> Option<Type> {
        let view = self.view;
        if let NodeKind::Literal(literal) = view.kind(node) {
            if literal.is_null() {
                return Some(Type::Null);
            }
        }
        match view.require_type(node) {
            Ok(ty) => Some(ty.clone()),
            Err(err) => {
                tracing::trace!(rule = %self.rule.name, "{err}");
                self.unresolved.get_or_insert_with(|| err.to_string());
                None
            }
        }
    }

    /// Checks every placeholder seen during the structural match. Returns the
    /// names of captured variables that are not effectively final.
    fn resolve_placeholders(&mut self) -> Result<Vec<String>, Attempt> {
        let view = self.view;
        let rule = self.rule;
        let pending = std::mem::take(&mut self.bindings.pending);
        let mut suspects = Vec::new();
        for placeholder in pending {
            let decl = rule.placeholder(placeholder.id);
            let Some(ty) = self.node_type(placeholder.node) else {
                return Err(self.abandon());
            };
            if !self
                .bindings
                .types
                .unify_lower(view.hierarchy(), &ty, &decl.returns)
            {
                return Err(Attempt::NoMatch);
            }
            let mut targets = Vec::with_capacity(placeholder.args.len());
            for arg in &placeholder.args {
                let target = match arg {
                    TemplateNode::Hole(id) => self
                        .bindings
                        .single(*id)
                        .map(|bound| Target::Hole(*id, bound)),
                    TemplateNode::LambdaVar(name) => {
                        placeholder.lambdas.get(name).cloned().map(Target::Lambda)
                    }
                    _ => None,
                };
                match target {
                    Some(target) => targets.push(target),
                    None => return Err(Attempt::NoMatch),
                }
            }
            let capture = self.capture(&placeholder, &targets, &mut suspects)?;
            let unused_required = decl.params.iter().enumerate().any(|(idx, param)| {
                !param.optional && !capture.occurrences.iter().any(|&(_, used)| used == idx)
            });
            if unused_required {
                return Err(Attempt::NoMatch);
            }
            match self.bindings.placeholders.get(&placeholder.id) {
                Some(existing) => {
                    if !equal_modulo_occurrences(view, existing, &capture) {
                        return Err(Attempt::NoMatch);
                    }
                }
                None => {
                    self.bindings.placeholders.insert(placeholder.id, capture);
                }
            }
        }
        suspects.sort();
        suspects.dedup();
        Ok(suspects)
    }

    fn capture(
        &self,
        placeholder: &PendingPlaceholder,
        targets: &[Target],
        suspects: &mut Vec<String>,
    ) -> Result<PlaceholderCapture, Attempt> {
        let view = self.view;
        let captured_holes: Vec<HoleId> = targets
            .iter()
            .filter_map(|target| match target {
                Target::Hole(id, _) => Some(*id),
                Target::Lambda(_) => None,
            })
            .collect();
        let other_holes: Vec<NodeId> = self
            .bindings
            .holes
            .iter()
            .filter(|(id, _)| !captured_holes.contains(id))
            .filter_map(|(_, value)| match value {
                HoleValue::Single(node) if matches!(view.kind(*node), NodeKind::Name(_)) => {
                    Some(*node)
                }
                _ => None,
            })
            .collect();
        let mut inner_params = Vec::new();
        let mut stack = vec![placeholder.node];
        while let Some(current) = stack.pop() {
            if let NodeKind::Param(name) = view.kind(current) {
                inner_params.push(LambdaParam {
                    name: name.clone(),
                    symbol: view.symbol_of(current).map(|symbol| symbol.id),
                });
            }
            stack.extend(view.children(current).iter().copied());
        }

        let mut occurrences = Vec::new();
        let mut stack = vec![placeholder.node];
        while let Some(current) = stack.pop() {
            let hit = targets.iter().position(|target| match target {
                Target::Hole(_, bound) => view.struct_eq(*bound, current),
                Target::Lambda(param) => match view.kind(current) {
                    NodeKind::Name(name) => same_variable(
                        param,
                        name,
                        view.symbol_of(current).map(|symbol| symbol.id),
                    ),
                    _ => false,
                },
            });
            if let Some(idx) = hit {
                occurrences.push((current, idx));
                continue;
            }
            if let NodeKind::Name(name) = view.kind(current) {
                let symbol = view.symbol_of(current);
                let id = symbol.map(|symbol| symbol.id);
                if inner_params
                    .iter()
                    .any(|param| same_variable(param, name, id))
                {
                    continue;
                }
                if placeholder
                    .lambdas
                    .values()
                    .any(|param| same_variable(param, name, id))
                {
                    return Err(Attempt::NoMatch);
                }
                if other_holes.iter().any(|&hole| names_same_variable(view, hole, current)) {
                    return Err(Attempt::NoMatch);
                }
                if let Some(symbol) = symbol {
                    if symbol.is_variable() && !symbol.effectively_final {
                        suspects.push(name.clone());
                    }
                }
                continue;
            }
            stack.extend(view.children(current).iter().rev().copied());
        }
        Ok(PlaceholderCapture {
            node: placeholder.node,
            occurrences,
        })
    }
}

fn same_variable(param: &LambdaParam, name: &str, symbol: Option<SymbolId>) -> bool {
    match (param.symbol, symbol) {
        (Some(a), Some(b)) => a == b,
        _ => param.name == name,
    }
}

fn names_same_variable<V: AstView + ?Sized>(view: &V, a: NodeId, b: NodeId) -> bool {
    match (view.kind(a), view.kind(b)) {
        (NodeKind::Name(x), NodeKind::Name(y)) => match (view.symbol_of(a), view.symbol_of(b)) {
            (Some(sa), Some(sb)) => sa.id == sb.id,
            _ => x == y,
        },
        _ => false,
    }
}

/// Two captures of the same placeholder agree once their argument
/// occurrences are abstracted away.
fn equal_modulo_occurrences<V: AstView + ?Sized>(
    view: &V,
    a: &PlaceholderCapture,
    b: &PlaceholderCapture,
) -> bool {
    fn walk<V: AstView + ?Sized>(
        view: &V,
        x: NodeId,
        y: NodeId,
        a: &PlaceholderCapture,
        b: &PlaceholderCapture,
    ) -> bool {
        match (a.occurrence(x), b.occurrence(y)) {
            (Some(i), Some(j)) => return i == j,
            (None, None) => {}
            _ => return false,
        }
        let (x, y) = (view.strip_parens(x), view.strip_parens(y));
        match (view.kind(x), view.kind(y)) {
            (NodeKind::Name(p), NodeKind::Name(q)) => {
                match (view.symbol_of(x), view.symbol_of(y)) {
                    (Some(sx), Some(sy))
                        if sx.kind == SymbolKind::Param && sy.kind == SymbolKind::Param =>
                    {
                        p == q
                    }
                    (Some(sx), Some(sy)) => sx.id == sy.id,
                    _ => p == q,
                }
            }
            (kx, ky) if kx.same_label(ky) => {
                let (cx, cy) = (view.children(x), view.children(y));
                cx.len() == cy.len()
                    && cx.iter().zip(cy).all(|(&i, &j)| walk(view, i, j, a, b))
            }
            _ => false,
        }
    }
    walk(view, a.node, b.node, a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::SyntaxTree;
    use crate::host::SketchHost;
    use crate::rules::load_from_str;

    const OPTIONAL: &str = r#"
[meta]
name = "optional"
imports = ["java.util.Optional", "java.util.Collection", "java.util.List"]

[[rules]]
name = "OptionalOfNullable"
type_params = ["T"]
returns = "Optional<T>"
holes = [{ name = "object", type = "T" }]
before = "object == null ? Optional.empty() : Optional.of(object)"
after = "Optional.ofNullable(object)"

[[rules]]
name = "OptionalFirstCollectionElement"
type_params = ["T"]
returns = "Optional<T>"
holes = [{ name = "collection", type = "Collection<T>" }]
before = [
  "collection.isEmpty() ? Optional.empty() : Optional.of(collection.iterator().next())",
  { template = "collection.isEmpty() ? Optional.empty() : Optional.of(collection.get(0))", holes = [{ name = "collection", type = "List<T>" }] },
]
after = "collection.stream().findFirst()"

[[rules]]
name = "TernaryOperatorOptionalPositiveFiltering"
type_params = ["T"]
returns = "Optional<T>"
holes = [{ name = "input", type = "T" }]
placeholders = [{ name = "test", returns = "boolean", params = [{ name = "value", type = "T" }] }]
before = "test(input) ? Optional.of(input) : Optional.empty()"
after = "Optional.of(input).filter(v -> test(v))"
"#;

    fn rule(name: &str) -> Rule {
        load_from_str(OPTIONAL)
            .unwrap()
            .rules
            .into_iter()
            .find(|rule| rule.short_name() == name)
            .unwrap()
    }

    fn tree(source: &str) -> SyntaxTree {
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

    #[test]
    fn null_guard_binds_hole_and_type() {
        let tree = tree(
            "import java.util.Optional;\n\
             String x = \"a\";\n\
             Optional<String> o = x == null ? Optional.empty() : Optional.of(x);\n",
        );
        let rule = rule("OptionalOfNullable");
        let MatchOutcome::Matched(found) = match_rule(&tree, &rule, last_init(&tree)) else {
            panic!("expected match");
        };
        assert_eq!(found.bindings.types.get("T"), Some(&Type::string()));
        let bound = found.bindings.single(HoleId(0)).unwrap();
        assert_eq!(tree.kind(bound), &NodeKind::Name("x".into()));
    }

    #[test]
    fn repeated_hole_must_be_structurally_equal() {
        let tree = tree(
            "import java.util.Optional;\n\
             String x = \"a\";\n\
             String y = \"b\";\n\
             Optional<String> o = x == null ? Optional.empty() : Optional.of(y);\n",
        );
        let outcome = match_rule(&tree, &rule("OptionalOfNullable"), last_init(&tree));
        assert!(matches!(outcome, MatchOutcome::NoMatch));
    }

    #[test]
    fn second_before_template_uses_its_own_hole_type() {
        let tree = tree(
            "import java.util.List;\n\
             import java.util.Optional;\n\
             List<String> list = List.of(\"a\");\n\
             Optional<String> o = list.isEmpty() ? Optional.empty() : Optional.of(list.get(0));\n",
        );
        let MatchOutcome::Matched(found) =
            match_rule(&tree, &rule("OptionalFirstCollectionElement"), last_init(&tree))
        else {
            panic!("expected match");
        };
        assert_eq!(found.before, 1);
    }

    const EQUALS: &str = r#"
[meta]
name = "objects"
imports = ["java.util.Objects"]

[[rules]]
name = "Eq"
holes = [{ name = "a", type = "Object" }, { name = "b", type = "Object" }]
before = ["a.equals(b)", "b.equals(a)"]
after = "Objects.equals(a, b)"
"#;

    fn equals_rule(name: &str) -> Rule {
        load_from_str(EQUALS)
            .unwrap()
            .rules
            .into_iter()
            .find(|rule| rule.short_name() == name)
            .unwrap()
    }

    #[test]
    fn disagreeing_befores_are_recorded() {
        let tree = tree("String x = \"a\";\nString y = \"b\";\nboolean same = x.equals(y);\n");
        let MatchOutcome::Matched(found) = match_rule(&tree, &equals_rule("Eq"), last_init(&tree))
        else {
            panic!("expected match");
        };
        assert_eq!(found.before, 0);
        assert_eq!(found.ambiguous, vec![1]);
        let a = found.bindings.single(HoleId(0)).unwrap();
        assert_eq!(tree.kind(a), &NodeKind::Name("x".into()));
    }

    #[test]
    fn agreeing_befores_are_not_ambiguous() {
        let tree = tree("String x = \"a\";\nboolean same = x.equals(x);\n");
        let MatchOutcome::Matched(found) = match_rule(&tree, &equals_rule("Eq"), last_init(&tree))
        else {
            panic!("expected match");
        };
        assert!(found.ambiguous.is_empty());
    }

    #[test]
    fn placeholder_records_occurrences() {
        let tree = tree(
            "import java.util.Optional;\n\
             int x = 1;\n\
             Optional<Integer> o = x > 0 ? Optional.of(x) : Optional.empty();\n",
        );
        let MatchOutcome::Matched(found) = match_rule(
            &tree,
            &rule("TernaryOperatorOptionalPositiveFiltering"),
            last_init(&tree),
        ) else {
            panic!("expected match");
        };
        assert_eq!(found.bindings.types.get("T"), Some(&Type::class("Integer")));
        let capture = found
            .bindings
            .placeholder(crate::template::PlaceholderId(0))
            .unwrap();
        assert_eq!(capture.occurrences.len(), 1);
        assert_eq!(capture.occurrences[0].1, 0);
    }

    #[test]
    fn placeholder_over_mutable_variable_is_suspect() {
        let tree = tree(
            "import java.util.Optional;\n\
             import java.util.function.Predicate;\n\
             Predicate<Integer> outer = v -> true;\n\
             outer = v -> false;\n\
             int x = 1;\n\
             Optional<Integer> o = outer.test(x) ? Optional.of(x) : Optional.empty();\n",
        );
        let outcome = match_rule(
            &tree,
            &rule("TernaryOperatorOptionalPositiveFiltering"),
            last_init(&tree),
        );
        let MatchOutcome::Suspect { symbols, .. } = outcome else {
            panic!("expected suspect, got {outcome:?}");
        };
        assert_eq!(symbols, vec!["outer".to_string()]);
    }

    #[test]
    fn placeholder_must_use_its_argument() {
        let tree = tree(
            "import java.util.Optional;\n\
             int x = 1;\n\
             boolean flag = true;\n\
             Optional<Integer> o = flag ? Optional.of(x) : Optional.empty();\n",
        );
        let outcome = match_rule(
            &tree,
            &rule("TernaryOperatorOptionalPositiveFiltering"),
            last_init(&tree),
        );
        assert!(matches!(outcome, MatchOutcome::NoMatch));
    }
}
