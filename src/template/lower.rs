//! Lowering of declarative rule definitions into [`Rule`]s.

use crate::ast::{NodeKind, Type};
use crate::rules::schema::{CatalogMeta, HoleDef, HoleMatcher, RuleDef};
use crate::syntax::{parse_expression, parse_type, Expr, ExprKind, Literal, UnaryOp};
use crate::template::errors::{LoadErrorKind, TemplateLoadError};
use crate::template::ir::{
    BeforeTemplate, HoleDecl, HoleId, Negation, PlaceholderDecl, PlaceholderId, PlaceholderParam,
    Rule, Tag, TemplateNode, TypeParam,
};
use std::collections::{BTreeMap, BTreeSet};

/// Classes every template may reference without listing them in `meta.imports`.
pub const JAVA_LANG: &[&str] = &[
    "Boolean",
    "Byte",
    "Character",
    "Class",
    "Comparable",
    "Double",
    "Exception",
    "Float",
    "Integer",
    "Iterable",
    "Long",
    "Math",
    "Number",
    "Object",
    "RuntimeException",
    "Short",
    "String",
    "System",
    "Throwable",
];

const ANY_OF: &str = "anyOf";
const EMIT_COMMENT_BEFORE: &str = "emitCommentBefore";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Part {
    Before,
    After,
}

impl Part {
    fn label(self) -> &'static str {
        match self {
            Part::Before => "a before-template",
            Part::After => "the after-template",
        }
    }
}

/// Simple class name to qualified name, from `meta.imports` and `java.lang`.
pub fn class_table(meta: &CatalogMeta) -> BTreeMap<String, String> {
    let mut classes: BTreeMap<String, String> = JAVA_LANG
        .iter()
        .map(|name| (name.to_string(), format!("java.lang.{name}")))
        .collect();
    for import in &meta.imports {
        let simple = import.rsplit('.').next().unwrap_or(import);
        classes.insert(simple.to_string(), import.clone());
    }
    classes
}

/// Lowers one rule definition; the rule name is prefixed with the catalog name.
pub fn lower_rule(
    def: &RuleDef,
    meta: &CatalogMeta,
    classes: &BTreeMap<String, String>,
) -> Result<Rule, TemplateLoadError> {
    let name = if meta.name.is_empty() {
        def.name.clone()
    } else {
        format!("{}.{}", meta.name, def.name)
    };
    RuleLowering::new(def, classes)
        .lower(name.clone())
        .map_err(|kind| TemplateLoadError::new(name, kind))
}

struct RuleLowering<'a> {
    def: &'a RuleDef,
    classes: &'a BTreeMap<String, String>,
    type_params: Vec<TypeParam>,
    param_names: BTreeSet<String>,
}

impl<'a> RuleLowering<'a> {
    fn new(def: &'a RuleDef, classes: &'a BTreeMap<String, String>) -> Self {
        Self {
            def,
            classes,
            type_params: Vec::new(),
            param_names: BTreeSet::new(),
        }
    }

    fn lower(mut self, name: String) -> Result<Rule, LoadErrorKind> {
        let def = self.def;
        self.lower_type_params()?;

        let result = def
            .returns
            .as_deref()
            .map(|text| self.lower_type(text, "returns"))
            .transpose()?;

        // Hole ids are global to the rule; each before gets its own table.
        let mut hole_names: Vec<String> = Vec::new();
        let mut defaults: Vec<HoleDecl> = Vec::new();
        let mut hole_ids: BTreeMap<String, HoleId> = BTreeMap::new();
        for hole in &def.holes {
            if hole_ids.contains_key(&hole.name) {
                return Err(LoadErrorKind::DuplicateDeclaration(hole.name.clone()));
            }
            hole_ids.insert(hole.name.clone(), HoleId(hole_names.len()));
            hole_names.push(hole.name.clone());
            defaults.push(self.lower_hole(hole)?);
        }
        for before in def.before.iter() {
            for hole in before.holes() {
                if !hole_ids.contains_key(&hole.name) {
                    hole_ids.insert(hole.name.clone(), HoleId(hole_names.len()));
                    hole_names.push(hole.name.clone());
                    defaults.push(self.lower_hole(hole)?);
                }
            }
        }

        let mut placeholders = Vec::new();
        let mut placeholder_ids = BTreeMap::new();
        for placeholder in &def.placeholders {
            if hole_ids.contains_key(&placeholder.name)
                || placeholder_ids.contains_key(&placeholder.name)
            {
                return Err(LoadErrorKind::DuplicateDeclaration(placeholder.name.clone()));
            }
            let params = placeholder
                .params
                .iter()
                .map(|param| {
                    Ok(PlaceholderParam {
                        name: param.name.clone(),
                        ty: self.lower_type(&param.ty, &param.name)?,
                        optional: param.optional,
                    })
                })
                .collect::<Result<Vec<_>, LoadErrorKind>>()?;
            placeholder_ids.insert(
                placeholder.name.clone(),
                (PlaceholderId(placeholders.len()), params.len()),
            );
            placeholders.push(PlaceholderDecl {
                name: placeholder.name.clone(),
                returns: self.lower_type(&placeholder.returns, &placeholder.name)?,
                params,
            });
        }

        let mut befores = Vec::new();
        for (idx, before) in def.before.iter().enumerate() {
            let mut table = defaults.clone();
            for hole in before.holes() {
                if let Some(id) = hole_ids.get(&hole.name) {
                    table[id.0] = self.lower_hole(hole)?;
                }
            }
            let source = before.template().trim().to_string();
            let expr = parse_expression(&source).map_err(|source| LoadErrorKind::Syntax {
                part: format!("before #{}", idx + 1),
                source,
            })?;
            let root = TemplateScope {
                part: Part::Before,
                hole_ids: &hole_ids,
                holes: &table,
                placeholders: &placeholder_ids,
                classes: self.classes,
                type_params: &self.param_names,
                lambda: Vec::new(),
            }
            .lower_expr(&expr)?;
            befores.push(BeforeTemplate {
                root,
                holes: table,
                source,
            });
        }
        if befores.is_empty() {
            return Err(LoadErrorKind::NoBefore);
        }

        let after_source = def.after.trim().to_string();
        let after_expr =
            parse_expression(&after_source).map_err(|source| LoadErrorKind::Syntax {
                part: "after".to_string(),
                source,
            })?;
        let after = TemplateScope {
            part: Part::After,
            hole_ids: &hole_ids,
            holes: &defaults,
            placeholders: &placeholder_ids,
            classes: self.classes,
            type_params: &self.param_names,
            lambda: Vec::new(),
        }
        .lower_expr(&after_expr)?;

        let bound_holes: BTreeSet<HoleId> =
            befores.iter().flat_map(|before| before.root.holes()).collect();
        if let Some(unbound) = after.holes().difference(&bound_holes).next() {
            return Err(LoadErrorKind::AfterReferencesUnbound(
                hole_names[unbound.0].clone(),
            ));
        }
        let bound_placeholders: BTreeSet<PlaceholderId> = befores
            .iter()
            .flat_map(|before| before.root.placeholders())
            .collect();
        if let Some(unbound) = after.placeholders().difference(&bound_placeholders).next() {
            return Err(LoadErrorKind::AfterReferencesUnbound(
                placeholders[unbound.0].name.clone(),
            ));
        }

        self.check_type_params_fixable(&befores, &placeholders, result.as_ref())?;

        let negation = if def.also_negation {
            match &result {
                Some(ty) if !ty.is_boolean() => {
                    return Err(LoadErrorKind::NegationOfNonBoolean(ty.to_string()))
                }
                _ => {}
            }
            Some(Negation {
                befores: befores
                    .iter()
                    .map(|before| BeforeTemplate {
                        root: negate_before(&before.root),
                        holes: before.holes.clone(),
                        source: format!("!({})", before.source),
                    })
                    .collect(),
                after: negate_after(&after),
            })
        } else {
            None
        };

        Ok(Rule {
            name,
            description: def.description.clone(),
            type_params: self.type_params,
            result: result.or_else(|| def.also_negation.then(Type::boolean)),
            hole_names,
            placeholders,
            befores,
            after,
            after_source,
            negation,
            import_policy: def.import_policy,
        })
    }

    fn lower_type_params(&mut self) -> Result<(), LoadErrorKind> {
        for raw in &self.def.type_params {
            let (name, bound) = match raw.split_once(" extends ") {
                Some((name, bound)) => (name.trim(), Some(bound.trim())),
                None => (raw.trim(), None),
            };
            if !self.param_names.insert(name.to_string()) {
                return Err(LoadErrorKind::DuplicateDeclaration(name.to_string()));
            }
            self.type_params.push(TypeParam {
                name: name.to_string(),
                bound: None,
            });
            if let Some(bound) = bound {
                let lowered = self.lower_type(bound, name)?;
                if let Some(param) = self.type_params.last_mut() {
                    param.bound = Some(lowered);
                }
            }
        }
        Ok(())
    }

    fn lower_hole(&self, hole: &HoleDef) -> Result<HoleDecl, LoadErrorKind> {
        Ok(HoleDecl {
            name: hole.name.clone(),
            ty: self.lower_type(&hole.ty, &hole.name)?,
            repeated: hole.repeated,
            array: hole.matches == Some(HoleMatcher::Array),
        })
    }

    fn lower_type(&self, text: &str, owner: &str) -> Result<Type, LoadErrorKind> {
        let parsed = parse_type(text).map_err(|source| LoadErrorKind::Syntax {
            part: format!("type of '{owner}'"),
            source,
        })?;
        let ty = parsed.simplify_names().with_vars(&self.param_names);
        check_unknown_vars(&ty)?;
        Ok(ty)
    }

    /// A type parameter must occur somewhere a match can bind it.
    fn check_type_params_fixable(
        &self,
        befores: &[BeforeTemplate],
        placeholders: &[PlaceholderDecl],
        result: Option<&Type>,
    ) -> Result<(), LoadErrorKind> {
        let mut fixable: BTreeSet<String> = BTreeSet::new();
        for before in befores {
            for hole in before.root.holes() {
                fixable.extend(before.hole(hole).ty.type_vars());
            }
        }
        for placeholder in placeholders {
            fixable.extend(placeholder.returns.type_vars());
            for param in &placeholder.params {
                fixable.extend(param.ty.type_vars());
            }
        }
        if let Some(result) = result {
            fixable.extend(result.type_vars());
        }
        match self
            .type_params
            .iter()
            .find(|param| param.bound.is_none() && !fixable.contains(&param.name))
        {
            Some(param) => Err(LoadErrorKind::UnconstrainedTypeParameter(param.name.clone())),
            None => Ok(()),
        }
    }
}

/// Single capital letters (optionally followed by digits) that were not
/// declared as type parameters.
fn check_unknown_vars(ty: &Type) -> Result<(), LoadErrorKind> {
    match ty {
        Type::Class { name, args } => {
            let mut chars = name.chars();
            let looks_like_var = chars.next().is_some_and(|c| c.is_ascii_uppercase())
                && chars.all(|c| c.is_ascii_digit());
            if looks_like_var && args.is_empty() {
                return Err(LoadErrorKind::UnknownTypeParameter(name.clone()));
            }
            args.iter().try_for_each(check_unknown_vars)
        }
        Type::Array(elem) => check_unknown_vars(elem),
        Type::Wildcard(Some(bound)) => check_unknown_vars(bound),
        _ => Ok(()),
    }
}

struct TemplateScope<'a> {
    part: Part,
    hole_ids: &'a BTreeMap<String, HoleId>,
    holes: &'a [HoleDecl],
    placeholders: &'a BTreeMap<String, (PlaceholderId, usize)>,
    classes: &'a BTreeMap<String, String>,
    type_params: &'a BTreeSet<String>,
    lambda: Vec<String>,
}

impl TemplateScope<'_> {
    fn lower_expr(&mut self, expr: &Expr) -> Result<TemplateNode, LoadErrorKind> {
        Ok(match &expr.kind {
            ExprKind::Literal(literal) => {
                TemplateNode::skeleton(NodeKind::Literal(literal.clone()), Vec::new())
            }
            ExprKind::Name(name) => self.resolve_name(name, false)?,
            ExprKind::Field { receiver, name } => TemplateNode::skeleton(
                NodeKind::FieldAccess(name.clone()),
                vec![self.lower_expr(receiver)?],
            ),
            ExprKind::Call {
                receiver: None,
                name,
                args,
                ..
            } => self.lower_free_call(name, args)?,
            ExprKind::Call {
                receiver: Some(receiver),
                type_args,
                name,
                args,
            } => {
                let mut children = vec![self.lower_expr(receiver)?];
                children.extend(self.lower_args(args)?);
                let type_args = type_args
                    .iter()
                    .map(|ty| {
                        let ty = ty.simplify_names().with_vars(self.type_params);
                        check_unknown_vars(&ty).map(|_| ty)
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                TemplateNode::skeleton(
                    NodeKind::MethodCall {
                        name: name.clone(),
                        has_receiver: true,
                        type_args,
                    },
                    children,
                )
            }
            ExprKind::MethodRef { target, name } => TemplateNode::skeleton(
                NodeKind::MethodRef(name.clone()),
                vec![self.lower_expr(target)?],
            ),
            ExprKind::Lambda { params, body } => {
                let mut children: Vec<TemplateNode> = params
                    .iter()
                    .map(|(param, _)| {
                        TemplateNode::skeleton(NodeKind::Param(param.clone()), Vec::new())
                    })
                    .collect();
                let depth = self.lambda.len();
                self.lambda.extend(params.iter().map(|(param, _)| param.clone()));
                let body = self.lower_expr(body);
                self.lambda.truncate(depth);
                children.push(body?);
                TemplateNode::skeleton(NodeKind::Lambda, children)
            }
            ExprKind::Unary { op, operand } => {
                TemplateNode::skeleton(NodeKind::Unary(*op), vec![self.lower_expr(operand)?])
            }
            ExprKind::Binary { op, lhs, rhs } => TemplateNode::skeleton(
                NodeKind::Binary(*op),
                vec![self.lower_expr(lhs)?, self.lower_expr(rhs)?],
            ),
            ExprKind::Conditional {
                cond,
                then,
                otherwise,
            } => TemplateNode::skeleton(
                NodeKind::Conditional,
                vec![
                    self.lower_expr(cond)?,
                    self.lower_expr(then)?,
                    self.lower_expr(otherwise)?,
                ],
            ),
            ExprKind::Parens(inner) => self.lower_expr(inner)?,
            ExprKind::ArrayInit(elements) => TemplateNode::skeleton(
                NodeKind::ArrayInit,
                elements
                    .iter()
                    .map(|element| self.lower_expr(element))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }

    /// Call arguments; only the last one may be a repeated hole.
    fn lower_args(&mut self, args: &[Expr]) -> Result<Vec<TemplateNode>, LoadErrorKind> {
        let last = args.len().saturating_sub(1);
        args.iter()
            .enumerate()
            .map(|(idx, arg)| match &arg.kind {
                ExprKind::Name(name) => self.resolve_name(name, idx == last),
                _ => self.lower_expr(arg),
            })
            .collect()
    }

    fn lower_free_call(
        &mut self,
        name: &str,
        args: &[Expr],
    ) -> Result<TemplateNode, LoadErrorKind> {
        match name {
            ANY_OF => {
                if self.part == Part::After {
                    return Err(LoadErrorKind::MisplacedDirective {
                        directive: ANY_OF,
                        part: self.part.label(),
                    });
                }
                if args.is_empty() {
                    return Err(LoadErrorKind::Unsupported(
                        "anyOf() needs at least one alternative".to_string(),
                    ));
                }
                Ok(TemplateNode::Alternation(
                    args.iter()
                        .map(|arg| self.lower_expr(arg))
                        .collect::<Result<_, _>>()?,
                ))
            }
            EMIT_COMMENT_BEFORE => {
                if self.part == Part::Before {
                    return Err(LoadErrorKind::MisplacedDirective {
                        directive: EMIT_COMMENT_BEFORE,
                        part: self.part.label(),
                    });
                }
                match args {
                    [Expr {
                        kind: ExprKind::Literal(Literal::Str(message)),
                        ..
                    }, body] => Ok(TemplateNode::Tagged {
                        tag: Tag::CommentBefore(message.clone()),
                        body: Box::new(self.lower_expr(body)?),
                    }),
                    _ => Err(LoadErrorKind::Unsupported(
                        "emitCommentBefore expects a string literal and an expression"
                            .to_string(),
                    )),
                }
            }
            _ => {
                let Some(&(id, arity)) = self.placeholders.get(name) else {
                    return Err(self.unknown(name));
                };
                if args.len() != arity {
                    return Err(LoadErrorKind::PlaceholderArity {
                        name: name.to_string(),
                        expected: arity,
                        found: args.len(),
                    });
                }
                let args = args
                    .iter()
                    .map(|arg| match self.lower_expr(arg)? {
                        node @ (TemplateNode::Hole(_) | TemplateNode::LambdaVar(_)) => Ok(node),
                        _ => Err(LoadErrorKind::PlaceholderArgument {
                            name: name.to_string(),
                        }),
                    })
                    .collect::<Result<_, _>>()?;
                Ok(TemplateNode::Placeholder { id, args })
            }
        }
    }

    fn resolve_name(&self, name: &str, last_arg: bool) -> Result<TemplateNode, LoadErrorKind> {
        if self.lambda.iter().rev().any(|param| param == name) {
            return Ok(TemplateNode::LambdaVar(name.to_string()));
        }
        if let Some(&id) = self.hole_ids.get(name) {
            if self.holes[id.0].repeated && !last_arg {
                return Err(LoadErrorKind::MisplacedRepeatedHole(name.to_string()));
            }
            return Ok(TemplateNode::Hole(id));
        }
        if let Some(qualified) = self.classes.get(name) {
            return Ok(TemplateNode::TypeName {
                name: name.to_string(),
                qualified: qualified.clone(),
            });
        }
        Err(self.unknown(name))
    }

    fn unknown(&self, name: &str) -> LoadErrorKind {
        let candidates = self
            .hole_ids
            .keys()
            .chain(self.placeholders.keys())
            .chain(self.classes.keys())
            .chain(self.lambda.iter());
        let suggestion = candidates
            .map(|candidate| (strsim::jaro_winkler(name, candidate), candidate))
            .filter(|(score, _)| *score > 0.85)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, candidate)| candidate.clone());
        LoadErrorKind::UnknownIdentifier {
            name: name.to_string(),
            suggestion,
        }
    }
}

/// `X` becomes `!X`; comparisons also accept the complementary operator.
fn negate_before(node: &TemplateNode) -> TemplateNode {
    match node {
        TemplateNode::Alternation(alternatives) => {
            TemplateNode::Alternation(alternatives.iter().map(negate_before).collect())
        }
        TemplateNode::Skeleton {
            kind: NodeKind::Binary(op),
            children,
        } => match op.negated() {
            Some(flipped) => TemplateNode::Alternation(vec![
                TemplateNode::not(node.clone()),
                TemplateNode::skeleton(NodeKind::Binary(flipped), children.clone()),
            ]),
            None => TemplateNode::not(node.clone()),
        },
        TemplateNode::Skeleton {
            kind: NodeKind::Unary(UnaryOp::Not),
            children,
        } if children.len() == 1 => TemplateNode::Alternation(vec![
            children[0].clone(),
            TemplateNode::not(node.clone()),
        ]),
        other => TemplateNode::not(other.clone()),
    }
}

fn negate_after(node: &TemplateNode) -> TemplateNode {
    match node {
        TemplateNode::Tagged { tag, body } => TemplateNode::Tagged {
            tag: tag.clone(),
            body: Box::new(negate_after(body)),
        },
        TemplateNode::Skeleton {
            kind: NodeKind::Unary(UnaryOp::Not),
            children,
        } if children.len() == 1 => children[0].clone(),
        TemplateNode::Skeleton {
            kind: NodeKind::Binary(op),
            children,
        } if op.is_comparison() => TemplateNode::skeleton(
            NodeKind::Binary(op.negated().unwrap_or(*op)),
            children.clone(),
        ),
        other => TemplateNode::not(other.clone()),
    }
}
