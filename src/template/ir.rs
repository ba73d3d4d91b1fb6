use crate::ast::{KindTag, NodeKind, Type};
use crate::syntax::UnaryOp;
use serde::Deserialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HoleId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlaceholderId(pub usize);

/// A typed template variable as seen by one before-template.
#[derive(Debug, Clone, PartialEq)]
pub struct HoleDecl {
    pub name: String,
    pub ty: Type,
    /// Binds the trailing arguments of an argument list.
    pub repeated: bool,
    /// The bound expression must have an array type.
    pub array: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaceholderParam {
    pub name: String,
    pub ty: Type,
    /// The captured expression need not reference this parameter.
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaceholderDecl {
    pub name: String,
    pub returns: Type,
    pub params: Vec<PlaceholderParam>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeParam {
    pub name: String,
    pub bound: Option<Type>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImportPolicy {
    /// Import referenced classes and qualify static members with them.
    #[default]
    ImportTopLevel,
    /// Import static members and reference them unqualified.
    StaticImportAlways,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    /// Emit `// message` on the line before the rewritten statement.
    CommentBefore(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateNode {
    /// Mirrors a host node kind; children are templates themselves.
    Skeleton {
        kind: NodeKind,
        children: Vec<TemplateNode>,
    },
    Hole(HoleId),
    /// Arguments are `Hole`s or `LambdaVar`s forming the capture set.
    Placeholder {
        id: PlaceholderId,
        args: Vec<TemplateNode>,
    },
    /// Reference to a class, e.g. the receiver of `Optional.empty()`.
    TypeName { name: String, qualified: String },
    /// Reference to a parameter of an enclosing template lambda.
    LambdaVar(String),
    /// Ordered alternatives; the first that matches wins.
    Alternation(Vec<TemplateNode>),
    Tagged { tag: Tag, body: Box<TemplateNode> },
}

impl TemplateNode {
    pub fn skeleton(kind: NodeKind, children: Vec<TemplateNode>) -> Self {
        TemplateNode::Skeleton { kind, children }
    }

    pub fn not(body: TemplateNode) -> Self {
        TemplateNode::skeleton(NodeKind::Unary(UnaryOp::Not), vec![body])
    }

    /// Kinds a host node may have at the root of a match, `None` when any
    /// kind can match (a bare hole or placeholder).
    pub fn root_tags(&self) -> Option<BTreeSet<KindTag>> {
        match self {
            TemplateNode::Skeleton { kind, .. } => Some(BTreeSet::from([kind.tag()])),
            TemplateNode::TypeName { .. } | TemplateNode::LambdaVar(_) => {
                Some(BTreeSet::from([KindTag::Name]))
            }
            TemplateNode::Alternation(alternatives) => {
                let mut tags = BTreeSet::new();
                for alternative in alternatives {
                    tags.extend(alternative.root_tags()?);
                }
                Some(tags)
            }
            TemplateNode::Tagged { body, .. } => body.root_tags(),
            TemplateNode::Hole(_) | TemplateNode::Placeholder { .. } => None,
        }
    }

    pub fn holes(&self) -> BTreeSet<HoleId> {
        let mut out = BTreeSet::new();
        self.visit(&mut |node| {
            if let TemplateNode::Hole(id) = node {
                out.insert(*id);
            }
        });
        out
    }

    pub fn placeholders(&self) -> BTreeSet<PlaceholderId> {
        let mut out = BTreeSet::new();
        self.visit(&mut |node| {
            if let TemplateNode::Placeholder { id, .. } = node {
                out.insert(*id);
            }
        });
        out
    }

    pub fn visit(&self, f: &mut dyn FnMut(&TemplateNode)) {
        f(self);
        match self {
            TemplateNode::Skeleton { children, .. } => {
                children.iter().for_each(|child| child.visit(f))
            }
            TemplateNode::Placeholder { args, .. } => args.iter().for_each(|arg| arg.visit(f)),
            TemplateNode::Alternation(alternatives) => {
                alternatives.iter().for_each(|alt| alt.visit(f))
            }
            TemplateNode::Tagged { body, .. } => body.visit(f),
            TemplateNode::Hole(_) | TemplateNode::TypeName { .. } | TemplateNode::LambdaVar(_) => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BeforeTemplate {
    pub root: TemplateNode,
    /// Hole declarations indexed by [`HoleId`], with this template's overrides.
    pub holes: Vec<HoleDecl>,
    pub source: String,
}

impl BeforeTemplate {
    pub fn hole(&self, id: HoleId) -> &HoleDecl {
        &self.holes[id.0]
    }
}

/// The logical complement of a rule, produced by `also_negation`.
#[derive(Debug, Clone, PartialEq)]
pub struct Negation {
    pub befores: Vec<BeforeTemplate>,
    pub after: TemplateNode,
}

/// A lowered rewrite rule. Immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// `catalog.RuleName`.
    pub name: String,
    pub description: Option<String>,
    pub type_params: Vec<TypeParam>,
    /// Declared type of the before and after expressions.
    pub result: Option<Type>,
    pub hole_names: Vec<String>,
    pub placeholders: Vec<PlaceholderDecl>,
    pub befores: Vec<BeforeTemplate>,
    pub after: TemplateNode,
    pub after_source: String,
    pub negation: Option<Negation>,
    pub import_policy: ImportPolicy,
}

impl Rule {
    pub fn catalog(&self) -> &str {
        self.name
            .split_once('.')
            .map(|(catalog, _)| catalog)
            .unwrap_or("")
    }

    pub fn short_name(&self) -> &str {
        self.name
            .split_once('.')
            .map(|(_, name)| name)
            .unwrap_or(&self.name)
    }

    pub fn placeholder(&self, id: PlaceholderId) -> &PlaceholderDecl {
        &self.placeholders[id.0]
    }

    /// Every before-template, negated variants last, tagged with whether
    /// they belong to the negation.
    pub fn all_befores(&self) -> impl Iterator<Item = (&BeforeTemplate, bool)> {
        let negated = self
            .negation
            .iter()
            .flat_map(|negation| negation.befores.iter().map(|before| (before, true)));
        self.befores.iter().map(|before| (before, false)).chain(negated)
    }

    pub fn after_for(&self, negated: bool) -> &TemplateNode {
        match (&self.negation, negated) {
            (Some(negation), true) => &negation.after,
            _ => &self.after,
        }
    }

    /// Union of root kinds over all before-templates; `None` means any kind.
    pub fn root_tags(&self) -> Option<BTreeSet<KindTag>> {
        let mut tags = BTreeSet::new();
        for (before, _) in self.all_befores() {
            tags.extend(before.root.root_tags()?);
        }
        Some(tags)
    }

    pub fn type_param(&self, name: &str) -> Option<&TypeParam> {
        self.type_params.iter().find(|param| param.name == name)
    }
}
