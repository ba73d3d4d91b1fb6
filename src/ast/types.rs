use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Half-open byte range `[start, end)` into a unit's source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Range {
    pub start: usize,
    pub end: usize,
}

impl Range {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, other: Range) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn overlaps(&self, other: Range) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Primitive {
    Boolean,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
    Void,
}

impl Primitive {
    pub fn from_keyword(word: &str) -> Option<Self> {
        Some(match word {
            "boolean" => Primitive::Boolean,
            "byte" => Primitive::Byte,
            "short" => Primitive::Short,
            "char" => Primitive::Char,
            "int" => Primitive::Int,
            "long" => Primitive::Long,
            "float" => Primitive::Float,
            "double" => Primitive::Double,
            "void" => Primitive::Void,
            _ => return None,
        })
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Primitive::Boolean => "boolean",
            Primitive::Byte => "byte",
            Primitive::Short => "short",
            Primitive::Char => "char",
            Primitive::Int => "int",
            Primitive::Long => "long",
            Primitive::Float => "float",
            Primitive::Double => "double",
            Primitive::Void => "void",
        }
    }

    /// Name of the wrapper class, `None` for `void`.
    pub fn box_name(self) -> Option<&'static str> {
        Some(match self {
            Primitive::Boolean => "Boolean",
            Primitive::Byte => "Byte",
            Primitive::Short => "Short",
            Primitive::Char => "Character",
            Primitive::Int => "Integer",
            Primitive::Long => "Long",
            Primitive::Float => "Float",
            Primitive::Double => "Double",
            Primitive::Void => return None,
        })
    }

    pub fn from_box_name(name: &str) -> Option<Self> {
        Some(match name {
            "Boolean" => Primitive::Boolean,
            "Byte" => Primitive::Byte,
            "Short" => Primitive::Short,
            "Character" => Primitive::Char,
            "Integer" => Primitive::Int,
            "Long" => Primitive::Long,
            "Float" => Primitive::Float,
            "Double" => Primitive::Double,
            _ => return None,
        })
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, Primitive::Boolean | Primitive::Void)
    }

    /// Result of binary numeric promotion.
    pub fn promote(self, other: Primitive) -> Primitive {
        let rank = |p: Primitive| match p {
            Primitive::Double => 4,
            Primitive::Float => 3,
            Primitive::Long => 2,
            _ => 1,
        };
        match rank(self).max(rank(other)) {
            4 => Primitive::Double,
            3 => Primitive::Float,
            2 => Primitive::Long,
            _ => Primitive::Int,
        }
    }
}

/// A host type. Class names are simple names (`Optional`, `StepVerifier.Step`);
/// the [`crate::ast::TypeHierarchy`] maps them to qualified names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Type {
    Primitive(Primitive),
    Class { name: String, args: Vec<Type> },
    Array(Box<Type>),
    /// A rule or method type parameter awaiting a binding.
    Var(String),
    /// `?` or `? extends T`.
    Wildcard(Option<Box<Type>>),
    /// The type of the `null` literal.
    Null,
}

impl Type {
    pub fn class(name: impl Into<String>) -> Self {
        Type::Class {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn generic(name: impl Into<String>, args: Vec<Type>) -> Self {
        Type::Class {
            name: name.into(),
            args,
        }
    }

    pub fn boolean() -> Self {
        Type::Primitive(Primitive::Boolean)
    }

    pub fn string() -> Self {
        Type::class("String")
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, Type::Primitive(_))
    }

    pub fn is_boolean(&self) -> bool {
        self.unboxed() == Some(Primitive::Boolean)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array(_))
    }

    pub fn class_name(&self) -> Option<&str> {
        match self {
            Type::Class { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Boxes primitives, leaves reference types alone.
    pub fn boxed(&self) -> Type {
        match self {
            Type::Primitive(p) => match p.box_name() {
                Some(name) => Type::class(name),
                None => self.clone(),
            },
            other => other.clone(),
        }
    }

    /// The primitive this type is or unboxes to.
    pub fn unboxed(&self) -> Option<Primitive> {
        match self {
            Type::Primitive(p) => Some(*p),
            Type::Class { name, args } if args.is_empty() => Primitive::from_box_name(name),
            _ => None,
        }
    }

    /// Replaces type variables found in `bindings`.
    pub fn substitute(&self, bindings: &BTreeMap<String, Type>) -> Type {
        match self {
            Type::Var(name) => bindings.get(name).cloned().unwrap_or_else(|| self.clone()),
            Type::Class { name, args } => Type::Class {
                name: name.clone(),
                args: args.iter().map(|arg| arg.substitute(bindings)).collect(),
            },
            Type::Array(elem) => Type::Array(Box::new(elem.substitute(bindings))),
            Type::Wildcard(Some(bound)) => {
                Type::Wildcard(Some(Box::new(bound.substitute(bindings))))
            }
            Type::Primitive(_) | Type::Wildcard(None) | Type::Null => self.clone(),
        }
    }

    pub fn type_vars(&self) -> BTreeSet<String> {
        let mut vars = BTreeSet::new();
        self.collect_vars(&mut vars);
        vars
    }

    fn collect_vars(&self, vars: &mut BTreeSet<String>) {
        match self {
            Type::Var(name) => {
                vars.insert(name.clone());
            }
            Type::Class { args, .. } => args.iter().for_each(|arg| arg.collect_vars(vars)),
            Type::Array(elem) => elem.collect_vars(vars),
            Type::Wildcard(Some(bound)) => bound.collect_vars(vars),
            Type::Primitive(_) | Type::Wildcard(None) | Type::Null => {}
        }
    }

    pub fn is_ground(&self) -> bool {
        self.type_vars().is_empty()
    }

    /// Turns class references named in `params` into [`Type::Var`]s.
    pub fn with_vars(&self, params: &BTreeSet<String>) -> Type {
        match self {
            Type::Class { name, args } if args.is_empty() && params.contains(name) => {
                Type::Var(name.clone())
            }
            Type::Class { name, args } => Type::Class {
                name: name.clone(),
                args: args.iter().map(|arg| arg.with_vars(params)).collect(),
            },
            Type::Array(elem) => Type::Array(Box::new(elem.with_vars(params))),
            Type::Wildcard(Some(bound)) => Type::Wildcard(Some(Box::new(bound.with_vars(params)))),
            other => other.clone(),
        }
    }

    /// Drops package qualifiers: `java.util.Optional` becomes `Optional`,
    /// nested names such as `StepVerifier.Step` are kept.
    pub fn simplify_names(&self) -> Type {
        match self {
            Type::Class { name, args } => Type::Class {
                name: simple_class_name(name).to_string(),
                args: args.iter().map(Type::simplify_names).collect(),
            },
            Type::Array(elem) => Type::Array(Box::new(elem.simplify_names())),
            Type::Wildcard(Some(bound)) => {
                Type::Wildcard(Some(Box::new(bound.simplify_names())))
            }
            other => other.clone(),
        }
    }
}

/// Strips lowercase package segments from a dotted class name.
pub fn simple_class_name(name: &str) -> &str {
    let mut rest = name;
    while let Some((head, tail)) = rest.split_once('.') {
        if head.chars().next().is_some_and(char::is_lowercase) {
            rest = tail;
        } else {
            break;
        }
    }
    rest
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(p) => f.write_str(p.keyword()),
            Type::Class { name, args } => {
                f.write_str(name)?;
                if !args.is_empty() {
                    f.write_str("<")?;
                    for (idx, arg) in args.iter().enumerate() {
                        if idx > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    f.write_str(">")?;
                }
                Ok(())
            }
            Type::Array(elem) => write!(f, "{elem}[]"),
            Type::Var(name) => f.write_str(name),
            Type::Wildcard(None) => f.write_str("?"),
            Type::Wildcard(Some(bound)) => write!(f, "? extends {bound}"),
            Type::Null => f.write_str("null"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boxing_round_trips() {
        let int = Type::Primitive(Primitive::Int);
        assert_eq!(int.boxed(), Type::class("Integer"));
        assert_eq!(Type::class("Integer").unboxed(), Some(Primitive::Int));
        assert!(Type::class("Boolean").is_boolean());
    }

    #[test]
    fn substitution_reaches_nested_arguments() {
        let ty = Type::generic(
            "Stream",
            vec![Type::generic("Optional", vec![Type::Var("T".into())])],
        );
        let mut bindings = BTreeMap::new();
        bindings.insert("T".to_string(), Type::string());
        assert_eq!(ty.substitute(&bindings).to_string(), "Stream<Optional<String>>");
        assert!(ty.substitute(&bindings).is_ground());
    }

    #[test]
    fn package_prefixes_are_dropped() {
        assert_eq!(simple_class_name("java.util.Optional"), "Optional");
        assert_eq!(simple_class_name("StepVerifier.Step"), "StepVerifier.Step");
        assert_eq!(
            simple_class_name("reactor.test.StepVerifier.LastStep"),
            "StepVerifier.LastStep"
        );
    }

    #[test]
    fn range_overlap() {
        assert!(Range::new(0, 5).overlaps(Range::new(4, 6)));
        assert!(!Range::new(0, 5).overlaps(Range::new(5, 6)));
        assert!(Range::new(0, 10).contains(Range::new(2, 3)));
    }
}
