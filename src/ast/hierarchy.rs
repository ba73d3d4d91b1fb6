use crate::ast::types::Type;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Single abstract method of a functional interface, in terms of the
/// declaring class's type parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionalSignature {
    pub params: Vec<Type>,
    pub returns: Type,
}

/// A class or interface known to the host.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: String,
    pub qualified: String,
    pub params: Vec<String>,
    /// Direct supertypes, written against `params`.
    pub supertypes: Vec<Type>,
    pub functional: Option<FunctionalSignature>,
}

impl ClassDecl {
    pub fn new(name: impl Into<String>, qualified: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            qualified: qualified.into(),
            params: Vec::new(),
            supertypes: Vec::new(),
            functional: None,
        }
    }

    fn bindings(&self, args: &[Type]) -> BTreeMap<String, Type> {
        self.params
            .iter()
            .cloned()
            .zip(args.iter().cloned())
            .collect()
    }
}

/// Subtype oracle over the classes the host knows about.
///
/// Generic arguments are invariant unless the supertype uses a wildcard.
/// Primitives are related to reference types only through boxing; there is no
/// primitive widening.
#[derive(Debug, Clone, Default)]
pub struct TypeHierarchy {
    classes: BTreeMap<String, ClassDecl>,
}

impl TypeHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a class declaration.
    pub fn declare(&mut self, decl: ClassDecl) {
        self.classes.insert(decl.name.clone(), decl);
    }

    pub fn get(&self, name: &str) -> Option<&ClassDecl> {
        self.classes.get(name)
    }

    pub fn qualified_name(&self, name: &str) -> Option<&str> {
        self.classes.get(name).map(|decl| decl.qualified.as_str())
    }

    pub fn by_qualified(&self, qualified: &str) -> Option<&ClassDecl> {
        self.classes.values().find(|decl| decl.qualified == qualified)
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassDecl> {
        self.classes.values()
    }

    pub fn admits_null(&self, ty: &Type) -> bool {
        !ty.is_primitive()
    }

    /// Views `ty` as an instance of the class `ctor`, e.g.
    /// `as_super(List<String>, "Collection") == Some(Collection<String>)`.
    pub fn as_super(&self, ty: &Type, ctor: &str) -> Option<Type> {
        let Type::Class { .. } = ty else {
            return None;
        };
        let mut queue = VecDeque::from([ty.clone()]);
        let mut seen = BTreeSet::new();
        while let Some(current) = queue.pop_front() {
            let Type::Class { name, args } = &current else {
                continue;
            };
            if name == ctor {
                return Some(current);
            }
            if !seen.insert(name.clone()) {
                continue;
            }
            let Some(decl) = self.classes.get(name) else {
                continue;
            };
            let bindings = decl.bindings(args);
            for supertype in &decl.supertypes {
                let instantiated = if args.is_empty() {
                    raw(supertype)
                } else {
                    supertype.substitute(&bindings)
                };
                queue.push_back(instantiated);
            }
        }
        (ctor == "Object").then(|| Type::class("Object"))
    }

    pub fn is_subtype(&self, sub: &Type, sup: &Type) -> bool {
        if sub == sup {
            return true;
        }
        match (sub, sup) {
            (_, Type::Wildcard(None)) => true,
            (_, Type::Wildcard(Some(bound))) => self.is_subtype(sub, bound),
            (Type::Null, sup) => self.admits_null(sup),
            (Type::Primitive(p), Type::Primitive(q)) => p == q,
            (Type::Primitive(p), _) => p.box_name().is_some() && self.is_subtype(&sub.boxed(), sup),
            (_, Type::Primitive(q)) => sub.unboxed() == Some(*q),
            (_, Type::Class { name, .. }) if name == "Object" => !matches!(sub, Type::Var(_)),
            (Type::Array(a), Type::Array(b)) => {
                if a.is_primitive() || b.is_primitive() {
                    a == b
                } else {
                    self.is_subtype(a, b)
                }
            }
            (Type::Class { .. }, Type::Class { name, args }) => {
                match self.as_super(sub, name) {
                    Some(Type::Class { args: actual, .. }) => {
                        args.is_empty()
                            || actual.is_empty()
                            || (actual.len() == args.len()
                                && actual
                                    .iter()
                                    .zip(args)
                                    .all(|(a, f)| self.contains(a, f)))
                    }
                    _ => false,
                }
            }
            _ => false,
        }
    }

    /// The nearest common supertype of `a` and `b`: `a`'s supertypes are
    /// tried breadth-first, `Object` when none of them admits `b`.
    /// Primitives are boxed first.
    pub fn least_upper_bound(&self, a: &Type, b: &Type) -> Type {
        let (a, b) = (a.boxed(), b.boxed());
        if self.is_subtype(&b, &a) {
            return a;
        }
        if self.is_subtype(&a, &b) {
            return b;
        }
        let mut queue = VecDeque::from([a]);
        let mut seen = BTreeSet::new();
        while let Some(current) = queue.pop_front() {
            let Type::Class { name, args } = &current else {
                continue;
            };
            if !seen.insert(name.clone()) {
                continue;
            }
            if self.is_subtype(&b, &current) {
                return current;
            }
            let Some(decl) = self.classes.get(name) else {
                continue;
            };
            let bindings = decl.bindings(args);
            for supertype in &decl.supertypes {
                queue.push_back(if args.is_empty() {
                    raw(supertype)
                } else {
                    supertype.substitute(&bindings)
                });
            }
        }
        Type::class("Object")
    }

    /// Type-argument containment: `actual` fits the formal argument `formal`.
    pub fn contains(&self, actual: &Type, formal: &Type) -> bool {
        match formal {
            Type::Wildcard(None) => true,
            Type::Wildcard(Some(bound)) => match actual {
                Type::Wildcard(Some(actual_bound)) => self.is_subtype(actual_bound, bound),
                Type::Wildcard(None) => false,
                _ => self.is_subtype(actual, bound),
            },
            _ => actual == formal,
        }
    }

    /// Parameter and return types of the functional interface `ty`, with the
    /// interface's type arguments substituted. Wildcard arguments are replaced
    /// by their bound (or `Object`).
    pub fn functional_signature(&self, ty: &Type) -> Option<FunctionalSignature> {
        let Type::Class { name, args } = ty else {
            return None;
        };
        let decl = self.classes.get(name)?;
        let functional = decl.functional.as_ref()?;
        let args: Vec<Type> = args
            .iter()
            .map(|arg| match arg {
                Type::Wildcard(Some(bound)) => (**bound).clone(),
                Type::Wildcard(None) => Type::class("Object"),
                other => other.clone(),
            })
            .collect();
        let bindings = decl.bindings(&args);
        Some(FunctionalSignature {
            params: functional
                .params
                .iter()
                .map(|param| param.substitute(&bindings))
                .collect(),
            returns: functional.returns.substitute(&bindings),
        })
    }
}

/// Erases generic arguments, used when walking supertypes of a raw type.
fn raw(ty: &Type) -> Type {
    match ty {
        Type::Class { name, .. } => Type::class(name.clone()),
        other => other.clone(),
    }
}
