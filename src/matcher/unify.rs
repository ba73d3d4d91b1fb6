use crate::ast::{Type, TypeHierarchy};
use crate::template::TypeParam;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
struct TypeBinding {
    ty: Type,
    /// Fixed by an invariant position; may no longer be widened.
    exact: bool,
}

/// Type-parameter bindings of one match attempt.
///
/// Holes contribute lower bounds (`typeOf(node) <: T`), generic arguments
/// contribute exact constraints. A lower-bound binding is widened to the least
/// upper bound of everything it has seen, within the parameter's bound; an
/// exact binding never changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeEnv {
    bounds: BTreeMap<String, Option<Type>>,
    bindings: BTreeMap<String, TypeBinding>,
}

impl TypeEnv {
    pub fn new(params: &[TypeParam]) -> Self {
        Self {
            bounds: params
                .iter()
                .map(|param| (param.name.clone(), param.bound.clone()))
                .collect(),
            bindings: BTreeMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Type> {
        self.bindings.get(name).map(|binding| &binding.ty)
    }

    pub fn is_param(&self, name: &str) -> bool {
        self.bounds.contains_key(name)
    }

    /// Substitutes every bound parameter in `ty`.
    pub fn resolve(&self, ty: &Type) -> Type {
        let map: BTreeMap<String, Type> = self
            .bindings
            .iter()
            .map(|(name, binding)| (name.clone(), binding.ty.clone()))
            .collect();
        ty.substitute(&map)
    }

    /// Parameters still without a binding, in declaration-name order.
    pub fn unbound(&self) -> Vec<&str> {
        self.bounds
            .keys()
            .filter(|name| !self.bindings.contains_key(*name))
            .map(String::as_str)
            .collect()
    }

    pub fn as_map(&self) -> BTreeMap<String, Type> {
        self.bindings
            .iter()
            .map(|(name, binding)| (name.clone(), binding.ty.clone()))
            .collect()
    }

    /// Constrains `actual <: formal`, binding parameters of `formal`.
    pub fn unify_lower(&mut self, h: &TypeHierarchy, actual: &Type, formal: &Type) -> bool {
        match formal {
            Type::Var(name) if self.is_param(name) => self.bind_lower(h, name, actual),
            Type::Var(name) => matches!(actual, Type::Var(other) if other == name),
            Type::Primitive(p) => actual.unboxed() == Some(*p) && !matches!(actual, Type::Null),
            Type::Null => matches!(actual, Type::Null),
            Type::Wildcard(None) => true,
            Type::Wildcard(Some(bound)) => self.unify_lower(h, actual, bound),
            Type::Array(elem) => match actual {
                Type::Null => true,
                Type::Array(actual_elem) if elem.is_primitive() || actual_elem.is_primitive() => {
                    actual_elem == elem
                }
                Type::Array(actual_elem) => self.unify_lower(h, actual_elem, elem),
                _ => false,
            },
            Type::Class { name, args } => match actual {
                Type::Null => true,
                Type::Primitive(_) => {
                    let boxed = actual.boxed();
                    !boxed.is_primitive() && self.unify_lower(h, &boxed, formal)
                }
                Type::Array(_) => name == "Object",
                Type::Class { .. } => {
                    let Some(Type::Class { args: actual_args, .. }) = h.as_super(actual, name)
                    else {
                        return false;
                    };
                    if args.is_empty() || actual_args.is_empty() {
                        return true;
                    }
                    actual_args.len() == args.len()
                        && actual_args
                            .iter()
                            .zip(args)
                            .all(|(a, f)| self.unify_argument(h, a, f))
                }
                Type::Var(_) | Type::Wildcard(_) => false,
            },
        }
    }

    /// Type-argument position: containment for wildcards, equality otherwise.
    fn unify_argument(&mut self, h: &TypeHierarchy, actual: &Type, formal: &Type) -> bool {
        match formal {
            Type::Wildcard(None) => true,
            Type::Wildcard(Some(bound)) => match actual {
                Type::Wildcard(Some(actual_bound)) => self.unify_lower(h, actual_bound, bound),
                Type::Wildcard(None) => matches!(**bound, Type::Class { ref name, .. } if name == "Object"),
                _ => self.unify_lower(h, actual, bound),
            },
            _ => self.unify_exact(h, actual, formal),
        }
    }

    /// Constrains `actual == formal`.
    pub fn unify_exact(&mut self, h: &TypeHierarchy, actual: &Type, formal: &Type) -> bool {
        match formal {
            Type::Var(name) if self.is_param(name) => self.bind_exact(h, name, actual),
            Type::Class { name, args } => match actual {
                Type::Class {
                    name: actual_name,
                    args: actual_args,
                } if actual_name == name => {
                    if args.is_empty() || actual_args.is_empty() {
                        return true;
                    }
                    actual_args.len() == args.len()
                        && actual_args
                            .iter()
                            .zip(args)
                            .all(|(a, f)| self.unify_exact(h, a, f))
                }
                _ => false,
            },
            Type::Wildcard(Some(bound)) => match actual {
                Type::Wildcard(Some(actual_bound)) => self.unify_exact(h, actual_bound, bound),
                _ => false,
            },
            Type::Array(elem) => match actual {
                Type::Array(actual_elem) => self.unify_exact(h, actual_elem, elem),
                _ => false,
            },
            other => actual == other,
        }
    }

    fn bind_lower(&mut self, h: &TypeHierarchy, name: &str, actual: &Type) -> bool {
        if matches!(actual, Type::Null) {
            return true;
        }
        let actual = actual.boxed();
        match self.bindings.get(name) {
            None => self.bind(h, name, actual, false),
            Some(existing) if h.is_subtype(&actual, &existing.ty) => true,
            Some(existing) if !existing.exact => {
                let widened = h.least_upper_bound(&existing.ty, &actual);
                self.bind(h, name, widened, false)
            }
            Some(_) => false,
        }
    }

    fn bind_exact(&mut self, h: &TypeHierarchy, name: &str, actual: &Type) -> bool {
        if matches!(actual, Type::Null) {
            return false;
        }
        match self.bindings.get(name) {
            None => self.bind(h, name, actual.clone(), true),
            Some(existing) if existing.ty == *actual => {
                if let Some(binding) = self.bindings.get_mut(name) {
                    binding.exact = true;
                }
                true
            }
            Some(existing) if !existing.exact && h.is_subtype(&existing.ty, actual) => {
                self.bind(h, name, actual.clone(), true)
            }
            Some(_) => false,
        }
    }

    fn bind(&mut self, h: &TypeHierarchy, name: &str, ty: Type, exact: bool) -> bool {
        if let Some(Some(bound)) = self.bounds.get(name) {
            let bound = self.resolve(bound);
            if bound.is_ground() && !h.is_subtype(&ty, &bound) {
                return false;
            }
        }
        self.bindings
            .insert(name.to_string(), TypeBinding { ty, exact });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ClassDecl, Primitive};

    fn hierarchy() -> TypeHierarchy {
        let mut h = TypeHierarchy::new();
        let mut list = ClassDecl::new("List", "java.util.List");
        list.params = vec!["E".into()];
        list.supertypes = vec![Type::generic("Collection", vec![Type::Var("E".into())])];
        h.declare(list);
        let mut collection = ClassDecl::new("Collection", "java.util.Collection");
        collection.params = vec!["E".into()];
        h.declare(collection);
        let mut integer = ClassDecl::new("Integer", "java.lang.Integer");
        integer.supertypes = vec![Type::class("Number")];
        h.declare(integer);
        let mut runtime = ClassDecl::new("RuntimeException", "java.lang.RuntimeException");
        runtime.supertypes = vec![Type::class("Throwable")];
        h.declare(runtime);
        h
    }

    fn params(names: &[&str]) -> Vec<TypeParam> {
        names
            .iter()
            .map(|name| TypeParam {
                name: name.to_string(),
                bound: None,
            })
            .collect()
    }

    #[test]
    fn binds_through_supertype() {
        let h = hierarchy();
        let mut env = TypeEnv::new(&params(&["T"]));
        let actual = Type::generic("List", vec![Type::string()]);
        let formal = Type::generic("Collection", vec![Type::Var("T".into())]);
        assert!(env.unify_lower(&h, &actual, &formal));
        assert_eq!(env.get("T"), Some(&Type::string()));
    }

    #[test]
    fn primitives_are_boxed_for_type_parameters() {
        let h = hierarchy();
        let mut env = TypeEnv::new(&params(&["T"]));
        assert!(env.unify_lower(&h, &Type::Primitive(Primitive::Int), &Type::Var("T".into())));
        assert_eq!(env.get("T"), Some(&Type::class("Integer")));
    }

    #[test]
    fn lower_binding_widens_but_exact_does_not() {
        let h = hierarchy();
        let t = Type::Var("T".into());
        let mut env = TypeEnv::new(&params(&["T"]));
        assert!(env.unify_lower(&h, &Type::class("Integer"), &t));
        assert!(env.unify_lower(&h, &Type::class("Number"), &t));
        assert_eq!(env.get("T"), Some(&Type::class("Number")));

        let mut env = TypeEnv::new(&params(&["T"]));
        let list_of = |arg: Type| Type::generic("List", vec![arg]);
        assert!(env.unify_lower(&h, &list_of(Type::class("Integer")), &list_of(t.clone())));
        assert!(!env.unify_lower(&h, &list_of(Type::class("Number")), &list_of(t)));
    }

    #[test]
    fn unrelated_lower_bounds_meet_at_their_common_supertype() {
        let mut h = hierarchy();
        let mut long = ClassDecl::new("Long", "java.lang.Long");
        long.supertypes = vec![Type::class("Number")];
        h.declare(long);
        let t = Type::Var("T".into());

        let mut env = TypeEnv::new(&params(&["T"]));
        assert!(env.unify_lower(&h, &Type::string(), &t));
        assert!(env.unify_lower(&h, &Type::class("Integer"), &t));
        assert_eq!(env.get("T"), Some(&Type::class("Object")));

        let mut env = TypeEnv::new(&params(&["T"]));
        assert!(env.unify_lower(&h, &Type::Primitive(Primitive::Int), &t));
        assert!(env.unify_lower(&h, &Type::class("Long"), &t));
        assert_eq!(env.get("T"), Some(&Type::class("Number")));

        let number = Type::class("Number");
        let mut env = TypeEnv::new(&[TypeParam {
            name: "T".into(),
            bound: Some(number.clone()),
        }]);
        assert!(env.unify_lower(&h, &Type::class("Integer"), &t));
        assert!(env.unify_lower(&h, &Type::class("Long"), &t));
        assert!(!env.unify_lower(&h, &Type::string(), &t));
        assert_eq!(env.get("T"), Some(&number));
    }

    #[test]
    fn null_needs_reference_type() {
        let h = hierarchy();
        let mut env = TypeEnv::new(&params(&["T"]));
        assert!(env.unify_lower(&h, &Type::Null, &Type::Var("T".into())));
        assert!(env.get("T").is_none());
        assert!(!env.unify_lower(&h, &Type::Null, &Type::Primitive(Primitive::Int)));
    }

    #[test]
    fn bound_is_enforced() {
        let h = hierarchy();
        let mut env = TypeEnv::new(&[TypeParam {
            name: "E".into(),
            bound: Some(Type::class("Throwable")),
        }]);
        assert!(!env.unify_lower(&h, &Type::string(), &Type::Var("E".into())));
        assert!(env.unify_lower(&h, &Type::class("RuntimeException"), &Type::Var("E".into())));
        assert_eq!(env.unbound(), Vec::<&str>::new());
    }
}
