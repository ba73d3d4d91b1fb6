//! Class and member signatures the reference host types code against.

use crate::ast::{ClassDecl, FunctionalSignature, Type, TypeHierarchy};
use crate::host::errors::HostError;
use crate::syntax::parse_type;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

const BUILTIN: &str = include_str!("library.toml");

#[derive(Debug, Deserialize, Default, Clone)]
pub struct LibraryFile {
    #[serde(default)]
    pub types: Vec<TypeDef>,
    #[serde(default)]
    pub signatures: Vec<SignatureDef>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TypeDef {
    pub name: String,
    pub qualified: String,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub supertypes: Vec<String>,
    #[serde(default)]
    pub functional: Option<FunctionalDef>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FunctionalDef {
    #[serde(default)]
    pub params: Vec<String>,
    pub returns: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SignatureDef {
    pub owner: String,
    pub name: String,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    #[serde(default)]
    pub type_params: Vec<String>,
    #[serde(default)]
    pub params: Vec<String>,
    pub returns: String,
    #[serde(default)]
    pub varargs: bool,
    /// A field rather than a method; `returns` is its type.
    #[serde(default)]
    pub field: bool,
}

/// A method or field of a library class, types written against the class's
/// and the method's type parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub owner: String,
    pub name: String,
    pub is_static: bool,
    pub type_params: Vec<String>,
    pub params: Vec<Type>,
    pub returns: Type,
    pub varargs: bool,
    pub field: bool,
}

impl Signature {
    pub fn accepts_arity(&self, count: usize) -> bool {
        if self.varargs {
            count + 1 >= self.params.len()
        } else {
            count == self.params.len()
        }
    }

    /// Declared type of argument `idx`, the element type for the variadic tail.
    pub fn param_for(&self, idx: usize) -> Option<Type> {
        let last = self.params.len().checked_sub(1)?;
        if self.varargs && idx >= last {
            return Some(match &self.params[last] {
                Type::Array(element) => (**element).clone(),
                other => other.clone(),
            });
        }
        self.params.get(idx).cloned()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Library {
    hierarchy: TypeHierarchy,
    members: BTreeMap<String, Vec<Signature>>,
}

impl Library {
    /// The embedded java.lang / java.util / java.time / Reactor subset.
    pub fn builtin() -> Result<Self, HostError> {
        let mut library = Library::default();
        library.extend(toml_edit::de::from_str(BUILTIN)?)?;
        Ok(library)
    }

    pub fn from_toml(input: &str) -> Result<Self, HostError> {
        let mut library = Library::default();
        library.extend(toml_edit::de::from_str(input)?)?;
        Ok(library)
    }

    /// Adds types and signatures; a type with an existing name replaces it.
    pub fn extend(&mut self, file: LibraryFile) -> Result<(), HostError> {
        for def in file.types {
            let params: BTreeSet<String> = def.params.iter().cloned().collect();
            let mut decl = ClassDecl::new(def.name.clone(), def.qualified.clone());
            decl.params = def.params.clone();
            decl.supertypes = def
                .supertypes
                .iter()
                .map(|text| lower_type(&def.name, text, &params))
                .collect::<Result<_, _>>()?;
            decl.functional = def
                .functional
                .as_ref()
                .map(|functional| {
                    Ok::<_, HostError>(FunctionalSignature {
                        params: functional
                            .params
                            .iter()
                            .map(|text| lower_type(&def.name, text, &params))
                            .collect::<Result<_, _>>()?,
                        returns: lower_type(&def.name, &functional.returns, &params)?,
                    })
                })
                .transpose()?;
            self.hierarchy.declare(decl);
        }
        for def in file.signatures {
            let Some(owner) = self.hierarchy.get(&def.owner) else {
                return Err(HostError::UnknownOwner {
                    owner: def.owner,
                    name: def.name,
                });
            };
            let mut params: BTreeSet<String> = owner.params.iter().cloned().collect();
            params.extend(def.type_params.iter().cloned());
            let label = format!("{}.{}", def.owner, def.name);
            let signature = Signature {
                params: def
                    .params
                    .iter()
                    .map(|text| lower_type(&label, text, &params))
                    .collect::<Result<_, _>>()?,
                returns: lower_type(&label, &def.returns, &params)?,
                owner: def.owner,
                name: def.name,
                is_static: def.is_static,
                type_params: def.type_params,
                varargs: def.varargs,
                field: def.field,
            };
            self.members
                .entry(signature.name.clone())
                .or_default()
                .push(signature);
        }
        Ok(())
    }

    pub fn hierarchy(&self) -> &TypeHierarchy {
        &self.hierarchy
    }

    /// Members named `name` declared by `owner` itself.
    pub fn declared(&self, owner: &str, name: &str) -> impl Iterator<Item = &Signature> {
        let owner = owner.to_string();
        self.members
            .get(name)
            .into_iter()
            .flatten()
            .filter(move |signature| signature.owner == owner)
    }

    /// Static members of `owner`, for on-demand static imports.
    pub fn statics<'a>(&'a self, owner: &'a str) -> impl Iterator<Item = &'a Signature> + 'a {
        self.members
            .values()
            .flatten()
            .filter(move |signature| signature.is_static && signature.owner == owner)
    }

    /// Members named `name` visible on a value of type `receiver`, paired with
    /// the receiver viewed as the declaring class.
    pub fn members_of(&self, receiver: &Type, name: &str) -> Vec<(&Signature, Type)> {
        self.members
            .get(name)
            .into_iter()
            .flatten()
            .filter(|signature| !signature.is_static)
            .filter_map(|signature| {
                self.hierarchy
                    .as_super(receiver, &signature.owner)
                    .map(|owner| (signature, owner))
            })
            .collect()
    }

    /// Classes in `package` (no subpackages), for on-demand imports.
    pub fn classes_in(&self, package: &str) -> Vec<&ClassDecl> {
        self.hierarchy
            .classes()
            .filter(|decl| {
                decl.qualified
                    .strip_prefix(package)
                    .and_then(|rest| rest.strip_prefix('.'))
                    .is_some_and(|rest| !rest.contains('.') || rest == decl.name)
            })
            .collect()
    }
}

fn lower_type(owner: &str, text: &str, params: &BTreeSet<String>) -> Result<Type, HostError> {
    parse_type(text)
        .map(|ty| ty.simplify_names().with_vars(params))
        .map_err(|source| HostError::InvalidType {
            owner: owner.to_string(),
            text: text.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_library_loads() {
        let library = Library::builtin().unwrap();
        let h = library.hierarchy();
        assert_eq!(h.qualified_name("Optional"), Some("java.util.Optional"));
        let list = Type::generic("List", vec![Type::string()]);
        let members = library.members_of(&list, "stream");
        assert_eq!(members.len(), 1);
        assert_eq!(
            members[0].1,
            Type::generic("Collection", vec![Type::string()])
        );
    }

    #[test]
    fn varargs_parameters() {
        let library = Library::builtin().unwrap();
        let of = library.declared("List", "of").next().unwrap();
        assert!(of.accepts_arity(0));
        assert!(of.accepts_arity(3));
        assert_eq!(of.param_for(2), Some(Type::Var("E".into())));
    }

    #[test]
    fn unknown_owner_is_rejected() {
        let err = Library::from_toml(
            r#"
[[signatures]]
owner = "Nope"
name = "x"
returns = "int"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, HostError::UnknownOwner { .. }));
    }
}
