//! Rule catalogs: TOML schema, loading, the registry and rule selection.

pub mod builtin;
pub mod filter;
pub mod loader;
pub mod registry;
pub mod schema;

pub use builtin::load_builtin;
pub use filter::{RuleFilter, RulePattern};
pub use loader::{load_from_path, load_from_str, lower_catalog, CatalogError, CatalogReport};
pub use registry::RuleRegistry;
pub use schema::{CatalogFile, CatalogMeta, RuleDef, ValidationError, ValidationIssue};
