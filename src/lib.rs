//! Refit: template-driven rewriting of typed expression trees
//!
//! Rules are written as typed before/after expression templates and loaded
//! from TOML catalogs. The engine matches before-templates against a typed
//! AST, binds holes and placeholders, and emits verified byte-span edits that
//! replace each match with its instantiated after-template.
//!
//! # Architecture
//!
//! - [`ast`]: the typed tree every host adapter produces and the
//!   [`ast::AstView`] the engine reads it through
//! - [`template`] and [`rules`]: rule definitions, lowering and the registry
//! - [`matcher`]: structural and type unification of templates with trees
//! - [`rewrite`]: instantiation, hygiene, precedence-aware printing
//! - [`driver`]: fixed-point traversal producing [`Edit`]s and
//!   [`Diagnostic`]s
//! - [`host`]: the reference "sketch" host for a small Java-like language
//!
//! Every edit carries the text it expects to replace: an edit whose new text
//! is already in place is skipped and a stale edit is refused.
//!
//! # Example
//!
//! ```no_run
//! use refit::{CancelToken, Driver, DriverOptions, RuleRegistry, SketchHost};
//!
//! let mut registry = RuleRegistry::new();
//! for report in refit::rules::load_builtin()? {
//!     registry.extend(report.rules);
//! }
//! let host = SketchHost::builtin()?;
//! let source = "import java.util.Optional;\n\
//!               Optional<String> o = Optional.empty();\n\
//!               boolean b = !o.isPresent();\n";
//! let tree = host.load("Example.sketch", source)?;
//! let outcome = Driver::new(&registry, DriverOptions::default())
//!     .run(tree, &CancelToken::new())?;
//! println!("{}", outcome.render(source)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod ast;
pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod edit;
pub mod host;
pub mod matcher;
pub mod rewrite;
pub mod rules;
pub mod syntax;
pub mod template;

// Re-exports
pub use ast::{AstView, SyntaxTree, Type, TypeHierarchy};
pub use config::{ConfigError, RefitConfig};
pub use diagnostics::{Diagnostic, DiagnosticKind, Severity};
pub use driver::{CancelToken, Driver, DriverError, DriverOptions, UnitOutcome, Verbosity};
pub use edit::{splice, Edit, EditError, EditResult, EditVerification};
pub use host::{HostError, Library, SketchHost};
pub use rules::{CatalogError, CatalogReport, RuleFilter, RulePattern, RuleRegistry};
pub use template::{Rule, TemplateLoadError};
