//! Unification of before-templates with typed AST subtrees.

pub mod bindings;
pub mod engine;
pub mod unify;

pub use bindings::{Bindings, HoleValue, LambdaParam, PlaceholderCapture};
pub use engine::{match_rule, MatchOutcome, RuleMatch};
pub use unify::TypeEnv;
