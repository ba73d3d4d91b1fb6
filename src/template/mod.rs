//! Template IR: the matchable form of a rule's before and after templates.

pub mod errors;
pub mod ir;
pub mod lower;

pub use errors::{LoadErrorKind, TemplateLoadError};
pub use ir::{
    BeforeTemplate, HoleDecl, HoleId, ImportPolicy, Negation, PlaceholderDecl, PlaceholderId,
    PlaceholderParam, Rule, Tag, TemplateNode, TypeParam,
};
pub use lower::{class_table, lower_rule, JAVA_LANG};
