//! Reference host adapter.
//!
//! Turns `.sketch` compilation units (a small Java-like statement language)
//! into typed [`crate::ast::SyntaxTree`]s, resolving names and method calls
//! against a signature [`Library`]. Real language front ends plug into the
//! engine through [`crate::ast::AstView`] instead.

pub mod errors;
pub mod library;
pub mod sketch;

pub use errors::HostError;
pub use library::{FunctionalDef, Library, LibraryFile, Signature, SignatureDef, TypeDef};
pub use sketch::SketchHost;
