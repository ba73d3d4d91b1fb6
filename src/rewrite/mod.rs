//! Instantiation of after-templates and their splicing into the tree.

pub mod errors;
pub mod fragment;
pub mod graft;
pub mod instantiate;
pub mod printer;

pub use errors::RewriteError;
pub use fragment::{Fragment, Replacement, SymbolRef};
pub use graft::graft;
pub use instantiate::instantiate;
pub use printer::{print, print_in, required_precedence};
