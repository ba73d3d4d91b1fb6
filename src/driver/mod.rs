//! Fixed-point application of a rule registry to one compilation unit.

pub mod emit;
pub mod errors;
pub mod options;
pub mod run;

pub use emit::emit_edits;
pub use errors::DriverError;
pub use options::{CancelToken, DriverOptions, Verbosity};
pub use run::{Driver, UnitOutcome};
