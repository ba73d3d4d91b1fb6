//! `refit.toml`: driver defaults and host library extensions.

pub mod loader;
pub mod schema;

pub use loader::{load_from_path, load_from_str, ConfigError, CONFIG_FILE};
pub use schema::{DriverSection, RefitConfig, ValidationError, ValidationIssue};
