use crate::driver::{DriverOptions, Verbosity};
use crate::host::{HostError, Library, LibraryFile, SketchHost};
use crate::rules::{RuleFilter, RulePattern};
use serde::Deserialize;
use std::fmt;

/// Contents of `refit.toml`.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct RefitConfig {
    #[serde(default)]
    pub driver: DriverSection,
    /// Types and signatures added to the reference host's library.
    #[serde(default)]
    pub host: LibraryFile,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct DriverSection {
    #[serde(default)]
    pub max_iterations: Option<usize>,
    #[serde(default)]
    pub include: Vec<RulePattern>,
    #[serde(default)]
    pub exclude: Vec<RulePattern>,
    #[serde(default)]
    pub verbosity: Option<Verbosity>,
}

impl RefitConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.driver.max_iterations == Some(0) {
            issues.push(ValidationIssue::InvalidValue {
                field: "driver.max_iterations",
                message: "must be at least 1".to_string(),
            });
        }
        for pattern in self.driver.include.iter().chain(&self.driver.exclude) {
            if pattern.as_str().trim().is_empty() {
                issues.push(ValidationIssue::InvalidValue {
                    field: "driver.include/exclude",
                    message: "empty rule pattern".to_string(),
                });
            }
        }
        for def in &self.host.types {
            if def.name.trim().is_empty() || def.qualified.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    section: "host.types",
                    field: "name/qualified",
                });
            }
        }
        for def in &self.host.signatures {
            if def.owner.trim().is_empty() || def.name.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    section: "host.signatures",
                    field: "owner/name",
                });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    pub fn driver_options(&self) -> DriverOptions {
        let defaults = DriverOptions::default();
        DriverOptions {
            max_iterations: self.driver.max_iterations.unwrap_or(defaults.max_iterations),
            filter: RuleFilter::new(self.driver.include.clone(), self.driver.exclude.clone()),
            verbosity: self.driver.verbosity.unwrap_or(defaults.verbosity),
        }
    }

    /// The built-in library extended by `[host]`.
    pub fn sketch_host(&self) -> Result<SketchHost, HostError> {
        let mut library = Library::builtin()?;
        library.extend(self.host.clone())?;
        Ok(SketchHost::new(library))
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    MissingField {
        section: &'static str,
        field: &'static str,
    },
    InvalidValue {
        field: &'static str,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingField { section, field } => {
                write!(f, "[{section}] entry missing required field '{field}'")
            }
            ValidationIssue::InvalidValue { field, message } => {
                write!(f, "invalid value for '{field}': {message}")
            }
        }
    }
}
