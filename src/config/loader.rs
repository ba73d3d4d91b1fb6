use crate::config::schema::{RefitConfig, ValidationError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// File name looked up in the working directory when `--config` is absent.
pub const CONFIG_FILE: &str = "refit.toml";

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Io { .. } => self,
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(
                    f,
                    "failed to read refit config from {}: {}",
                    path.display(),
                    source
                )
            }
            ConfigError::Toml { path, source } => match path {
                Some(path) => write!(
                    f,
                    "failed to parse refit config TOML ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "failed to parse refit config TOML: {}", source),
            },
            ConfigError::Validation { path, source } => match path {
                Some(path) => write!(f, "invalid refit config ({}): {}", path.display(), source),
                None => write!(f, "invalid refit config: {}", source),
            },
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
        }
    }
}

pub fn load_from_str(input: &str) -> Result<RefitConfig, ConfigError> {
    let config: RefitConfig = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<RefitConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.with_path(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::Verbosity;
    use crate::rules::RulePattern;

    #[test]
    fn empty_config_uses_defaults() {
        let config = load_from_str("").unwrap();
        let options = config.driver_options();
        assert_eq!(options.max_iterations, 10);
        assert_eq!(options.verbosity, Verbosity::Normal);
        assert!(options.filter.is_empty());
    }

    #[test]
    fn driver_section_is_read() {
        let config = load_from_str(
            r#"
[driver]
max_iterations = 3
include = ["optional"]
exclude = ["optional.OptionalOfNullable"]
verbosity = "verbose"
"#,
        )
        .unwrap();
        let options = config.driver_options();
        assert_eq!(options.max_iterations, 3);
        assert_eq!(options.verbosity, Verbosity::Verbose);
        assert_eq!(options.filter.include, vec![RulePattern::new("optional")]);
        assert!(!options.filter.allows("optional.OptionalOfNullable"));
        assert!(options.filter.allows("optional.OptionalIsEmpty"));
    }

    #[test]
    fn host_section_extends_library() {
        let config = load_from_str(
            r#"
[[host.types]]
name = "Box"
qualified = "com.example.Box"
params = ["T"]

[[host.signatures]]
owner = "Box"
name = "peek"
returns = "T"
"#,
        )
        .unwrap();
        let host = config.sketch_host().unwrap();
        assert_eq!(
            host.library().hierarchy().qualified_name("Box"),
            Some("com.example.Box")
        );
        assert_eq!(host.library().declared("Box", "peek").count(), 1);
    }

    #[test]
    fn zero_iterations_is_rejected() {
        let err = load_from_str("[driver]\nmax_iterations = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
        assert!(err.to_string().contains("max_iterations"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = load_from_str("[driver]\nmax_passes = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Toml { .. }));
    }

    #[test]
    fn io_error_names_the_path() {
        let err = load_from_path("/nonexistent/refit.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/refit.toml"));
    }
}
