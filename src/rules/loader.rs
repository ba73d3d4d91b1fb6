use crate::rules::schema::{CatalogFile, ValidationError};
use crate::template::{class_table, lower_rule, LoadErrorKind, Rule, TemplateLoadError};
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// A catalog file that could not be read at all.
#[derive(Debug)]
pub enum CatalogError {
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

impl CatalogError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            CatalogError::Io { .. } => self,
            CatalogError::Toml { path: None, source } => CatalogError::Toml {
                path: Some(path),
                source,
            },
            CatalogError::Validation { path: None, source } => CatalogError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::Io { path, source } => {
                write!(
                    f,
                    "failed to read rule catalog from {}: {}",
                    path.display(),
                    source
                )
            }
            CatalogError::Toml { path, source } => match path {
                Some(path) => write!(
                    f,
                    "failed to parse rule catalog TOML ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "failed to parse rule catalog TOML: {}", source),
            },
            CatalogError::Validation { path, source } => match path {
                Some(path) => write!(f, "invalid rule catalog ({}): {}", path.display(), source),
                None => write!(f, "invalid rule catalog: {}", source),
            },
        }
    }
}

impl std::error::Error for CatalogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CatalogError::Io { source, .. } => Some(source),
            CatalogError::Toml { source, .. } => Some(source),
            CatalogError::Validation { source, .. } => Some(source),
        }
    }
}

/// Rules that lowered cleanly plus one error per rule that did not.
#[derive(Debug, Default)]
pub struct CatalogReport {
    pub name: String,
    pub rules: Vec<Rule>,
    pub errors: Vec<TemplateLoadError>,
}

impl CatalogReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

pub fn load_from_str(input: &str) -> Result<CatalogReport, CatalogError> {
    let catalog: CatalogFile = toml_edit::de::from_str(input)
        .map_err(|source| CatalogError::Toml { path: None, source })?;
    catalog
        .validate()
        .map_err(|source| CatalogError::Validation { path: None, source })?;
    Ok(lower_catalog(&catalog))
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<CatalogReport, CatalogError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.with_path(path))
}

/// Lowers every rule; a failing rule is reported and skipped.
pub fn lower_catalog(catalog: &CatalogFile) -> CatalogReport {
    let classes = class_table(&catalog.meta);
    let mut report = CatalogReport {
        name: catalog.meta.name.clone(),
        ..CatalogReport::default()
    };
    let mut seen = BTreeSet::new();
    for def in &catalog.rules {
        if !seen.insert(def.name.as_str()) {
            report.errors.push(TemplateLoadError::new(
                format!("{}.{}", catalog.meta.name, def.name),
                LoadErrorKind::DuplicateRule,
            ));
            continue;
        }
        match lower_rule(def, &catalog.meta, &classes) {
            Ok(rule) => {
                tracing::debug!(rule = %rule.name, befores = rule.befores.len(), "loaded rule");
                report.rules.push(rule);
            }
            Err(error) => {
                tracing::warn!(rule = %error.rule, "{}", error.kind);
                report.errors.push(error);
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_rule_does_not_sink_catalog() {
        let report = load_from_str(
            r#"
[meta]
name = "optional"
imports = ["java.util.Optional"]

[[rules]]
name = "OptionalIsEmpty"
type_params = ["T"]
holes = [{ name = "optional", type = "Optional<T>" }]
before = "!optional.isPresent()"
after = "optional.isEmpty()"

[[rules]]
name = "Broken"
type_params = ["T"]
holes = [{ name = "optional", type = "Optional<T>" }]
before = "optional.isPresent("
after = "optional.isEmpty()"

[[rules]]
name = "OptionalIsEmpty"
type_params = ["T"]
holes = [{ name = "optional", type = "Optional<T>" }]
before = "optional.isEmpty() == false"
after = "optional.isPresent()"
"#,
        )
        .unwrap();
        assert_eq!(report.rules.len(), 1);
        assert_eq!(report.rules[0].name, "optional.OptionalIsEmpty");
        assert_eq!(report.errors.len(), 2);
        assert!(matches!(report.errors[0].kind, LoadErrorKind::Syntax { .. }));
        assert_eq!(report.errors[1].kind, LoadErrorKind::DuplicateRule);
    }

    #[test]
    fn path_is_attached_to_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[meta\nname = 1").unwrap();
        let err = load_from_path(&path).unwrap_err();
        assert!(matches!(err, CatalogError::Toml { path: Some(_), .. }));
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_from_path("/nonexistent/catalog.toml").unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }
}
