use crate::template::ImportPolicy;
use serde::Deserialize;
use std::fmt;

/// One rule catalog file.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct CatalogFile {
    #[serde(default)]
    pub meta: CatalogMeta,
    #[serde(default)]
    pub rules: Vec<RuleDef>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct CatalogMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Fully qualified classes templates may reference by simple name.
    #[serde(default)]
    pub imports: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RuleDef {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// `"T"` or `"E extends Throwable"`.
    #[serde(default)]
    pub type_params: Vec<String>,
    #[serde(default)]
    pub returns: Option<String>,
    #[serde(default)]
    pub holes: Vec<HoleDef>,
    #[serde(default)]
    pub placeholders: Vec<PlaceholderDef>,
    pub before: BeforeDefs,
    pub after: String,
    #[serde(default)]
    pub also_negation: bool,
    #[serde(default)]
    pub import_policy: ImportPolicy,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum BeforeDefs {
    One(BeforeDef),
    Many(Vec<BeforeDef>),
}

impl BeforeDefs {
    pub fn iter(&self) -> impl Iterator<Item = &BeforeDef> {
        let slice: &[BeforeDef] = match self {
            BeforeDefs::One(one) => std::slice::from_ref(one),
            BeforeDefs::Many(many) => many,
        };
        slice.iter()
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum BeforeDef {
    Text(String),
    Detailed {
        template: String,
        /// Hole declarations overriding the rule-level ones for this template.
        #[serde(default)]
        holes: Vec<HoleDef>,
    },
}

impl BeforeDef {
    pub fn template(&self) -> &str {
        match self {
            BeforeDef::Text(text) => text,
            BeforeDef::Detailed { template, .. } => template,
        }
    }

    pub fn holes(&self) -> &[HoleDef] {
        match self {
            BeforeDef::Text(_) => &[],
            BeforeDef::Detailed { holes, .. } => holes,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HoleDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub repeated: bool,
    #[serde(default)]
    pub matches: Option<HoleMatcher>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum HoleMatcher {
    Array,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlaceholderDef {
    pub name: String,
    pub returns: String,
    #[serde(default)]
    pub params: Vec<PlaceholderParamDef>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlaceholderParamDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub optional: bool,
}

impl CatalogFile {
    /// Structural checks that do not need template parsing.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.meta.name.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                rule: None,
                field: "meta.name",
            });
        } else if self.meta.name.contains('.') {
            issues.push(ValidationIssue::InvalidValue {
                rule: None,
                message: format!("catalog name '{}' must not contain '.'", self.meta.name),
            });
        }

        if self.rules.is_empty() {
            issues.push(ValidationIssue::EmptyRuleList);
        }

        for (idx, rule) in self.rules.iter().enumerate() {
            if rule.name.trim().is_empty() {
                issues.push(ValidationIssue::InvalidValue {
                    rule: None,
                    message: format!("rule #{} has an empty name", idx + 1),
                });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
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
    EmptyRuleList,
    MissingField {
        rule: Option<String>,
        field: &'static str,
    },
    InvalidValue {
        rule: Option<String>,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyRuleList => write!(f, "catalog contains no rules"),
            ValidationIssue::MissingField { rule, field } => match rule {
                Some(name) => write!(f, "rule '{name}' missing required field '{field}'"),
                None => write!(f, "catalog missing required field '{field}'"),
            },
            ValidationIssue::InvalidValue { rule, message } => match rule {
                Some(name) => write!(f, "rule '{name}' is invalid: {message}"),
                None => write!(f, "invalid catalog: {message}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn before_accepts_string_or_table() {
        let catalog: CatalogFile = toml_edit::de::from_str(
            r#"
[meta]
name = "optional"

[[rules]]
name = "One"
before = "!optional.isPresent()"
after = "optional.isEmpty()"

[[rules]]
name = "Many"
before = [
  "a",
  { template = "b", holes = [{ name = "b", type = "List<T>" }] },
]
after = "c"
import_policy = "static-import-always"
"#,
        )
        .unwrap();
        assert_eq!(catalog.rules[0].before.iter().count(), 1);
        let many: Vec<_> = catalog.rules[1].before.iter().collect();
        assert_eq!(many.len(), 2);
        assert_eq!(many[1].holes()[0].ty, "List<T>");
        assert_eq!(
            catalog.rules[1].import_policy,
            ImportPolicy::StaticImportAlways
        );
        assert!(catalog.validate().is_ok());
    }

    #[test]
    fn validate_reports_all_issues() {
        let catalog: CatalogFile = toml_edit::de::from_str(
            r#"
[meta]
name = "bad.name"

[[rules]]
name = ""
before = "a"
after = "b"
"#,
        )
        .unwrap();
        let err = catalog.validate().unwrap_err();
        assert_eq!(err.issues.len(), 2);
        assert!(err.to_string().contains("must not contain '.'"));
        assert!(err.to_string().contains("empty name"));
    }
}
