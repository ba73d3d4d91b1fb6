//! Per-site findings reported alongside edits.

use crate::ast::Range;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// Several rules matched one site; the first registered rule was used.
    AmbiguousMatch,
    /// A placeholder captured a variable that is not effectively final; the
    /// rewrite was suppressed.
    SuspectMatch,
    /// The pass cap was reached before the unit stopped changing.
    RewriteCycleDetected,
    /// A type needed by a match could not be resolved; the site was skipped.
    TypeResolutionFailure,
}

impl DiagnosticKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticKind::AmbiguousMatch => "ambiguous-match",
            DiagnosticKind::SuspectMatch => "suspect-match",
            DiagnosticKind::RewriteCycleDetected => "rewrite-cycle-detected",
            DiagnosticKind::TypeResolutionFailure => "type-resolution-failure",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub file: PathBuf,
    pub range: Option<Range>,
    pub rule: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        kind: DiagnosticKind,
        file: impl Into<PathBuf>,
        range: Option<Range>,
        message: impl Into<String>,
    ) -> Self {
        let severity = match kind {
            DiagnosticKind::AmbiguousMatch | DiagnosticKind::TypeResolutionFailure => {
                Severity::Info
            }
            DiagnosticKind::SuspectMatch | DiagnosticKind::RewriteCycleDetected => {
                Severity::Warning
            }
        };
        Self {
            kind,
            severity,
            file: file.into(),
            range,
            rule: None,
            message: message.into(),
        }
    }

    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
        };
        write!(f, "{}", self.file.display())?;
        if let Some(range) = self.range {
            write!(f, ":{}", range.start)?;
        }
        write!(f, ": {severity}[{}]", self.kind.as_str())?;
        if let Some(rule) = &self.rule {
            write!(f, " {rule}:")?;
        }
        write!(f, " {}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_follows_kind() {
        let suspect = Diagnostic::new(DiagnosticKind::SuspectMatch, "A.sketch", None, "m");
        assert_eq!(suspect.severity, Severity::Warning);
        let ambiguous = Diagnostic::new(DiagnosticKind::AmbiguousMatch, "A.sketch", None, "m");
        assert_eq!(ambiguous.severity, Severity::Info);
    }

    #[test]
    fn display_names_site_and_rule() {
        let diagnostic = Diagnostic::new(
            DiagnosticKind::SuspectMatch,
            "A.sketch",
            Some(Range::new(12, 20)),
            "captures 'outer'",
        )
        .with_rule("optional.TernaryOperatorOptionalPositiveFiltering");
        assert_eq!(
            diagnostic.to_string(),
            "A.sketch:12: warning[suspect-match] \
             optional.TernaryOperatorOptionalPositiveFiltering: captures 'outer'"
        );
    }
}
