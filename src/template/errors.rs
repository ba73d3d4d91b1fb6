use crate::syntax::SyntaxError;
use thiserror::Error;

/// A rule that could not be lowered. Other rules of the catalog still load.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("rule '{rule}': {kind}")]
pub struct TemplateLoadError {
    pub rule: String,
    pub kind: LoadErrorKind,
}

impl TemplateLoadError {
    pub fn new(rule: impl Into<String>, kind: LoadErrorKind) -> Self {
        Self {
            rule: rule.into(),
            kind,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadErrorKind {
    #[error("syntax error in {part}: {source}")]
    Syntax {
        part: String,
        #[source]
        source: SyntaxError,
    },

    #[error("unknown identifier '{name}'{}", suggestion.as_ref().map(|s| format!(" (did you mean '{s}'?)")).unwrap_or_default())]
    UnknownIdentifier {
        name: String,
        suggestion: Option<String>,
    },

    #[error("duplicate rule name")]
    DuplicateRule,

    #[error("duplicate declaration of '{0}'")]
    DuplicateDeclaration(String),

    #[error("rule has no before-template")]
    NoBefore,

    #[error("after-template references '{0}', which no before-template introduces")]
    AfterReferencesUnbound(String),

    #[error("placeholder '{name}' expects {expected} argument(s), found {found}")]
    PlaceholderArity {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("placeholder '{name}' arguments must be holes or lambda parameters")]
    PlaceholderArgument { name: String },

    #[error("unknown type parameter '{0}'")]
    UnknownTypeParameter(String),

    #[error("type parameter '{0}' cannot be fixed by any hole, placeholder or result type")]
    UnconstrainedTypeParameter(String),

    #[error("repeated hole '{0}' may only appear as the last call argument")]
    MisplacedRepeatedHole(String),

    #[error("'{directive}' is not allowed in {part}")]
    MisplacedDirective {
        directive: &'static str,
        part: &'static str,
    },

    #[error("also_negation requires a boolean rule, found '{0}'")]
    NegationOfNonBoolean(String),

    #[error("unsupported construct in template: {0}")]
    Unsupported(String),
}
