use thiserror::Error;

/// Bindings did not cover what the after-template needs. Indicates a rule
/// whose before-templates bind different holes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RewriteError {
    #[error("rule '{rule}': hole '{hole}' is not bound by the matched before-template")]
    UnboundHole { rule: String, hole: String },

    #[error("rule '{rule}': placeholder '{placeholder}' is not bound by the matched before-template")]
    UnboundPlaceholder { rule: String, placeholder: String },

    #[error("rule '{rule}': {message}")]
    Malformed { rule: String, message: String },
}
