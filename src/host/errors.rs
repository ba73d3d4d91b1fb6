use crate::syntax::SyntaxError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HostError {
    #[error("syntax error in {}: {source}", path.display())]
    Syntax {
        path: PathBuf,
        #[source]
        source: SyntaxError,
    },

    #[error("failed to parse host library TOML: {0}")]
    Toml(#[from] toml_edit::de::Error),

    #[error("invalid type '{text}' in host library entry '{owner}': {source}")]
    InvalidType {
        owner: String,
        text: String,
        #[source]
        source: SyntaxError,
    },

    #[error("signature '{owner}.{name}' refers to an undeclared type")]
    UnknownOwner { owner: String, name: String },
}
