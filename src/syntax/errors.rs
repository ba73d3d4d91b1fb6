use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("unexpected character '{ch}' at byte {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("unterminated {what} starting at byte {offset}")]
    Unterminated { what: &'static str, offset: usize },

    #[error("invalid numeric literal '{text}' at byte {offset}")]
    InvalidNumber { text: String, offset: usize },

    #[error("expected {expected} at byte {offset}, found {found}")]
    Expected {
        expected: String,
        found: String,
        offset: usize,
    },

    #[error("trailing input at byte {offset}: {found}")]
    TrailingInput { found: String, offset: usize },
}

impl SyntaxError {
    /// Byte offset the error points at.
    pub fn offset(&self) -> usize {
        match self {
            SyntaxError::UnexpectedChar { offset, .. }
            | SyntaxError::Unterminated { offset, .. }
            | SyntaxError::InvalidNumber { offset, .. }
            | SyntaxError::Expected { offset, .. }
            | SyntaxError::TrailingInput { offset, .. } => *offset,
        }
    }
}
