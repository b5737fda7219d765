//! Error handling module for the Markdown compiler.
//!
//! This module defines the error taxonomy shared by the lexing and parsing
//! stages, along with a convenience `Result` alias used throughout the crate.

use thiserror::Error;

/// Main error type for the Markdown compiler.
#[derive(Debug, Error)]
pub enum MarqError {
    /// The input could not be accepted as text. Raised before any
    /// tokenization happens and never downgraded by `silent`.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// No recognizer consumed any of the remaining input. Fatal unless
    /// `silent` is set, in which case scanning stops early.
    #[error("tokenization stalled on input: {context:?}")]
    TokenizationStall { context: String },

    /// The parser met a token kind that is not valid in its position.
    /// Only reachable through a custom tokenizer override.
    #[error("token with {kind:?} kind was not found")]
    UnknownToken { kind: String },

    /// A highlight hook reported a failure. The whole conversion's output
    /// is discarded.
    #[error("highlight hook failed: {message}")]
    Highlight { message: String },
}

/// Convenience type alias for Results in the Markdown compiler.
pub type Result<T> = std::result::Result<T, MarqError>;

impl MarqError {
    /// Creates a stall error carrying a short prefix of the offending input.
    pub fn stall(remaining: &str) -> Self {
        let context: String = remaining.chars().take(10).collect();
        MarqError::TokenizationStall { context }
    }

    /// Creates an unknown-token error for the given token kind name.
    pub fn unknown_token(kind: impl Into<String>) -> Self {
        MarqError::UnknownToken { kind: kind.into() }
    }

    /// Creates an invalid-input error with the given message.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        MarqError::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a highlight-hook error with the given message.
    pub fn highlight(message: impl Into<String>) -> Self {
        MarqError::Highlight {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stall_truncates_context() {
        let err = MarqError::stall("0123456789abcdef");
        match err {
            MarqError::TokenizationStall { context } => assert_eq!(context, "0123456789"),
            _ => panic!("expected stall error"),
        }
    }

    #[test]
    fn test_error_display() {
        let err = MarqError::unknown_token("definition");
        assert!(err.to_string().contains("definition"));

        let err = MarqError::invalid_input("input is not valid UTF-8");
        assert!(err.to_string().contains("UTF-8"));
    }
}
