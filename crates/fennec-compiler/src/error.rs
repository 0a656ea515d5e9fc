//! Compilation errors

use thiserror::Error;

/// Errors from the lexer and parser.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Unexpected token or malformed construct
    #[error("syntax error at {location}: {message}")]
    Syntax {
        /// Error message
        message: String,
        /// Source location as `line:column`
        location: String,
    },

    /// String literal with no closing quote
    #[error("syntax error at {location}: unterminated string")]
    UnterminatedString {
        /// Source location as `line:column`
        location: String,
    },

    /// Identifier longer than the accepted maximum
    #[error("syntax error at {location}: identifier too long")]
    IdentifierTooLong {
        /// Source location as `line:column`
        location: String,
    },

    /// Left-hand side of `=` is not a plain name
    #[error("syntax error at {location}: invalid assignment target")]
    InvalidAssignmentTarget {
        /// Source location as `line:column`
        location: String,
    },

    /// Object-space failure while building the AST (e.g. out of memory)
    #[error("internal error: {0}")]
    Internal(String),
}

impl CompileError {
    /// Create a syntax error at a position
    pub fn syntax(message: impl Into<String>, line: u32, col: u32) -> Self {
        Self::Syntax {
            message: message.into(),
            location: format!("{line}:{col}"),
        }
    }

    /// Create an unterminated-string error
    pub fn unterminated_string(line: u32, col: u32) -> Self {
        Self::UnterminatedString {
            location: format!("{line}:{col}"),
        }
    }

    /// Create an identifier-too-long error
    pub fn identifier_too_long(line: u32, col: u32) -> Self {
        Self::IdentifierTooLong {
            location: format!("{line}:{col}"),
        }
    }

    /// Create an invalid-assignment-target error
    pub fn invalid_assignment_target(line: u32, col: u32) -> Self {
        Self::InvalidAssignmentTarget {
            location: format!("{line}:{col}"),
        }
    }
}

impl From<fennec_core::CoreError> for CompileError {
    fn from(err: fennec_core::CoreError) -> Self {
        CompileError::Internal(err.to_string())
    }
}

/// Result type for compilation
pub type CompileResult<T> = Result<T, CompileError>;
