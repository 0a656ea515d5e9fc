//! Runtime error types

use thiserror::Error;

/// Errors raised by the allocator, reader and evaluator.
///
/// None of these are recoverable from inside the evaluator; they propagate
/// to the host, which decides what happens next. The context snapshots the
/// call list into a backtrace when an error is raised, so a REPL can print
/// a trace and keep using the same context.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Operand does not satisfy the operator's expected type
    #[error("type error: {0}")]
    Type(String),

    /// Too few arguments, or a dotted argument list where a proper list is required
    #[error("arity error: {0}")]
    Arity(String),

    /// Reference to an unbound name
    #[error("name error: {0}")]
    Name(String),

    /// Attempt to call a non-callable value
    #[error("cannot call value: {0}")]
    Call(String),

    /// S-expression reader failure
    #[error("reader error: {0}")]
    Reader(String),

    /// Primitive-specific domain failure (reported by the extended library)
    #[error("domain error: {0}")]
    Domain(String),

    /// Allocation after a collection still found no free cell
    #[error("out of memory")]
    OutOfMemory,

    /// The GC root stack capacity was exceeded
    #[error("GC root stack overflow")]
    GcStackOverflow,
}

impl CoreError {
    /// Create a type error
    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::Type(msg.into())
    }

    /// Create an arity error
    pub fn arity_error(msg: impl Into<String>) -> Self {
        Self::Arity(msg.into())
    }

    /// Create a name error
    pub fn name_error(msg: impl Into<String>) -> Self {
        Self::Name(msg.into())
    }

    /// Create a call error
    pub fn call_error(msg: impl Into<String>) -> Self {
        Self::Call(msg.into())
    }

    /// Create a reader error
    pub fn reader_error(msg: impl Into<String>) -> Self {
        Self::Reader(msg.into())
    }

    /// Create a domain error
    pub fn domain_error(msg: impl Into<String>) -> Self {
        Self::Domain(msg.into())
    }
}

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;
