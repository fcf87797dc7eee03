//! Error taxonomy for the resolution protocol.
//!
//! Every failure a session can hit maps to exactly one variant, so callers
//! can match on the outcome instead of string-scraping. Transport internals
//! use `anyhow` and are funneled into [`ResolveError::Rpc`] at the protocol
//! boundary with the lookup context attached.

use thiserror::Error;

/// Protocol-level error for resolution sessions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// A ledger query or trial execution failed at the transport layer.
    #[error("rpc failure during {context}: {message}")]
    Rpc { context: String, message: String },

    /// An expected field was absent on a ledger object or sub-entry.
    #[error("missing field `{field}` ({context})")]
    MissingField { field: String, context: String },

    /// A ledger value had a shape the descriptor cannot accept.
    #[error("type mismatch: expected {expected}, got {actual} ({context})")]
    TypeMismatch {
        expected: String,
        actual: String,
        context: String,
    },

    /// A wire buffer was truncated, length-inconsistent, or otherwise
    /// undecodable. Never produced for an empty discovered-data buffer.
    #[error("malformed encoding: {0}")]
    MalformedEncoding(String),

    /// The per-session round counter hit the configured ceiling before the
    /// trial pass reported a resolved instruction group.
    #[error("iteration budget of {budget} rounds exhausted")]
    IterationBudgetExceeded { budget: u32 },

    /// The trial pass itself reported an explicit error outcome.
    #[error("contract error: {0}")]
    Contract(String),

    /// Caller-supplied configuration or reference was out of bounds.
    #[error("validation error: {0}")]
    Validation(String),
}

impl ResolveError {
    /// Wrap a transport failure with the operation it interrupted.
    pub fn rpc(context: impl Into<String>, err: impl std::fmt::Display) -> Self {
        ResolveError::Rpc {
            context: context.into(),
            message: err.to_string(),
        }
    }

    pub fn missing_field(field: impl Into<String>, context: impl Into<String>) -> Self {
        ResolveError::MissingField {
            field: field.into(),
            context: context.into(),
        }
    }

    pub fn type_mismatch(
        expected: impl Into<String>,
        actual: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        ResolveError::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
            context: context.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ResolveError>;
