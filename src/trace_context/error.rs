//! Trace context error definitions.

use thiserror::Error;

/// Errors raised by explicit, caller-driven trace context operations.
///
/// Parsing an inbound `traceparent` never produces one of these; see
/// [`TraceParent::parse`](super::TraceParent::parse).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceContextError {
    /// A required argument was empty.
    #[error("Argument '{0}' must not be empty")]
    EmptyArgument(&'static str),

    /// Explicit parent-id is malformed or all zeros.
    #[error("'{0}' is not a valid parent-id")]
    InvalidParentId(String),

    /// A `traceparent` value failed strict validation.
    #[error("'{value}' is not a valid traceparent: {reason}")]
    InvalidTraceParent { value: String, reason: &'static str },

    /// A `tracestate` value failed validation.
    #[error("Invalid tracestate: {0}")]
    InvalidTraceState(String),

    /// Strict lookup of an absent tracestate key.
    #[error("The key '{0}' was not present in the tracestate")]
    KeyNotFound(String),

    /// Strict insertion of a key that already exists.
    #[error("An entry with the key '{0}' has already been added")]
    DuplicateKey(String),
}

/// Result type for trace context operations.
pub type TraceContextResult<T> = Result<T, TraceContextError>;
