//! Envelope error definitions.

use thiserror::Error;

use crate::trace_context::TraceContextError;

/// Errors raised by payload conversion, envelope validation and message
/// settlement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// Text payload is not valid base64 when binary was requested.
    #[error("Payload is not valid base64: {0}")]
    Base64(String),

    /// Payload bytes cannot be decoded with the requested encoding.
    #[error("Payload is not valid {encoding}: {reason}")]
    Decode { encoding: &'static str, reason: String },

    /// Payload text cannot be represented in the requested encoding.
    #[error("Payload cannot be encoded as {encoding}: {reason}")]
    Encode { encoding: &'static str, reason: String },

    /// Required header is absent.
    #[error("Missing required header '{0}'")]
    MissingHeader(&'static str),

    /// Trace context carried by the envelope is invalid.
    #[error("Invalid trace context: {0}")]
    TraceContext(#[from] TraceContextError),

    /// Acknowledge or rollback called on a message that was already settled.
    #[error("Message was already {0}")]
    AlreadySettled(&'static str),

    /// Rollback requested from a transport without transactional semantics.
    #[error("Message does not support rollback: the transport is not transactional")]
    NotTransactional,

    /// Transport failed while settling the message.
    #[error("Failed to settle message: {0}")]
    Settlement(String),
}

/// Result type for envelope operations.
pub type EnvelopeResult<T> = Result<T, EnvelopeError>;
