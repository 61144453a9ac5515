//! Spans carrying message trace context.
//!
//! Every send and transaction runs inside a span tagged with the trace-id of
//! the message, so log lines emitted by transports correlate with the
//! distributed trace.

use tracing::Span;

use crate::envelope::SenderMessage;
use crate::trace_context::{TraceParent, TRACEPARENT_HEADER};

/// Span for a single outbound message.
pub fn send_span(sender: &str, topic: &str, message: &SenderMessage) -> Span {
    let trace_parent = message
        .headers()
        .get(TRACEPARENT_HEADER)
        .map(|value| value.to_string())
        .unwrap_or_default();

    tracing::info_span!(
        "send",
        sender,
        topic,
        message_id = message.message_id().unwrap_or_default(),
        traceparent = %trace_parent,
    )
}

/// Span for a transaction on a dedicated session.
pub fn transaction_span(sender: &str, topic: &str, session: u64) -> Span {
    tracing::info_span!("transaction", sender, topic, session)
}

/// Span for processing a received message.
pub fn receive_span(receiver: &str, trace_parent: &TraceParent) -> Span {
    tracing::info_span!(
        "receive",
        receiver,
        trace_id = %trace_parent.trace_id(),
        parent_id = %trace_parent.parent_id(),
        sampled = trace_parent.sampled(),
    )
}
