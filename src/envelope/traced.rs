//! Messages carrying a W3C trace context.

use std::borrow::Cow;

use crate::envelope::error::{EnvelopeError, EnvelopeResult};
use crate::envelope::headers::{HeaderMap, HeaderValue, ReceiverMessageHeaders};
use crate::envelope::payload::{Encoding, Payload};
use crate::envelope::receiver_message::ReceiverMessage;
use crate::envelope::sender_message::SenderMessage;
use crate::trace_context::{
    TraceContextError, TraceParent, TraceState, TRACEPARENT_HEADER, TRACESTATE_HEADER,
};

/// Payload, headers and exactly one trace context.
///
/// Created per message and owned by the code handling it. The trace headers
/// are held as parsed values, never in `headers`.
#[derive(Debug, Clone, PartialEq)]
pub struct TracedMessage {
    payload: Payload,
    headers: HeaderMap,
    trace_parent: TraceParent,
    trace_state: TraceState,
}

impl TracedMessage {
    /// New message starting a fresh trace.
    pub fn new(payload: impl Into<Payload>) -> Self {
        Self {
            payload: payload.into(),
            headers: HeaderMap::new(),
            trace_parent: TraceParent::new(),
            trace_state: TraceState::new(),
        }
    }

    /// Extract the trace context of an inbound message.
    ///
    /// A missing or malformed `traceparent` starts a new trace. `tracestate`
    /// is only honoured alongside a `traceparent`.
    pub fn from_receiver_message(message: &dyn ReceiverMessage) -> Self {
        let view = message.headers();
        let mut trace_parent = TraceParent::new();
        let mut trace_state = TraceState::new();

        if let Some(raw_parent) = view.get_string(TRACEPARENT_HEADER) {
            trace_parent.parse(&raw_parent);
            if let Some(raw_state) = view.get_string(TRACESTATE_HEADER) {
                trace_state.parse(&raw_state);
            }
        }

        let headers = view
            .iter()
            .filter(|(key, _)| !is_trace_header(key))
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect();

        Self {
            payload: message.payload().clone(),
            headers,
            trace_parent,
            trace_state,
        }
    }

    /// Copy for a downstream hop: same trace and sampling decision, new
    /// parent-id.
    pub fn child(&self) -> Self {
        let mut child = self.clone();
        child.trace_parent.update_parent();
        child
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn set_payload(&mut self, payload: impl Into<Payload>) {
        self.payload = payload.into();
    }

    /// See [`Payload::string_value`].
    pub fn string_value(&self, encoding: Option<Encoding>) -> EnvelopeResult<Cow<'_, str>> {
        self.payload.string_value(encoding)
    }

    /// See [`Payload::binary_value`].
    pub fn binary_value(&self, encoding: Option<Encoding>) -> EnvelopeResult<Cow<'_, [u8]>> {
        self.payload.binary_value(encoding)
    }

    pub fn headers(&self) -> ReceiverMessageHeaders<'_> {
        ReceiverMessageHeaders::new(&self.headers)
    }

    /// Set a non-trace header. Trace headers are ignored; mutate
    /// [`trace_parent_mut`](Self::trace_parent_mut) or
    /// [`trace_state_mut`](Self::trace_state_mut) instead.
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<HeaderValue>) {
        let key = key.into();
        if is_trace_header(&key) {
            tracing::debug!(header = %key, "Ignoring trace header set as a plain header");
            return;
        }
        self.headers.insert(key, value.into());
    }

    pub fn remove_header(&mut self, key: &str) -> Option<HeaderValue> {
        self.headers.remove(key)
    }

    pub fn trace_parent(&self) -> &TraceParent {
        &self.trace_parent
    }

    pub fn trace_parent_mut(&mut self) -> &mut TraceParent {
        &mut self.trace_parent
    }

    pub fn trace_state(&self) -> &TraceState {
        &self.trace_state
    }

    pub fn trace_state_mut(&mut self) -> &mut TraceState {
        &mut self.trace_state
    }

    /// Check that the trace context would be accepted by a strict reader.
    pub fn validate(&self) -> EnvelopeResult<()> {
        TraceParent::try_parse(self.trace_parent.value())?;
        self.trace_state.validate()?;
        Ok(())
    }

    /// Build the outbound message.
    ///
    /// Base headers are copied first, then `traceparent` is written and
    /// `tracestate` is written when non-empty, so trace headers always win.
    pub fn to_sender_message(&self) -> EnvelopeResult<SenderMessage> {
        self.validate()?;

        let mut message = SenderMessage::with_headers(self.payload.clone(), self.headers.clone());
        message.set_header(TRACEPARENT_HEADER, self.trace_parent.value());
        if self.trace_state.is_empty() {
            message.remove_header(TRACESTATE_HEADER);
        } else {
            message.set_header(TRACESTATE_HEADER, self.trace_state.value());
        }
        Ok(message)
    }

    /// Check the trace headers of an already-built outbound message.
    pub fn validate_sender_message(message: &SenderMessage) -> EnvelopeResult<()> {
        let view = message.header_view();
        let raw_parent = view
            .get_string(TRACEPARENT_HEADER)
            .ok_or(EnvelopeError::MissingHeader(TRACEPARENT_HEADER))?;
        TraceParent::try_parse(&raw_parent)?;

        if let Some(raw_state) = view.get_string(TRACESTATE_HEADER) {
            let mut trace_state = TraceState::new();
            trace_state.parse(&raw_state);
            if trace_state.is_empty() && !raw_state.trim().is_empty() {
                return Err(TraceContextError::InvalidTraceState(raw_state.into_owned()).into());
            }
            trace_state.validate()?;
        }
        Ok(())
    }
}

fn is_trace_header(key: &str) -> bool {
    key == TRACEPARENT_HEADER || key == TRACESTATE_HEADER
}
