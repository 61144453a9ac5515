//! Outbound messages.

use std::borrow::Cow;

use uuid::Uuid;

use crate::envelope::error::EnvelopeResult;
use crate::envelope::headers::{HeaderMap, HeaderValue, ReceiverMessageHeaders};
use crate::envelope::payload::{Encoding, Payload};

/// Header naming the system that produced the message.
pub const ORIGINATING_SYSTEM_HEADER: &str = "envelope.originating_system";

/// Header carrying the unique message id.
pub const MESSAGE_ID_HEADER: &str = "envelope.message_id";

/// Header carrying the message priority (0-255).
pub const PRIORITY_HEADER: &str = "envelope.priority";

/// A payload plus a mutable header map, ready to hand to a sender.
///
/// Metadata (originating system, message id, priority) travels as reserved
/// headers so every transport preserves it without special handling.
#[derive(Debug, Clone, PartialEq)]
pub struct SenderMessage {
    payload: Payload,
    headers: HeaderMap,
}

impl SenderMessage {
    /// Create a message with a fresh message id.
    pub fn new(payload: impl Into<Payload>) -> Self {
        Self::with_headers(payload, HeaderMap::new())
    }

    /// Create a message from existing headers.
    ///
    /// A message id is assigned only if the headers do not carry one.
    pub fn with_headers(payload: impl Into<Payload>, mut headers: HeaderMap) -> Self {
        headers
            .entry(MESSAGE_ID_HEADER.to_string())
            .or_insert_with(|| HeaderValue::String(Uuid::new_v4().to_string()));
        Self {
            payload: payload.into(),
            headers,
        }
    }

    /// Builder-style header insertion.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<HeaderValue>) -> Self {
        self.set_header(key, value);
        self
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn into_parts(self) -> (Payload, HeaderMap) {
        (self.payload, self.headers)
    }

    /// See [`Payload::string_value`].
    pub fn string_value(&self, encoding: Option<Encoding>) -> EnvelopeResult<Cow<'_, str>> {
        self.payload.string_value(encoding)
    }

    /// See [`Payload::binary_value`].
    pub fn binary_value(&self, encoding: Option<Encoding>) -> EnvelopeResult<Cow<'_, [u8]>> {
        self.payload.binary_value(encoding)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Typed read-only view over the headers.
    pub fn header_view(&self) -> ReceiverMessageHeaders<'_> {
        ReceiverMessageHeaders::new(&self.headers)
    }

    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<HeaderValue>) {
        self.headers.insert(key.into(), value.into());
    }

    pub fn remove_header(&mut self, key: &str) -> Option<HeaderValue> {
        self.headers.remove(key)
    }

    pub fn originating_system(&self) -> Option<&str> {
        self.header_view().get_str(ORIGINATING_SYSTEM_HEADER)
    }

    pub fn set_originating_system(&mut self, system: impl Into<String>) {
        self.set_header(ORIGINATING_SYSTEM_HEADER, system.into());
    }

    pub fn message_id(&self) -> Option<&str> {
        self.header_view().get_str(MESSAGE_ID_HEADER)
    }

    pub fn priority(&self) -> Option<u8> {
        self.header_view()
            .get_i64(PRIORITY_HEADER)
            .and_then(|p| u8::try_from(p).ok())
    }

    pub fn set_priority(&mut self, priority: u8) {
        self.set_header(PRIORITY_HEADER, priority);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_assigns_message_id() {
        let a = SenderMessage::new("a");
        let b = SenderMessage::new("b");
        assert!(a.message_id().is_some());
        assert_ne!(a.message_id(), b.message_id());
    }

    #[test]
    fn with_headers_keeps_existing_id() {
        let mut headers = HeaderMap::new();
        headers.insert(MESSAGE_ID_HEADER.into(), "fixed".into());
        let message = SenderMessage::with_headers("body", headers);
        assert_eq!(message.message_id(), Some("fixed"));
    }

    #[test]
    fn metadata_accessors() {
        let mut message = SenderMessage::new(vec![1u8, 2])
            .header("tenant", "acme")
            .header("attempt", 3i64);
        assert_eq!(message.originating_system(), None);

        message.set_originating_system("billing");
        message.set_priority(7);

        assert_eq!(message.originating_system(), Some("billing"));
        assert_eq!(message.priority(), Some(7));
        assert_eq!(message.header_view().get_i64("attempt"), Some(3));
        assert!(message.payload().is_binary());
        assert_eq!(message.string_value(None).unwrap(), "AQI=");
    }
}
