//! Transport session primitives.
//!
//! A broker binding implements [`ProducerFactory`] and [`Producer`]; the
//! generic [`ProducerSender`](crate::transport::ProducerSender) builds the
//! send and transaction protocol on top. Dropping a producer releases its
//! session.

use std::time::Duration;

use futures_util::future::BoxFuture;

use crate::envelope::{HeaderMap, HeaderValue, Payload, SenderMessage, ORIGINATING_SYSTEM_HEADER};
use crate::transport::types::{Delivery, ErrorSink, TransportResult};

/// Transport-native record: payload plus every header as bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub topic: String,
    pub payload: Payload,
    pub headers: Vec<(String, Vec<u8>)>,
}

impl Record {
    /// Convert an outbound message, rendering each header to its wire form.
    pub fn from_message(topic: impl Into<String>, message: SenderMessage) -> Self {
        let (payload, headers) = message.into_parts();
        let mut headers: Vec<(String, Vec<u8>)> = headers
            .into_iter()
            .map(|(key, value)| (key, value.to_wire()))
            .collect();
        headers.sort_by(|a, b| a.0.cmp(&b.0));

        Self {
            topic: topic.into(),
            payload,
            headers,
        }
    }

    pub fn header(&self, key: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    /// Rebuild the header map a receiver exposes.
    pub fn header_map(&self) -> HeaderMap {
        self.headers
            .iter()
            .map(|(key, value)| (key.clone(), HeaderValue::from_wire(value)))
            .collect()
    }
}

/// Turns outbound messages into records for one topic.
#[derive(Debug, Clone)]
pub struct RecordEncoder {
    topic: String,
    originating_system: String,
}

impl RecordEncoder {
    pub fn new(topic: impl Into<String>, originating_system: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            originating_system: originating_system.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Stamp the default originating system when the message has none.
    pub fn encode(&self, mut message: SenderMessage) -> Record {
        if !message.headers().contains_key(ORIGINATING_SYSTEM_HEADER) {
            message.set_originating_system(self.originating_system.as_str());
        }
        Record::from_message(self.topic.as_str(), message)
    }
}

/// Resolves when the broker acknowledges a produced record.
pub type AckFuture = BoxFuture<'static, TransportResult<Delivery>>;

/// What a session will be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// Shared by all non-transactional sends of a sender.
    Shared,
    /// Owned by a single transaction.
    Transactional,
}

/// One transport session.
///
/// Transaction primitives block up to the given timeout. Inside a
/// transaction, `produce` stages the record; its acknowledgment resolves
/// without an offset.
pub trait Producer: Send + Sync + 'static {
    /// Identifier of this session, unique per factory.
    fn session_id(&self) -> u64;

    /// Dispatch a record. Returns once dispatched; the future resolves on
    /// acknowledgment. Dropping the future does not retract the record.
    fn produce(&self, record: Record) -> TransportResult<AckFuture>;

    fn init_transactions(&self, timeout: Duration) -> TransportResult<()>;

    fn begin_transaction(&self) -> TransportResult<()>;

    fn commit_transaction(&self, timeout: Duration) -> TransportResult<()>;

    fn abort_transaction(&self, timeout: Duration) -> TransportResult<()>;

    /// Wait for outstanding records to be acknowledged.
    fn flush(&self, timeout: Duration) -> TransportResult<()>;
}

/// Creates sessions for one broker connection.
pub trait ProducerFactory: Send + Sync + 'static {
    type Producer: Producer;

    /// Short name of the transport, used as the default originating system.
    fn transport_name(&self) -> &str;

    /// Open a new session. Errors raised later by the session outside any
    /// call go to `errors`.
    fn create_producer(&self, kind: SessionKind, errors: ErrorSink) -> TransportResult<Self::Producer>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_renders_headers() {
        let message = SenderMessage::new("body")
            .header("attempt", 2i64)
            .header("raw", vec![0xffu8]);
        let record = Record::from_message("orders", message);

        assert_eq!(record.topic, "orders");
        assert_eq!(record.header("attempt"), Some(&b"2"[..]));
        assert_eq!(record.header("raw"), Some(&[0xff][..]));
        assert!(record.header("envelope.message_id").is_some());

        let headers = record.header_map();
        assert_eq!(headers.get("attempt"), Some(&HeaderValue::String("2".into())));
        assert_eq!(headers.get("raw"), Some(&HeaderValue::Bytes(vec![0xff])));
    }

    #[test]
    fn encoder_keeps_explicit_originating_system() {
        let encoder = RecordEncoder::new("orders", "memory");

        let record = encoder.encode(SenderMessage::new("a"));
        assert_eq!(record.header(ORIGINATING_SYSTEM_HEADER), Some(&b"memory"[..]));

        let mut message = SenderMessage::new("b");
        message.set_originating_system("billing");
        let record = encoder.encode(message);
        assert_eq!(record.header(ORIGINATING_SYSTEM_HEADER), Some(&b"billing"[..]));
    }
}
