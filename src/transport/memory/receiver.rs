//! Memory broker receivers.

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::envelope::{
    EnvelopeError, EnvelopeResult, HeaderMap, Payload, ReceiverMessage, ReceiverMessageHeaders, Settlement,
    SettlementState,
};
use crate::transport::cancel::CancellationToken;
use crate::transport::memory::broker::{MemoryBroker, StoredRecord};
use crate::transport::receiver::Receiver;
use crate::transport::types::{TransportError, TransportResult};

/// Pulls records from one topic of a [`MemoryBroker`].
///
/// A transactional receiver hands out messages that can be rolled back to
/// the head of the topic; otherwise messages are settled on receipt.
#[derive(Debug, Clone)]
pub struct MemoryReceiver {
    broker: MemoryBroker,
    name: String,
    topic: String,
    transactional: bool,
}

impl MemoryReceiver {
    pub(crate) fn new(broker: MemoryBroker, name: String, topic: String, transactional: bool) -> Self {
        Self {
            broker,
            name,
            topic,
            transactional,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next pending message, if any, without waiting.
    pub fn try_receive(&self) -> Option<MemoryMessage> {
        let stored = self.broker.pop(&self.topic)?;
        Some(MemoryMessage::new(self.broker.clone(), stored, self.transactional))
    }

    async fn next_message(&self, cancel: &CancellationToken) -> TransportResult<Box<dyn ReceiverMessage>> {
        loop {
            let arrival = self.broker.arrivals().notified();
            tokio::pin!(arrival);
            // Register before checking so an append in between is not missed.
            arrival.as_mut().enable();

            if let Some(message) = self.try_receive() {
                tracing::trace!(receiver = %self.name, offset = message.offset(), "Delivered record");
                return Ok(Box::new(message));
            }

            tokio::select! {
                _ = &mut arrival => {}
                _ = cancel.cancelled() => return Err(TransportError::Cancelled),
            }
        }
    }
}

impl Receiver for MemoryReceiver {
    fn name(&self) -> &str {
        &self.name
    }

    fn receive<'a>(
        &'a self,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, TransportResult<Box<dyn ReceiverMessage>>> {
        self.next_message(cancel).boxed()
    }
}

/// A record handed out by a [`MemoryReceiver`].
#[derive(Debug)]
pub struct MemoryMessage {
    broker: MemoryBroker,
    stored: StoredRecord,
    headers: HeaderMap,
    transactional: bool,
    settlement: Settlement,
}

impl MemoryMessage {
    fn new(broker: MemoryBroker, stored: StoredRecord, transactional: bool) -> Self {
        let headers = stored.record.header_map();
        Self {
            broker,
            stored,
            headers,
            transactional,
            settlement: Settlement::new(),
        }
    }

    pub fn offset(&self) -> u64 {
        self.stored.offset
    }

    pub fn topic(&self) -> &str {
        &self.stored.record.topic
    }

    pub fn settlement(&self) -> SettlementState {
        self.settlement.state()
    }
}

impl ReceiverMessage for MemoryMessage {
    fn payload(&self) -> &Payload {
        &self.stored.record.payload
    }

    fn headers(&self) -> ReceiverMessageHeaders<'_> {
        ReceiverMessageHeaders::new(&self.headers)
    }

    fn is_transactional(&self) -> bool {
        self.transactional
    }

    fn acknowledge(&self) -> EnvelopeResult<()> {
        self.settlement.settle(SettlementState::Acknowledged)
    }

    fn rollback(&self) -> EnvelopeResult<()> {
        if !self.transactional {
            return Err(EnvelopeError::NotTransactional);
        }
        self.settlement.settle(SettlementState::RolledBack)?;
        self.broker.requeue(self.stored.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::envelope::SenderMessage;
    use crate::transport::cancel::CancellationSource;
    use crate::transport::producer::Record;

    fn publish(broker: &MemoryBroker, body: &str) {
        let message = SenderMessage::new(body).header("tenant", "acme");
        broker.append(vec![Record::from_message("orders", message)]);
    }

    #[tokio::test]
    async fn receive_exposes_payload_and_headers() {
        let broker = MemoryBroker::new();
        let receiver = broker.receiver("inbox", "orders", false);
        publish(&broker, "hello");

        let message = receiver.receive(&CancellationToken::never()).await.unwrap();
        assert_eq!(message.string_value(None).unwrap(), "hello");
        assert_eq!(message.headers().get_str("tenant"), Some("acme"));
        assert!(message.acknowledge().is_ok());
        assert_eq!(message.rollback(), Err(EnvelopeError::NotTransactional));
        assert_eq!(broker.depth("orders"), 0);
    }

    #[tokio::test]
    async fn receive_waits_for_arrival() {
        let broker = MemoryBroker::new();
        let receiver = broker.receiver("inbox", "orders", false);

        let publisher = {
            let broker = broker.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                publish(&broker, "late");
            })
        };

        let message = tokio::time::timeout(Duration::from_secs(1), receiver.receive(&CancellationToken::never()))
            .await
            .expect("message should arrive")
            .unwrap();
        assert_eq!(message.string_value(None).unwrap(), "late");
        publisher.await.unwrap();
    }

    #[tokio::test]
    async fn cancellation_ends_wait() {
        let broker = MemoryBroker::new();
        let receiver = broker.receiver("inbox", "orders", false);
        let source = CancellationSource::new();
        source.cancel();

        let result = receiver.receive(&source.token()).await;
        assert!(matches!(result, Err(TransportError::Cancelled)));
    }

    #[test]
    fn transactional_rollback_redelivers() {
        let broker = MemoryBroker::new();
        let receiver = broker.receiver("inbox", "orders", true);
        publish(&broker, "first");
        publish(&broker, "second");

        let message = receiver.try_receive().unwrap();
        let offset = message.offset();
        message.rollback().unwrap();
        assert!(matches!(message.acknowledge(), Err(EnvelopeError::AlreadySettled(_))));

        let again = receiver.try_receive().unwrap();
        assert_eq!(again.offset(), offset);
        assert_eq!(again.settlement(), SettlementState::Pending);
        again.acknowledge().unwrap();

        assert_eq!(receiver.try_receive().unwrap().string_value(None).unwrap(), "second");
    }
}
