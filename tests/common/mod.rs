//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::time::Duration;

use traced_messaging::config::SenderConfig;
use traced_messaging::envelope::{ReceiverMessage, SenderMessage, TracedMessage};
use traced_messaging::transport::memory::{MemoryBroker, MemoryReceiver};
use traced_messaging::transport::producer::Record;
use traced_messaging::transport::{BackgroundErrors, CancellationToken, ProducerSender, Receiver};

/// Sampled context from the W3C examples.
pub const SAMPLED_TRACEPARENT: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";

pub const ZERO_TRACE_ID_TRACEPARENT: &str = "00-00000000000000000000000000000000-00f067aa0ba902b7-01";

pub const TOPIC: &str = "orders";

/// Sender settings with timeouts short enough for tests.
pub fn sender_config(name: &str) -> SenderConfig {
    let mut config = SenderConfig::new(name, TOPIC);
    config.message_timeout_ms = 200;
    config.transaction_init_timeout_ms = 200;
    config.commit_timeout_ms = 200;
    config.flush_timeout_ms = 200;
    config.close_timeout_ms = 200;
    config
}

pub fn start_sender(broker: &MemoryBroker, name: &str) -> (ProducerSender<MemoryBroker>, BackgroundErrors) {
    ProducerSender::new(sender_config(name), broker.clone()).unwrap()
}

/// Publish a record with raw headers, bypassing any sender.
pub fn publish_raw(broker: &MemoryBroker, body: &str, headers: &[(&str, &str)]) {
    let mut message = SenderMessage::new(body);
    for (key, value) in headers {
        message.set_header(*key, *value);
    }
    broker.publish(Record::from_message(TOPIC, message));
}

/// Receive the next message, failing the test after one second.
pub async fn receive(receiver: &MemoryReceiver) -> Box<dyn ReceiverMessage> {
    tokio::time::timeout(Duration::from_secs(1), receiver.receive(&CancellationToken::never()))
        .await
        .expect("timed out waiting for a message")
        .unwrap()
}

pub async fn receive_traced(receiver: &MemoryReceiver) -> TracedMessage {
    let message = receive(receiver).await;
    let traced = TracedMessage::from_receiver_message(message.as_ref());
    message.acknowledge().unwrap();
    traced
}

pub fn bodies(broker: &MemoryBroker) -> Vec<String> {
    broker
        .records(TOPIC)
        .into_iter()
        .map(|r| r.payload.string_value(None).unwrap().into_owned())
        .collect()
}
