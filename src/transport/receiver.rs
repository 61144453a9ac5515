//! Receiver capability.

use futures_util::future::BoxFuture;

use crate::envelope::{ReceiverMessage, TracedMessage};
use crate::observability::spans;
use crate::transport::cancel::CancellationToken;
use crate::transport::types::TransportResult;

/// Pulls messages from a transport.
pub trait Receiver: Send + Sync {
    fn name(&self) -> &str;

    /// Wait for the next message. Cancelling `cancel` ends the wait with
    /// [`TransportError::Cancelled`](crate::transport::TransportError::Cancelled).
    fn receive<'a>(
        &'a self,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, TransportResult<Box<dyn ReceiverMessage>>>;
}

/// Receive a message and extract its trace context.
///
/// The raw message is returned alongside so the caller can settle it.
pub async fn receive_traced(
    receiver: &dyn Receiver,
    cancel: &CancellationToken,
) -> TransportResult<(Box<dyn ReceiverMessage>, TracedMessage)> {
    let message = receiver.receive(cancel).await?;
    let traced = TracedMessage::from_receiver_message(message.as_ref());

    spans::receive_span(receiver.name(), traced.trace_parent()).in_scope(|| {
        tracing::debug!(
            transactional = message.is_transactional(),
            headers = traced.headers().len(),
            "Received message"
        );
    });

    Ok((message, traced))
}
