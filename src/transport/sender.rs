//! Sender capabilities.
//!
//! A binding implements [`Sender`]; if it can group messages atomically it
//! also implements [`TransactionalSender`] and exposes it through
//! [`Sender::as_transactional`]. Callers branch on that capability, never on
//! the concrete type.

use futures_util::future::BoxFuture;

use crate::envelope::SenderMessage;
use crate::transport::cancel::CancellationToken;
use crate::transport::types::{Delivery, TransactionState, TransportError, TransportResult};

/// Sends individual messages.
pub trait Sender: Send + Sync {
    fn name(&self) -> &str;

    /// Send one message and wait for the transport acknowledgment.
    ///
    /// Cancelling `cancel` stops the wait; an already dispatched message is
    /// not retracted.
    fn send<'a>(
        &'a self,
        message: SenderMessage,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, TransportResult<Delivery>>;

    /// Transactional capability, if the binding has one.
    fn as_transactional(&self) -> Option<&dyn TransactionalSender> {
        None
    }

    /// Flush and release transport resources. Idempotent.
    fn close(&self) -> TransportResult<()>;
}

/// Groups messages into atomic transactions.
pub trait TransactionalSender: Send + Sync {
    /// Start a transaction on a dedicated session.
    fn begin_transaction(&self) -> TransportResult<Box<dyn SenderTransaction>>;
}

/// An open group of messages, committed or rolled back together.
///
/// After `commit` or `rollback` every further call fails with
/// [`TransportError::TransactionState`].
pub trait SenderTransaction: Send {
    /// Stage a message. Messages are delivered in the order added.
    fn add(&mut self, message: SenderMessage) -> TransportResult<()>;

    fn commit(&mut self) -> TransportResult<()>;

    fn rollback(&mut self) -> TransportResult<()>;

    fn state(&self) -> TransactionState;
}

/// Send a batch, atomically when the sender supports transactions.
///
/// Returns the number of messages sent. Without the transactional
/// capability, messages are sent one by one and the first failure stops the
/// batch.
pub async fn send_all(
    sender: &dyn Sender,
    messages: Vec<SenderMessage>,
    cancel: &CancellationToken,
) -> TransportResult<usize> {
    let count = messages.len();

    if let Some(transactional) = sender.as_transactional() {
        let mut transaction = transactional.begin_transaction()?;
        for message in messages {
            if let Err(e) = transaction.add(message) {
                rollback_quietly(sender.name(), transaction.as_mut());
                return Err(e);
            }
        }
        if cancel.is_cancelled() {
            rollback_quietly(sender.name(), transaction.as_mut());
            return Err(TransportError::Cancelled);
        }
        transaction.commit()?;
        return Ok(count);
    }

    for message in messages {
        sender.send(message, cancel).await?;
    }
    Ok(count)
}

fn rollback_quietly(sender: &str, transaction: &mut dyn SenderTransaction) {
    if let Err(e) = transaction.rollback() {
        tracing::warn!(sender, error = %e, "Rollback of abandoned batch failed");
    }
}
