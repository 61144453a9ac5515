//! Common transport types.

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::envelope::EnvelopeError;
use crate::observability::metrics;

/// Errors returned by senders, receivers and transactions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// A transport session could not be created.
    #[error("Failed to create transport session: {0}")]
    Session(String),

    /// A bounded transport operation did not finish in time.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    /// The broker rejected or failed an operation.
    #[error("Broker error: {0}")]
    Broker(String),

    /// Operation not permitted in the current transaction state.
    #[error("Cannot {operation}: transaction is {state}")]
    TransactionState {
        operation: &'static str,
        state: TransactionState,
    },

    /// The caller cancelled the wait.
    #[error("Operation cancelled")]
    Cancelled,

    /// The sender or receiver was closed.
    #[error("'{0}' is closed")]
    Closed(String),

    /// Invalid transport settings.
    #[error("Invalid transport configuration: {0}")]
    Config(String),

    /// The message could not be converted for the transport.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Lifecycle of a transaction.
///
/// `Committed` and `RolledBack` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Open,
    Committed,
    RolledBack,
}

impl TransactionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Open)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Committed => "committed",
            Self::RolledBack => "rolled back",
        }
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Acknowledgment of a delivered record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    /// Position assigned by the broker; `None` until a staged record is
    /// committed.
    pub offset: Option<u64>,
}

/// Error raised by a transport outside any send call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundError {
    /// Name of the sender whose session reported the error.
    pub sender: String,
    pub error: TransportError,
}

impl fmt::Display for BackgroundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.sender, self.error)
    }
}

/// Receiving half handed to the owner of a sender.
pub type BackgroundErrors = mpsc::UnboundedReceiver<BackgroundError>;

/// Channel through which sessions report background errors.
///
/// Cheap to clone; every session of a sender holds one.
#[derive(Debug, Clone)]
pub struct ErrorSink {
    sender: String,
    tx: mpsc::UnboundedSender<BackgroundError>,
}

impl ErrorSink {
    /// Create a sink for `sender` and the receiver its owner listens on.
    pub fn channel(sender: impl Into<String>) -> (Self, BackgroundErrors) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                sender: sender.into(),
                tx,
            },
            rx,
        )
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Report an error. Never blocks; dropped if nobody listens.
    pub fn report(&self, error: TransportError) {
        tracing::warn!(sender = %self.sender, error = %error, "Background transport error");
        metrics::record_background_error(&self.sender);

        let event = BackgroundError {
            sender: self.sender.clone(),
            error,
        };
        if self.tx.send(event).is_err() {
            tracing::debug!(sender = %self.sender, "No listener for background errors");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_state_display() {
        assert_eq!(TransactionState::RolledBack.to_string(), "rolled back");
        assert!(TransactionState::Committed.is_terminal());
        assert!(!TransactionState::Open.is_terminal());

        let err = TransportError::TransactionState {
            operation: "commit",
            state: TransactionState::Committed,
        };
        assert_eq!(err.to_string(), "Cannot commit: transaction is committed");
    }

    #[tokio::test]
    async fn error_sink_delivers_to_owner() {
        let (sink, mut errors) = ErrorSink::channel("orders");
        sink.clone().report(TransportError::Broker("partition offline".into()));

        let event = errors.recv().await.unwrap();
        assert_eq!(event.sender, "orders");
        assert_eq!(event.error, TransportError::Broker("partition offline".into()));
    }

    #[test]
    fn error_sink_tolerates_dropped_receiver() {
        let (sink, errors) = ErrorSink::channel("orders");
        drop(errors);
        sink.report(TransportError::Cancelled);
    }
}
