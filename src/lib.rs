//! Transport-agnostic messaging envelope with W3C trace context.

pub mod config;
pub mod envelope;
pub mod observability;
pub mod trace_context;
pub mod transport;

pub use config::MessagingConfig;
pub use envelope::{ReceiverMessage, SenderMessage, TracedMessage};
pub use trace_context::{TraceParent, TraceState};
pub use transport::{ProducerSender, Receiver, Sender, SenderTransaction, TransactionalSender};
