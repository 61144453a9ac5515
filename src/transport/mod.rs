//! Send, receive and transaction contract.
//!
//! # Data Flow
//! ```text
//! SenderMessage
//!     → Sender::send                  (shared session, awaits ack)
//!     → TransactionalSender::begin_transaction
//!         → SenderTransaction::add*   (dedicated session, staged in order)
//!         → commit | rollback         (session released exactly once)
//!
//! Receiver::receive → Box<dyn ReceiverMessage> → acknowledge | rollback
//! ```
//!
//! # Design Decisions
//! - Capabilities are traits; callers branch on `Sender::as_transactional`
//! - Errors raised outside a call travel over an explicit channel
//! - Bindings implement session primitives only (`Producer`,
//!   `ProducerFactory`); `ProducerSender` owns the protocol

pub mod cancel;
pub mod memory;
pub mod producer;
pub mod producer_sender;
pub mod receiver;
pub mod sender;
pub mod transaction;
pub mod types;

pub use cancel::{CancellationSource, CancellationToken};
pub use producer::{AckFuture, Producer, ProducerFactory, Record, RecordEncoder, SessionKind};
pub use producer_sender::ProducerSender;
pub use receiver::{receive_traced, Receiver};
pub use sender::{send_all, Sender, SenderTransaction, TransactionalSender};
pub use transaction::ProducerTransaction;
pub use types::{
    BackgroundError, BackgroundErrors, Delivery, ErrorSink, TransactionState, TransportError, TransportResult,
};
