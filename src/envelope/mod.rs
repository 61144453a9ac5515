//! Message envelope.
//!
//! # Data Flow
//! ```text
//! transport record
//!     → ReceiverMessage (payload + ReceiverMessageHeaders view)
//!     → TracedMessage::from_receiver_message
//!     → business logic
//!     → TracedMessage::to_sender_message
//!     → SenderMessage → Sender::send / SenderTransaction::add
//! ```
//!
//! # Design Decisions
//! - Header values stay scalar; transports render them to bytes on write
//! - Reserved metadata lives in `envelope.*` headers, not in side fields
//! - A received message is settled at most once

pub mod error;
pub mod headers;
pub mod payload;
pub mod receiver_message;
pub mod sender_message;
pub mod traced;

pub use error::{EnvelopeError, EnvelopeResult};
pub use headers::{HeaderMap, HeaderValue, ReceiverMessageHeaders};
pub use payload::{Encoding, Payload};
pub use receiver_message::{ReceiverMessage, Settlement, SettlementState};
pub use sender_message::{
    SenderMessage, MESSAGE_ID_HEADER, ORIGINATING_SYSTEM_HEADER, PRIORITY_HEADER,
};
pub use traced::TracedMessage;
