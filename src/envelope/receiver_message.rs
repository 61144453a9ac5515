//! Inbound messages.
//!
//! # Responsibilities
//! - Expose payload and headers of a transport message uniformly
//! - Provide the two terminal operations: acknowledge and rollback
//! - Track settlement so a message is settled at most once

use std::borrow::Cow;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::envelope::error::{EnvelopeError, EnvelopeResult};
use crate::envelope::headers::{HeaderMap, ReceiverMessageHeaders};
use crate::envelope::payload::{Encoding, Payload};
use crate::envelope::sender_message::{SenderMessage, PRIORITY_HEADER};

/// A message received from a transport.
///
/// Implemented by each transport binding.
pub trait ReceiverMessage: Send + Sync {
    /// Payload in the transport's native representation.
    fn payload(&self) -> &Payload;

    /// Read-only view over the transport headers.
    fn headers(&self) -> ReceiverMessageHeaders<'_>;

    /// Whether the transport supports rolling this message back.
    fn is_transactional(&self) -> bool;

    /// Mark the message as successfully processed.
    fn acknowledge(&self) -> EnvelopeResult<()>;

    /// Return the message to the transport for redelivery.
    fn rollback(&self) -> EnvelopeResult<()>;

    /// See [`Payload::string_value`].
    fn string_value(&self, encoding: Option<Encoding>) -> EnvelopeResult<Cow<'_, str>> {
        self.payload().string_value(encoding)
    }

    /// See [`Payload::binary_value`].
    fn binary_value(&self, encoding: Option<Encoding>) -> EnvelopeResult<Cow<'_, [u8]>> {
        self.payload().binary_value(encoding)
    }

    fn priority(&self) -> Option<u8> {
        self.headers()
            .get_i64(PRIORITY_HEADER)
            .and_then(|p| u8::try_from(p).ok())
    }

    /// Equivalent outbound message (payload and headers copied).
    fn to_sender_message(&self) -> SenderMessage {
        let headers: HeaderMap = self
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        SenderMessage::with_headers(self.payload().clone(), headers)
    }
}

/// Settlement state of a received message.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementState {
    Pending = 0,
    Acknowledged = 1,
    RolledBack = 2,
}

impl SettlementState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Acknowledged => "acknowledged",
            Self::RolledBack => "rolled back",
        }
    }
}

impl From<u8> for SettlementState {
    fn from(val: u8) -> Self {
        match val {
            1 => SettlementState::Acknowledged,
            2 => SettlementState::RolledBack,
            _ => SettlementState::Pending,
        }
    }
}

/// Once-only settlement tracker for binding implementations.
#[derive(Debug, Default)]
pub struct Settlement {
    state: AtomicU8,
}

impl Settlement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SettlementState {
        SettlementState::from(self.state.load(Ordering::SeqCst))
    }

    /// Move from `Pending` to `outcome`; fails if already settled.
    pub fn settle(&self, outcome: SettlementState) -> EnvelopeResult<()> {
        match self.state.compare_exchange(
            SettlementState::Pending as u8,
            outcome as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => Ok(()),
            Err(current) => Err(EnvelopeError::AlreadySettled(SettlementState::from(current).label())),
        }
    }

    /// Return to `Pending` after the transport failed to apply a settlement.
    pub fn revert(&self) {
        self.state.store(SettlementState::Pending as u8, Ordering::SeqCst);
    }
}
