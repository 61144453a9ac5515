//! In-process reference transport.
//!
//! Implements [`ProducerFactory`](crate::transport::ProducerFactory),
//! [`Producer`](crate::transport::Producer) and
//! [`Receiver`](crate::transport::Receiver) over a topic map held in memory.
//! Faults can be injected through [`FaultPlan`] to exercise failure paths.

pub mod broker;
pub mod producer;
pub mod receiver;

pub use broker::{FaultPlan, MemoryBroker, SessionStats, TRANSPORT_NAME};
pub use producer::MemoryProducer;
pub use receiver::{MemoryMessage, MemoryReceiver};
