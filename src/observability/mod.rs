//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters)
//!     → spans.rs (spans carrying the message trace-id)
//!
//! Consumers:
//!     → Log output (stdout via tracing-subscriber)
//!     → Whatever metrics recorder the host application installs
//! ```
//!
//! # Design Decisions
//! - The library only emits; the binary installs the subscriber
//! - Trace-id of the message being sent flows into every log line of the send
//! - Metrics are cheap (no-ops until a recorder is installed)

pub mod logging;
pub mod metrics;
pub mod spans;
