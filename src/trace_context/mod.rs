//! W3C trace context.
//!
//! # Data Flow
//! ```text
//! inbound headers
//!     → traceparent.rs (parse; malformed input restarts the trace)
//!     → tracestate.rs (parsed only when a traceparent was present)
//!     → TracedMessage owns one TraceParent + one TraceState
//!
//! outbound
//!     → TraceParent::value / TraceState::value
//!     → `traceparent` / `tracestate` headers
//! ```
//!
//! # Design Decisions
//! - Inbound parsing fails open: a bad upstream context never blocks a message
//! - Explicit caller mutations fail fast with `TraceContextError`
//! - Cached serialized values are recomputed on every mutation
//! - Ids come from the OS CSPRNG into per-call buffers (no shared scratch state)

pub mod error;
pub mod id;
pub mod traceparent;
pub mod tracestate;

pub use error::{TraceContextError, TraceContextResult};
pub use traceparent::{TraceParent, SAMPLED_FLAG};
pub use tracestate::TraceState;

/// Header carrying the trace parent.
pub const TRACEPARENT_HEADER: &str = "traceparent";

/// Header carrying the vendor trace state.
pub const TRACESTATE_HEADER: &str = "tracestate";
