//! The `traceparent` identifier triple.
//!
//! Wire format: `{version}-{trace-id}-{parent-id}-{flags}`, e.g.
//! `00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01`.

use std::fmt;
use std::str::FromStr;

use crate::observability::metrics;
use crate::trace_context::error::{TraceContextError, TraceContextResult};
use crate::trace_context::id::{self, PARENT_ID_LEN, TRACE_ID_LEN};

/// Flag bit marking a trace as sampled.
pub const SAMPLED_FLAG: u8 = 0x01;

/// Version written by this crate.
pub const VERSION: &str = "00";

const FORBIDDEN_VERSION: &str = "ff";

/// Length of the fixed-width prefix every version starts with.
const HEADER_LEN: usize = 2 + 1 + TRACE_ID_LEN + 1 + PARENT_ID_LEN + 1 + 2;

/// Trace context identifier for one message.
///
/// Every mutating call recomputes [`value`](Self::value) before returning, so
/// the canonical string is never stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceParent {
    trace_id: String,
    parent_id: String,
    sampled: bool,
    value: String,
}

struct Fields<'a> {
    trace_id: &'a str,
    parent_id: &'a str,
    flags: u8,
}

impl TraceParent {
    /// Create a fresh, unsampled trace context with random ids.
    pub fn new() -> Self {
        let mut trace_parent = Self {
            trace_id: String::new(),
            parent_id: String::new(),
            sampled: false,
            value: String::new(),
        };
        trace_parent.restart_trace();
        trace_parent
    }

    /// Parse an inbound `traceparent` header into this instance.
    ///
    /// Never fails: a malformed or rejected header starts a new trace instead,
    /// so a bad upstream context cannot block message processing.
    pub fn parse(&mut self, raw: &str) {
        match split_header(raw) {
            Ok(fields) => self.apply(fields),
            Err(reason) => {
                tracing::debug!(reason, len = raw.len(), "Malformed traceparent, starting a new trace");
                metrics::record_trace_restart();
                self.restart_trace();
            }
        }
    }

    /// Strictly parse a `traceparent` header.
    pub fn try_parse(raw: &str) -> TraceContextResult<Self> {
        let fields = split_header(raw).map_err(|reason| TraceContextError::InvalidTraceParent {
            value: raw.to_string(),
            reason,
        })?;
        let mut trace_parent = Self {
            trace_id: String::new(),
            parent_id: String::new(),
            sampled: false,
            value: String::new(),
        };
        trace_parent.apply(fields);
        Ok(trace_parent)
    }

    /// Canonical `version-traceid-parentid-flags` string.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn version(&self) -> &'static str {
        VERSION
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn parent_id(&self) -> &str {
        &self.parent_id
    }

    pub fn sampled(&self) -> bool {
        self.sampled
    }

    /// Flags byte as written on the wire.
    pub fn flags(&self) -> u8 {
        if self.sampled {
            SAMPLED_FLAG
        } else {
            0
        }
    }

    /// Start a new span in the same trace.
    pub fn update_parent(&mut self) {
        self.parent_id = id::new_parent_id();
        self.set_value();
    }

    /// Set an explicit parent-id (16 lowercase hex chars, not all zeros).
    pub fn update_parent_to(&mut self, parent_id: &str) -> TraceContextResult<()> {
        if parent_id.is_empty() {
            return Err(TraceContextError::EmptyArgument("parent_id"));
        }
        if !id::is_lower_hex(parent_id, PARENT_ID_LEN) || id::is_all_zero(parent_id) {
            return Err(TraceContextError::InvalidParentId(parent_id.to_string()));
        }

        self.parent_id = parent_id.to_string();
        self.set_value();
        Ok(())
    }

    /// Change the sampling decision.
    ///
    /// A changed decision is a new span, so the parent-id is regenerated.
    /// Setting the current value is a no-op.
    pub fn update_sampled(&mut self, sampled: bool) {
        if sampled == self.sampled {
            return;
        }

        self.parent_id = id::new_parent_id();
        self.sampled = sampled;
        self.set_value();
    }

    /// Discard the current context and start a new, unsampled trace.
    pub fn restart_trace(&mut self) {
        self.trace_id = id::new_trace_id();
        self.parent_id = id::new_parent_id();
        self.sampled = false;
        self.set_value();
    }

    fn apply(&mut self, fields: Fields<'_>) {
        self.trace_id = fields.trace_id.to_string();
        self.parent_id = fields.parent_id.to_string();
        self.sampled = fields.flags & SAMPLED_FLAG == SAMPLED_FLAG;
        self.set_value();
    }

    fn set_value(&mut self) {
        self.value = format!(
            "{}-{}-{}-{:02x}",
            VERSION,
            self.trace_id,
            self.parent_id,
            self.flags()
        );
    }
}

impl Default for TraceParent {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TraceParent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl FromStr for TraceParent {
    type Err = TraceContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_parse(s)
    }
}

/// Match the fixed-width prefix; anything after it is ignored.
fn split_header(raw: &str) -> Result<Fields<'_>, &'static str> {
    let bytes = raw.as_bytes();
    if bytes.len() < HEADER_LEN {
        return Err("header too short");
    }
    if bytes[2] != b'-' || bytes[35] != b'-' || bytes[52] != b'-' {
        return Err("missing field delimiter");
    }

    let version = raw.get(0..2).filter(|v| id::is_lower_hex(v, 2)).ok_or("malformed version")?;
    let trace_id = raw
        .get(3..35)
        .filter(|v| id::is_lower_hex(v, TRACE_ID_LEN))
        .ok_or("malformed trace-id")?;
    let parent_id = raw
        .get(36..52)
        .filter(|v| id::is_lower_hex(v, PARENT_ID_LEN))
        .ok_or("malformed parent-id")?;
    let flags = raw.get(53..55).filter(|v| id::is_lower_hex(v, 2)).ok_or("malformed flags")?;

    if version == FORBIDDEN_VERSION {
        return Err("version ff is forbidden");
    }
    if id::is_all_zero(trace_id) {
        return Err("all-zero trace-id");
    }
    if id::is_all_zero(parent_id) {
        return Err("all-zero parent-id");
    }

    let flags = u8::from_str_radix(flags, 16).map_err(|_| "malformed flags")?;

    Ok(Fields {
        trace_id,
        parent_id,
        flags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLED: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";

    fn assert_valid(trace_parent: &TraceParent) {
        let reparsed = TraceParent::try_parse(trace_parent.value()).unwrap();
        assert_eq!(&reparsed, trace_parent);
        assert!(!id::is_all_zero(trace_parent.trace_id()));
        assert!(!id::is_all_zero(trace_parent.parent_id()));
    }

    #[test]
    fn new_is_valid_and_unsampled() {
        let trace_parent = TraceParent::new();
        assert!(!trace_parent.sampled());
        assert_eq!(trace_parent.version(), "00");
        assert_valid(&trace_parent);
    }

    #[test]
    fn parse_valid_header() {
        let mut trace_parent = TraceParent::new();
        trace_parent.parse(SAMPLED);

        assert_eq!(trace_parent.trace_id(), "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_eq!(trace_parent.parent_id(), "00f067aa0ba902b7");
        assert!(trace_parent.sampled());
        assert_eq!(trace_parent.value(), SAMPLED);
    }

    #[test]
    fn parse_normalizes_flags() {
        let mut trace_parent = TraceParent::new();
        trace_parent.parse("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-0b");
        assert!(trace_parent.sampled());
        assert!(trace_parent.value().ends_with("-01"));

        trace_parent.parse("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-fe");
        assert!(!trace_parent.sampled());
        assert!(trace_parent.value().ends_with("-00"));
    }

    #[test]
    fn parse_future_version_writes_version_00() {
        let mut trace_parent = TraceParent::new();
        trace_parent.parse("cc-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01-what-the-future-will-be");
        assert_eq!(trace_parent.value(), SAMPLED);
    }

    #[test]
    fn parse_ignores_data_after_prefix() {
        let suffixed = [
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01-extra",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01x",
            "cc-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01x",
        ];

        for raw in suffixed {
            let mut trace_parent = TraceParent::new();
            trace_parent.parse(raw);

            assert_eq!(trace_parent.trace_id(), "4bf92f3577b34da6a3ce929d0e0e4736", "{raw}");
            assert_eq!(trace_parent.parent_id(), "00f067aa0ba902b7", "{raw}");
            assert!(trace_parent.sampled(), "{raw}");
            assert_eq!(trace_parent.value(), SAMPLED, "{raw}");
        }
        assert!(TraceParent::try_parse(suffixed[0]).is_ok());
    }

    #[test]
    fn parse_malformed_restarts_trace() {
        let malformed = [
            "",
            "garbage",
            "ff-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
            "00-00000000000000000000000000000000-00f067aa0ba902b7-01",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-0000000000000000-01",
            "00-4BF92F3577B34DA6A3CE929D0E0E4736-00f067aa0ba902b7-01",
            "00_4bf92f3577b34da6a3ce929d0e0e4736_00f067aa0ba902b7_01",
            "00-4bf92f3577b34da6a3ce929d0e0e473é-00f067aa0ba902b7-01",
        ];

        for raw in malformed {
            let mut trace_parent = TraceParent::new();
            trace_parent.update_sampled(true);
            trace_parent.parse(raw);

            assert!(!trace_parent.sampled(), "{raw}");
            assert_ne!(trace_parent.trace_id(), "4bf92f3577b34da6a3ce929d0e0e4736", "{raw}");
            assert_valid(&trace_parent);
        }
    }

    #[test]
    fn try_parse_reports_reason() {
        let err = TraceParent::try_parse("00-00000000000000000000000000000000-00f067aa0ba902b7-01").unwrap_err();
        assert!(matches!(
            err,
            TraceContextError::InvalidTraceParent { reason: "all-zero trace-id", .. }
        ));

        let parsed: TraceParent = SAMPLED.parse().unwrap();
        assert_eq!(parsed.to_string(), SAMPLED);
    }

    #[test]
    fn update_parent_keeps_trace() {
        let mut trace_parent = TraceParent::try_parse(SAMPLED).unwrap();
        trace_parent.update_parent();

        assert_eq!(trace_parent.trace_id(), "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_ne!(trace_parent.parent_id(), "00f067aa0ba902b7");
        assert!(trace_parent.sampled());
        assert_valid(&trace_parent);
    }

    #[test]
    fn update_parent_to_explicit_id() {
        let mut trace_parent = TraceParent::try_parse(SAMPLED).unwrap();
        trace_parent.update_parent_to("b7ad6b7169203331").unwrap();

        assert_eq!(trace_parent.parent_id(), "b7ad6b7169203331");
        assert_eq!(
            trace_parent.value(),
            "00-4bf92f3577b34da6a3ce929d0e0e4736-b7ad6b7169203331-01"
        );
    }

    #[test]
    fn update_parent_to_rejects_bad_ids() {
        let mut trace_parent = TraceParent::try_parse(SAMPLED).unwrap();

        assert_eq!(
            trace_parent.update_parent_to(""),
            Err(TraceContextError::EmptyArgument("parent_id"))
        );
        for bad in ["0000000000000000", "B7AD6B7169203331", "b7ad6b716920333", "b7ad6b71692033310"] {
            assert_eq!(
                trace_parent.update_parent_to(bad),
                Err(TraceContextError::InvalidParentId(bad.to_string()))
            );
        }
        assert_eq!(trace_parent.value(), SAMPLED);
    }

    #[test]
    fn update_sampled_same_value_is_noop() {
        let mut trace_parent = TraceParent::new();
        let original = trace_parent.parent_id().to_string();

        trace_parent.update_sampled(true);
        let after_first = trace_parent.parent_id().to_string();
        assert_ne!(after_first, original);

        trace_parent.update_sampled(true);
        assert_eq!(trace_parent.parent_id(), after_first);
        assert!(trace_parent.value().ends_with("-01"));
    }

    #[test]
    fn update_sampled_toggle_changes_parent_each_time() {
        let mut trace_parent = TraceParent::new();
        let mut seen = vec![trace_parent.parent_id().to_string()];

        for sampled in [true, false, true] {
            trace_parent.update_sampled(sampled);
            assert_eq!(trace_parent.sampled(), sampled);
            assert!(!seen.contains(&trace_parent.parent_id().to_string()));
            seen.push(trace_parent.parent_id().to_string());
        }
    }

    #[test]
    fn restart_trace_generates_new_ids() {
        let mut trace_parent = TraceParent::try_parse(SAMPLED).unwrap();
        trace_parent.restart_trace();

        assert_ne!(trace_parent.trace_id(), "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_ne!(trace_parent.parent_id(), "00f067aa0ba902b7");
        assert!(!trace_parent.sampled());
        assert_valid(&trace_parent);
    }
}
