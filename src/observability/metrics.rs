//! Messaging metrics.
//!
//! # Metrics
//! - `messaging_messages_sent_total` (counter): sends by sender, outcome
//! - `messaging_transactions_total` (counter): finished transactions by sender, outcome
//! - `messaging_background_errors_total` (counter): asynchronous transport errors by sender
//! - `trace_context_restarts_total` (counter): malformed inbound traceparents replaced
//!
//! No exporter is installed here; the host application picks a recorder.

use metrics::counter;

/// Record the result of a non-transactional send.
pub fn record_send(sender: &str, outcome: &'static str) {
    counter!(
        "messaging_messages_sent_total",
        "sender" => sender.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a transaction reaching a terminal state.
pub fn record_transaction(sender: &str, outcome: &'static str) {
    counter!(
        "messaging_transactions_total",
        "sender" => sender.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record an error reported outside any send call.
pub fn record_background_error(sender: &str) {
    counter!("messaging_background_errors_total", "sender" => sender.to_string()).increment(1);
}

/// Record an inbound traceparent that was replaced by a new trace.
pub fn record_trace_restart() {
    counter!("trace_context_restarts_total").increment(1);
}
