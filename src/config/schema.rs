//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for senders,
//! receivers and observability. All types derive Serde traits for
//! deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root messaging configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MessagingConfig {
    /// Sender definitions.
    pub senders: Vec<SenderConfig>,

    /// Receiver definitions.
    pub receivers: Vec<ReceiverConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl MessagingConfig {
    /// Find a sender definition by name.
    pub fn sender(&self, name: &str) -> Option<&SenderConfig> {
        self.senders.iter().find(|s| s.name == name)
    }

    /// Find a receiver definition by name.
    pub fn receiver(&self, name: &str) -> Option<&ReceiverConfig> {
        self.receivers.iter().find(|r| r.name == name)
    }
}

/// Producer-backed sender configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SenderConfig {
    /// Sender name used in logs, metrics and error reports.
    pub name: String,

    /// Topic to produce messages to.
    pub topic: String,

    /// Originating system stamped on messages that do not carry one.
    /// Defaults to the transport name.
    #[serde(default)]
    pub originating_system: Option<String>,

    /// Maximum time a send waits for delivery acknowledgment.
    #[serde(default = "default_message_timeout_ms")]
    pub message_timeout_ms: u64,

    /// Timeout for initializing transactions on a dedicated session.
    #[serde(default = "default_transaction_init_timeout_ms")]
    pub transaction_init_timeout_ms: u64,

    /// Timeout for committing or aborting a transaction.
    #[serde(default = "default_commit_timeout_ms")]
    pub commit_timeout_ms: u64,

    /// Timeout for flushing a transactional session before release.
    #[serde(default = "default_flush_timeout_ms")]
    pub flush_timeout_ms: u64,

    /// Timeout for flushing the shared session on close.
    #[serde(default = "default_close_timeout_ms")]
    pub close_timeout_ms: u64,
}

fn default_message_timeout_ms() -> u64 {
    10_000
}

fn default_transaction_init_timeout_ms() -> u64 {
    1_000
}

fn default_commit_timeout_ms() -> u64 {
    10_000
}

fn default_flush_timeout_ms() -> u64 {
    10_000
}

fn default_close_timeout_ms() -> u64 {
    10_000
}

impl SenderConfig {
    /// Create a sender definition with default timeouts.
    pub fn new(name: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            topic: topic.into(),
            originating_system: None,
            message_timeout_ms: default_message_timeout_ms(),
            transaction_init_timeout_ms: default_transaction_init_timeout_ms(),
            commit_timeout_ms: default_commit_timeout_ms(),
            flush_timeout_ms: default_flush_timeout_ms(),
            close_timeout_ms: default_close_timeout_ms(),
        }
    }

    pub fn message_timeout(&self) -> Duration {
        Duration::from_millis(self.message_timeout_ms)
    }

    pub fn transaction_init_timeout(&self) -> Duration {
        Duration::from_millis(self.transaction_init_timeout_ms)
    }

    pub fn commit_timeout(&self) -> Duration {
        Duration::from_millis(self.commit_timeout_ms)
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }
}

/// Receiver configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReceiverConfig {
    /// Receiver name used in logs.
    pub name: String,

    /// Topic to consume from.
    pub topic: String,

    /// Whether received messages support rollback (redelivery).
    #[serde(default)]
    pub transactional: bool,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, human oriented.
    Pretty,
    /// Single line, abbreviated.
    Compact,
    /// Single line, all fields.
    #[default]
    Full,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter directive (e.g. "info", "traced_messaging=debug").
    /// `RUST_LOG` overrides it when set.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Full,
        }
    }
}
