//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check names are present and unique per kind
//! - Validate value ranges (timeouts > 0)
//! - Check the log filter directive parses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: MessagingConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::schema::{MessagingConfig, SenderConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{kind} #{index} has an empty name")]
    EmptyName { kind: &'static str, index: usize },

    #[error("{kind} '{name}' is defined more than once")]
    DuplicateName { kind: &'static str, name: String },

    #[error("{kind} '{name}' has an empty topic")]
    EmptyTopic { kind: &'static str, name: String },

    #[error("sender '{name}' has a zero {field}")]
    ZeroTimeout { name: String, field: &'static str },

    #[error("invalid log level directive '{0}'")]
    LogLevel(String),
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &MessagingConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut seen = HashSet::new();
    for (index, sender) in config.senders.iter().enumerate() {
        check_endpoint("sender", index, &sender.name, &sender.topic, &mut seen, &mut errors);
        check_timeouts(sender, &mut errors);
    }

    let mut seen = HashSet::new();
    for (index, receiver) in config.receivers.iter().enumerate() {
        check_endpoint("receiver", index, &receiver.name, &receiver.topic, &mut seen, &mut errors);
    }

    if EnvFilter::try_new(&config.observability.log_level).is_err() {
        errors.push(ValidationError::LogLevel(config.observability.log_level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_endpoint<'a>(
    kind: &'static str,
    index: usize,
    name: &'a str,
    topic: &str,
    seen: &mut HashSet<&'a str>,
    errors: &mut Vec<ValidationError>,
) {
    if name.trim().is_empty() {
        errors.push(ValidationError::EmptyName { kind, index });
        return;
    }
    if !seen.insert(name) {
        errors.push(ValidationError::DuplicateName {
            kind,
            name: name.to_string(),
        });
    }
    if topic.trim().is_empty() {
        errors.push(ValidationError::EmptyTopic {
            kind,
            name: name.to_string(),
        });
    }
}

fn check_timeouts(sender: &SenderConfig, errors: &mut Vec<ValidationError>) {
    let timeouts = [
        ("message_timeout_ms", sender.message_timeout_ms),
        ("transaction_init_timeout_ms", sender.transaction_init_timeout_ms),
        ("commit_timeout_ms", sender.commit_timeout_ms),
        ("flush_timeout_ms", sender.flush_timeout_ms),
        ("close_timeout_ms", sender.close_timeout_ms),
    ];
    for (field, value) in timeouts {
        if value == 0 {
            errors.push(ValidationError::ZeroTimeout {
                name: sender.name.clone(),
                field,
            });
        }
    }
}
