//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → MessagingConfig (validated, immutable)
//!     → SenderConfig handed to ProducerSender::from_config
//!     → ReceiverConfig handed to the transport binding
//!     → ObservabilityConfig handed to init_logging
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - Every timeout has a default to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Resolving a sender name to a concrete transport is left to the host

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::MessagingConfig;
pub use schema::ObservabilityConfig;
pub use schema::ReceiverConfig;
pub use schema::SenderConfig;
