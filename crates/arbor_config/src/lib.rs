//! Parsing and validation of `arbor.toml` engine configuration files.
//!
//! This crate reads the engine configuration and produces a strongly-typed
//! [`EngineConfig`]: default memoization options for attributes, the
//! inherited-attribute invalidation policy, and tracing switches.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE_NAME};
pub use types::*;
