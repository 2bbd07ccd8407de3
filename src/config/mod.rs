//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: config struct definitions and loading
//! - [`defaults`]: serde default functions
//! - [`validation`]: startup validation (all problems reported at once)

mod defaults;
mod types;
pub mod validation;

pub use types::{
    Config, ConfigError, LogConfig, LogFormat, ProtocolKind, ReconnectConfig, ServerConfig,
    ServiceConfig, StorageConfig, TimeoutsConfig, UplinkConfig,
};
pub use validation::{ValidationError, validate};
