//! Configuration Module
//!
//! Client configuration, environment loading and validation.

mod settings;

pub use settings::{
    ApiKey, ConfigError, DEFAULT_HOST, RuntimeSettings, StreamConfig, WebSocketSettings,
};
