//! Configuration for a Parley process.
//!
//! Layered loading through figment (defaults, files, `PARLEY_*`
//! environment variables) and validation of the resulting
//! [`ParleyConfig`].

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, ParleyConfig, ServiceConfig,
    SpanEventConfig, TranscriptConfig, TranscriptSink, TypingConfig,
};
pub use validation::validate_config;
