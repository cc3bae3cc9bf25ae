//! Runtime error types.

use parley_core::BotError;
use parley_framework::FrameworkError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur while assembling or running a bot process.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// An adapter section could not be read into the adapter's config type.
    #[error("Failed to deserialize adapter config: {0}")]
    AdapterConfigDeserialize(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Built-in middleware rejected its settings.
    #[error(transparent)]
    Framework(#[from] FrameworkError),

    /// An adapter failed to start or a served turn failed.
    #[error(transparent)]
    Bot(#[from] BotError),

    /// Installing a shutdown signal handler failed.
    #[error("Failed to listen for shutdown signal: {0}")]
    Signal(#[from] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
