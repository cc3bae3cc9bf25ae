//! Parley Runtime - configuration, logging and process wiring.
//!
//! This crate provides:
//! - Layered configuration (`ConfigLoader`, [`ParleyConfig`])
//! - Logging setup over `tracing-subscriber` ([`logging`])
//! - [`BotRuntime`], which builds adapters from configuration, installs the
//!   built-in middleware the configuration enables and runs the process
//!   until shutdown
//!
//! ```ignore
//! use parley_runtime::BotRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = BotRuntime::new();
//!     let adapter = runtime.create_adapter::<ConsoleAdapter>()?;
//!
//!     runtime.run(adapter.process(&MyBot)).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{ConfigError, ConfigLoader, ConfigResult, ParleyConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{BotRuntime, RuntimeBuilder, TURN_ERROR_MESSAGE};

// Re-export tracing for use by bot crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for bot code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
