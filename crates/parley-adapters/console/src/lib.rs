//! # Parley Console Adapter
//!
//! Talk to a bot from a terminal: each line typed on stdin runs one turn,
//! and the bot's replies are printed to stdout.
//!
//! ```rust,ignore
//! use parley_adapter_console::ConsoleAdapter;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let adapter = Arc::new(ConsoleAdapter::new());
//!     adapter.process(&MyBot).await?;
//!     Ok(())
//! }
//! ```
//!
//! With `parley-runtime`, the adapter is built from the `adapters.console`
//! section of the configuration:
//!
//! ```rust,ignore
//! let runtime = BotRuntime::new();
//! let adapter = Arc::new(runtime.create_adapter::<ConsoleAdapter>()?);
//! runtime.run(adapter.process(&MyBot)).await?;
//! ```

pub mod adapter;
pub mod config;

pub use adapter::ConsoleAdapter;
pub use config::ConsoleConfig;
