//! # Parley
//!
//! The bot side of a conversational turn: an inbound activity flows through
//! an ordered middleware pipeline into bot logic, and every outbound send,
//! update or delete can be intercepted on the way out.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────────────────────────────┐   ┌─────────┐
//! │  Adapter  │──▶│ run_pipeline                         │──▶│   Bot   │
//! │ (console, │   │   M1 → M2 → … (onion, may short-     │   │ on_turn │
//! │  test, …) │   │   circuit)  + on_turn_error boundary │   └────┬────┘
//! └─────▲─────┘   └──────────────────────────────────────┘        │
//!       │            TurnContext: send / update / delete          │
//!       └──────────── interceptor chains (last-registered ◀───────┘
//!                     first-invoked … → adapter)
//! ```
//!
//! - **Core** ([`core`]): activities, `TurnContext`, turn state,
//!   interceptors, middleware and the adapter contract
//! - **Framework** ([`framework`]): typing indicators, transcripts, tower
//!   integration
//! - **Runtime** ([`runtime`]): configuration, logging, process wiring
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use parley::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = BotRuntime::new();
//!     let adapter = Arc::new(runtime.create_adapter::<ConsoleAdapter>()?);
//!
//!     let echo = bot_fn(|ctx| Box::pin(async move {
//!         let text = ctx.activity().and_then(|a| a.text.clone()).unwrap_or_default();
//!         ctx.send_activity(format!("You said: {text}")).await?;
//!         Ok(())
//!     }));
//!
//!     runtime.run(adapter.process(&echo)).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `console` *(default)*: the stdin/stdout adapter
//! - `toml-config` *(default)*: `parley.toml` configuration files
//! - `yaml-config`: `parley.yaml` configuration files
//! - `json-log`: JSON log output
//! - `testing`: `TestAdapter` and `TestFlow`

pub use parley_core as core;
pub use parley_framework as framework;
pub use parley_runtime as runtime;

#[cfg(feature = "console")]
pub use parley_adapter_console as console;
#[cfg(feature = "testing")]
pub use parley_testing as testing;

/// Commonly used types for building bots.
///
/// ```rust,ignore
/// use parley::prelude::*;
/// ```
pub mod prelude {
    pub use std::sync::Arc;

    // Runtime - main entry point
    pub use parley_runtime::{BotRuntime, ParleyConfig};

    // Activities and the turn
    pub use parley_core::{
        Activity, ChannelAccount, ConversationAccount, ConversationReference, ResourceResponse,
        TurnContext, TurnState, activity_types,
    };

    // Bot logic and middleware
    pub use parley_core::{
        Bot, BotAdapter, BotError, BotResult, BoxFuture, ConfigurableAdapter, Middleware,
        MiddlewareSet, Next, bot_fn, middleware_fn,
    };

    // Activity-type dispatch
    pub use parley_core::MessageReaction;
    pub use parley_framework::{ActivityBot, ActivityHandler, async_trait};

    // Built-in middleware and tower integration
    pub use parley_framework::{
        BotService, MemoryTranscriptStore, ServiceBuilderExt, ShowTypingMiddleware,
        TranscriptLoggerMiddleware, on_event, on_message,
    };

    #[cfg(feature = "console")]
    pub use parley_adapter_console::ConsoleAdapter;
}
