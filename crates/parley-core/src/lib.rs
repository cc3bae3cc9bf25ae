//! # Parley Core
//!
//! The turn runtime of the Parley bot framework.
//!
//! Every inbound activity becomes a *turn*: the adapter wraps it in a
//! [`TurnContext`], runs it through an ordered chain of [`Middleware`] and
//! finally hands it to the application's [`Bot`]. Replies sent from
//! anywhere in the turn pass through per-turn interceptors before the
//! adapter delivers them to the channel.
//!
//! ## Architecture Layers
//!
//! ### Foundation Layer
//!
//! Turn data:
//! - **Schema**: the [`Activity`] envelope and addressing records
//!   ([`ConversationReference`], [`ChannelAccount`], ...)
//! - **Turn State**: the turn-scoped named value bag ([`TurnState`])
//! - **Turn Context**: the per-turn object handed to middleware and bots
//!   ([`TurnContext`])
//!
//! ### Framework Layer
//!
//! Processing chains:
//! - **Middleware**: onion-ordered turn interception ([`Middleware`],
//!   [`MiddlewareSet`], [`Next`])
//! - **Interceptors**: send/update/delete hooks ([`Interceptor`],
//!   [`InterceptNext`])
//!
//! ### Integration Layer
//!
//! External seams:
//! - **Adapter**: channel I/O plus the turn pipeline and its error boundary
//!   ([`BotAdapter`], [`Pipeline`])
//! - **Bot**: the application callback ([`Bot`])
//!
//! ## Turn Flow
//!
//! ```text
//! ┌─────────┐   ┌──────────────┐   ┌────────────────────────────┐   ┌─────┐
//! │ Channel │──▶│ BotAdapter   │──▶│ M1 ─▶ M2 ─▶ … ─▶ Mn        │──▶│ Bot │
//! └─────────┘   │ run_pipeline │   └────────────────────────────┘   └─────┘
//!      ▲        └──────────────┘                                       │
//!      │                    ctx.send_activity(..)                      │
//!      └──── adapter.send_activities ◀── interceptors ◀────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use parley_core::prelude::*;
//!
//! let bot = bot_fn(|ctx| {
//!     Box::pin(async move {
//!         let text = ctx.activity().and_then(|a| a.text.clone()).unwrap_or_default();
//!         ctx.send_activity(format!("You said: {text}")).await?;
//!         Ok(())
//!     })
//! });
//!
//! let mut adapter = MyAdapter::new();
//! adapter
//!     .use_middleware(middleware_fn(|ctx, next| {
//!         Box::pin(async move {
//!             tracing::info!(text = ?ctx.activity().and_then(|a| a.text.as_deref()), "inbound");
//!             next.run().await
//!         })
//!     }))
//!     .on_turn_error(|ctx, err| {
//!         Box::pin(async move {
//!             ctx.send_activity(format!("Oops: {err}")).await?;
//!             Ok(())
//!         })
//!     });
//!
//! let adapter = Arc::new(adapter);
//! let ctx = TurnContext::new(adapter.clone(), inbound);
//! adapter.run_pipeline(&ctx, Some(&bot)).await?;
//! ```

pub mod error;

// Architectural layers
pub mod foundation;
pub mod framework;
pub mod integration;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{BotError, BotResult};

// Re-export foundation types
pub use foundation::{
    Activity, ChannelAccount, ConversationAccount, ConversationReference, Entity,
    INVOKE_RESPONSE_KEY, InvokeResponse, Mention, MessageReaction, ResourceResponse, TurnContext, TurnState, activity_types,
    delivery_modes, event_names, input_hints,
};

// Re-export framework types
pub use framework::{
    BoxFuture, DeleteActivityHandler, DeleteNext, InterceptNext, Interceptor,
    InterceptorRegistry, Middleware, MiddlewareFn, MiddlewareSet, Next, SendActivitiesHandler,
    SendNext, UpdateActivityHandler, UpdateNext, middleware_fn,
};

// Re-export integration types
pub use integration::{Bot, BotAdapter, BotFn, ConfigurableAdapter, OnTurnError, Pipeline, bot_fn};

/// Prelude for common imports.
pub mod prelude {
    pub use super::error::{BotError, BotResult};
    pub use super::foundation::*;
    pub use super::framework::{BoxFuture, Middleware, MiddlewareSet, Next, middleware_fn};
    pub use super::integration::{Bot, BotAdapter, Pipeline, bot_fn};
}
