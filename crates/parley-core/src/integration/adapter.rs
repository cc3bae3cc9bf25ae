//! Adapter contract and the turn pipeline.
//!
//! A channel adapter owns a [`Pipeline`] (its middleware set and optional
//! turn error handler) and implements the three channel I/O operations.
//! Everything else, including the error boundary, comes from the provided
//! [`BotAdapter::run_pipeline`].
//!
//! ```text
//! inbound activity
//!   └─ run_pipeline ─────────────────────────────┐
//!        middleware M1 → M2 → … → bot.on_turn    │ Err(e)
//!                                                 ▼
//!                              on_turn_error(ctx, e) or Err(e)
//! ```
//!
//! # Implementing an adapter
//!
//! ```rust,ignore
//! struct LoopbackAdapter {
//!     pipeline: Pipeline,
//! }
//!
//! #[async_trait]
//! impl BotAdapter for LoopbackAdapter {
//!     fn pipeline(&self) -> &Pipeline { &self.pipeline }
//!     fn pipeline_mut(&mut self) -> &mut Pipeline { &mut self.pipeline }
//!
//!     async fn send_activities(&self, _ctx: &TurnContext, activities: &[Activity])
//!         -> BotResult<Vec<ResourceResponse>>
//!     {
//!         Ok(activities.iter().map(|_| ResourceResponse::new("1")).collect())
//!     }
//!
//!     // update_activity / delete_activity ...
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{Instrument, debug, debug_span, error, warn};

use crate::error::{BotError, BotResult};
use crate::foundation::context::TurnContext;
use crate::foundation::schema::{Activity, ConversationReference, ResourceResponse};
use crate::framework::BoxFuture;
use crate::framework::middleware::{Middleware, MiddlewareSet};
use crate::integration::bot::Bot;

/// The turn error handler installed on an adapter.
///
/// Receives the context of the failed turn and the error. Returning `Ok`
/// swallows the error; returning `Err` propagates it to whoever ran the
/// pipeline.
pub type OnTurnError =
    Arc<dyn for<'a> Fn(&'a TurnContext, BotError) -> BoxFuture<'a, BotResult<()>> + Send + Sync>;

/// Middleware and error handler owned by an adapter.
#[derive(Clone, Default)]
pub struct Pipeline {
    middleware: MiddlewareSet,
    on_turn_error: Option<OnTurnError>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn middleware(&self) -> &MiddlewareSet {
        &self.middleware
    }

    pub fn middleware_mut(&mut self) -> &mut MiddlewareSet {
        &mut self.middleware
    }

    pub fn on_turn_error(&self) -> Option<&OnTurnError> {
        self.on_turn_error.as_ref()
    }

    /// Installs (or replaces) the turn error handler.
    pub fn set_on_turn_error(&mut self, handler: OnTurnError) {
        self.on_turn_error = Some(handler);
    }

    /// Removes the turn error handler.
    pub fn clear_on_turn_error(&mut self) {
        self.on_turn_error = None;
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("middleware", &self.middleware)
            .field("on_turn_error", &self.on_turn_error.is_some())
            .finish()
    }
}

/// A channel adapter.
///
/// Implementors provide channel I/O; middleware registration and the turn
/// pipeline are provided methods.
#[async_trait]
pub trait BotAdapter: Send + Sync + 'static {
    /// The adapter's pipeline.
    fn pipeline(&self) -> &Pipeline;

    /// Mutable access to the pipeline, used during setup.
    fn pipeline_mut(&mut self) -> &mut Pipeline;

    /// Delivers a batch of activities to the channel.
    ///
    /// Returns one [`ResourceResponse`] per delivered activity.
    async fn send_activities(
        &self,
        ctx: &TurnContext,
        activities: &[Activity],
    ) -> BotResult<Vec<ResourceResponse>>;

    /// Replaces a previously sent activity.
    async fn update_activity(
        &self,
        ctx: &TurnContext,
        activity: &Activity,
    ) -> BotResult<ResourceResponse>;

    /// Deletes the activity identified by `reference`.
    async fn delete_activity(
        &self,
        ctx: &TurnContext,
        reference: &ConversationReference,
    ) -> BotResult<()>;

    /// Appends a middleware to the adapter's pipeline.
    fn use_middleware<M>(&mut self, middleware: M) -> &mut Self
    where
        Self: Sized,
        M: Middleware + 'static,
    {
        self.pipeline_mut().middleware_mut().use_middleware(middleware);
        self
    }

    /// Installs the turn error handler.
    ///
    /// ```rust,ignore
    /// adapter.on_turn_error(|ctx, err| {
    ///     Box::pin(async move {
    ///         tracing::error!(error = %err, "turn failed");
    ///         ctx.send_activity("Sorry, something went wrong.").await?;
    ///         Ok(())
    ///     })
    /// });
    /// ```
    fn on_turn_error<F>(&mut self, handler: F) -> &mut Self
    where
        Self: Sized,
        F: for<'a> Fn(&'a TurnContext, BotError) -> BoxFuture<'a, BotResult<()>>
            + Send
            + Sync
            + 'static,
    {
        self.pipeline_mut().set_on_turn_error(Arc::new(handler));
        self
    }

    /// Runs one turn through the middleware pipeline and `callback`.
    ///
    /// This is the single place where turn errors are caught: an error from
    /// any middleware or the callback is handed to the turn error handler if
    /// one is installed and returned otherwise. A context without an inbound
    /// activity bypasses middleware and invokes `callback` directly.
    async fn run_pipeline(&self, ctx: &TurnContext, callback: Option<&dyn Bot>) -> BotResult<()> {
        let Some(activity) = ctx.activity() else {
            debug!("No inbound activity, invoking callback directly");
            return match callback {
                Some(bot) => bot.on_turn(ctx).await,
                None => Ok(()),
            };
        };

        let span = debug_span!(
            "turn",
            activity_type = activity.activity_type.as_deref().unwrap_or_default(),
            channel = activity.channel_id.as_deref().unwrap_or_default(),
            conversation = activity.conversation_id().unwrap_or_default(),
        );

        let pipeline = self.pipeline();
        let result = pipeline
            .middleware()
            .receive_activity_with_status(ctx, callback)
            .instrument(span.clone())
            .await;

        let Err(err) = result else {
            return Ok(());
        };

        match pipeline.on_turn_error() {
            Some(handler) => {
                warn!(parent: &span, error = %err, "Turn failed, invoking turn error handler");
                handler(ctx, err).instrument(span).await
            }
            None => {
                error!(parent: &span, error = %err, "Unhandled turn error");
                Err(err)
            }
        }
    }
}

impl dyn BotAdapter {
    /// Starts a proactive turn in the conversation identified by
    /// `reference`.
    ///
    /// The turn carries an incoming `ContinueConversation` event addressed
    /// from the referenced user to the bot, and runs through the full
    /// pipeline.
    pub async fn continue_conversation(
        self: Arc<Self>,
        reference: &ConversationReference,
        bot: &dyn Bot,
    ) -> BotResult<()> {
        let activity = TurnContext::get_continuation_activity(reference);
        let ctx = TurnContext::new(Arc::clone(&self), activity);
        self.run_pipeline(&ctx, Some(bot)).await
    }
}

/// An adapter that can be built from its section of the runtime
/// configuration.
pub trait ConfigurableAdapter: BotAdapter + Sized {
    /// The adapter's configuration section.
    type Config: serde::de::DeserializeOwned + Default;

    /// Name of the section under `adapters` in the configuration file.
    fn name() -> &'static str;

    /// Creates an adapter from its configuration.
    fn from_config(config: Self::Config) -> BotResult<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::schema::activity_types;
    use crate::framework::middleware::{Next, middleware_fn};
    use crate::integration::bot::bot_fn;
    use crate::testing::{MockAdapter, inbound_message};
    use parking_lot::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        log: Log,
    }

    impl Middleware for Recorder {
        fn on_turn<'a>(&'a self, _ctx: &'a TurnContext, next: Next<'a>) -> BoxFuture<'a, BotResult<()>> {
            Box::pin(async move {
                self.log.lock().push(format!("{}:before", self.name));
                let result = next.run().await;
                self.log.lock().push(format!("{}:after", self.name));
                result
            })
        }
    }

    fn recording_bot(log: Log) -> impl Bot {
        bot_fn(move |_ctx| {
            let log = log.clone();
            Box::pin(async move {
                log.lock().push("bot".into());
                Ok(())
            })
        })
    }

    fn failing_bot() -> impl Bot {
        bot_fn(|_ctx| Box::pin(async { Err::<(), _>(BotError::msg("bot exploded")) }))
    }

    #[tokio::test]
    async fn test_middleware_runs_in_onion_order() {
        let log: Log = Arc::default();
        let mut adapter = MockAdapter::new();
        adapter
            .use_middleware(Recorder { name: "m1", log: log.clone() })
            .use_middleware(Recorder { name: "m2", log: log.clone() });
        let adapter = Arc::new(adapter);

        let ctx = TurnContext::new(adapter.clone(), inbound_message("hi"));
        adapter
            .run_pipeline(&ctx, Some(&recording_bot(log.clone())))
            .await
            .unwrap();

        assert_eq!(
            *log.lock(),
            vec!["m1:before", "m2:before", "bot", "m2:after", "m1:after"]
        );
    }

    #[tokio::test]
    async fn test_short_circuit_skips_rest_and_succeeds() {
        let log: Log = Arc::default();
        let mut adapter = MockAdapter::new();
        let stop_log = log.clone();
        adapter
            .use_middleware(middleware_fn(move |_ctx, _next| {
                let log = stop_log.clone();
                Box::pin(async move {
                    log.lock().push("stop".into());
                    Ok(())
                })
            }))
            .use_middleware(Recorder { name: "m2", log: log.clone() });
        let adapter = Arc::new(adapter);

        let ctx = TurnContext::new(adapter.clone(), inbound_message("hi"));
        adapter
            .run_pipeline(&ctx, Some(&recording_bot(log.clone())))
            .await
            .unwrap();

        assert_eq!(*log.lock(), vec!["stop"]);
    }

    #[tokio::test]
    async fn test_error_without_handler_propagates() {
        let adapter = Arc::new(MockAdapter::new());
        let ctx = TurnContext::new(adapter.clone(), inbound_message("hi"));

        let err = adapter.run_pipeline(&ctx, Some(&failing_bot())).await.unwrap_err();
        assert_eq!(err.to_string(), "bot exploded");
    }

    #[tokio::test]
    async fn test_turn_error_handler_swallows_and_can_reply() {
        let seen = Arc::new(Mutex::new(None));
        let mut adapter = MockAdapter::new();
        let captured = seen.clone();
        adapter.on_turn_error(move |ctx, err| {
            let captured = captured.clone();
            Box::pin(async move {
                *captured.lock() = Some(err.to_string());
                ctx.send_activity("Sorry, something went wrong.").await?;
                Ok(())
            })
        });
        let adapter = Arc::new(adapter);

        let ctx = TurnContext::new(adapter.clone(), inbound_message("hi"));
        adapter.run_pipeline(&ctx, Some(&failing_bot())).await.unwrap();

        assert_eq!(seen.lock().as_deref(), Some("bot exploded"));
        assert_eq!(
            adapter.sent()[0].text.as_deref(),
            Some("Sorry, something went wrong.")
        );
        assert!(ctx.responded());
    }

    #[tokio::test]
    async fn test_error_inside_turn_error_handler_propagates() {
        let mut adapter = MockAdapter::new();
        adapter.on_turn_error(|_ctx, err| {
            Box::pin(async move { Err::<(), _>(BotError::msg(format!("handler failed after: {err}"))) })
        });
        let adapter = Arc::new(adapter);

        let ctx = TurnContext::new(adapter.clone(), inbound_message("hi"));
        let err = adapter.run_pipeline(&ctx, Some(&failing_bot())).await.unwrap_err();
        assert_eq!(err.to_string(), "handler failed after: bot exploded");
    }

    #[tokio::test]
    async fn test_middleware_can_observe_downstream_error() {
        let observed = Arc::new(Mutex::new(false));
        let mut adapter = MockAdapter::new();
        let flag = observed.clone();
        adapter.use_middleware(middleware_fn(move |_ctx, next| {
            let flag = flag.clone();
            Box::pin(async move {
                let result = next.run().await;
                *flag.lock() = result.is_err();
                result
            })
        }));
        let adapter = Arc::new(adapter);

        let ctx = TurnContext::new(adapter.clone(), inbound_message("hi"));
        assert!(adapter.run_pipeline(&ctx, Some(&failing_bot())).await.is_err());
        assert!(*observed.lock());
    }

    #[tokio::test]
    async fn test_no_activity_bypasses_middleware() {
        let log: Log = Arc::default();
        let mut adapter = MockAdapter::new();
        adapter.use_middleware(Recorder { name: "m1", log: log.clone() });
        let adapter = Arc::new(adapter);

        let ctx = TurnContext::without_activity(adapter.clone());
        adapter
            .run_pipeline(&ctx, Some(&recording_bot(log.clone())))
            .await
            .unwrap();

        assert_eq!(*log.lock(), vec!["bot"]);
    }

    #[tokio::test]
    async fn test_no_callback_runs_middleware_only() {
        let log: Log = Arc::default();
        let mut adapter = MockAdapter::new();
        adapter.use_middleware(Recorder { name: "m1", log: log.clone() });
        let adapter = Arc::new(adapter);

        let ctx = TurnContext::new(adapter.clone(), inbound_message("hi"));
        adapter.run_pipeline(&ctx, None).await.unwrap();

        assert_eq!(*log.lock(), vec!["m1:before", "m1:after"]);
    }

    #[tokio::test]
    async fn test_continue_conversation_runs_event_turn() {
        let seen = Arc::new(Mutex::new(None));
        let adapter: Arc<dyn BotAdapter> = Arc::new(MockAdapter::new());
        let reference = TurnContext::get_conversation_reference(&inbound_message("hi"));

        let captured = seen.clone();
        let bot = bot_fn(move |ctx| {
            let captured = captured.clone();
            Box::pin(async move {
                *captured.lock() = ctx.activity().cloned();
                Ok(())
            })
        });
        adapter.continue_conversation(&reference, &bot).await.unwrap();

        let activity = seen.lock().clone().unwrap();
        assert!(activity.is_type(activity_types::EVENT));
        assert_eq!(activity.relates_to.as_ref(), Some(&reference));
    }
}
