//! Tower integration.
//!
//! [`BotService`] runs one turn per request, so hosts can stack ordinary
//! tower layers (timeouts, concurrency limits, filters) around a bot:
//!
//! ```rust,ignore
//! use tower::ServiceBuilder;
//!
//! let service = ServiceBuilder::new()
//!     .timeout(Duration::from_secs(15))
//!     .concurrency_limit(64)
//!     .bot(adapter, my_bot);
//! ```
//!
//! Cancelling a turn by dropping its future (as the timeout layer does)
//! abandons the turn at its current await point.

use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use parley_core::{Activity, Bot, BotAdapter, INVOKE_RESPONSE_KEY, TurnContext};
use tower::filter::{FilterLayer, Predicate};
use tower::{BoxError, Layer, Service, ServiceBuilder};
use tower_layer::Stack;
use tracing::debug;

use crate::error::ActivitySkipped;

/// What a completed turn produced.
#[derive(Debug, Clone, Default)]
pub struct TurnOutcome {
    /// Whether a non-trace activity was sent.
    pub responded: bool,
    /// Replies buffered for `expectReplies` delivery.
    pub replies: Vec<Activity>,
    /// The `invokeResponse` activity, if the bot produced one.
    pub invoke_response: Option<Activity>,
}

/// A tower [`Service`] that runs each request activity as a turn.
#[derive(Clone)]
pub struct BotService {
    adapter: Arc<dyn BotAdapter>,
    bot: Arc<dyn Bot>,
}

impl BotService {
    pub fn new(adapter: Arc<dyn BotAdapter>, bot: impl Bot + 'static) -> Self {
        Self {
            adapter,
            bot: Arc::new(bot),
        }
    }

    pub fn from_shared(adapter: Arc<dyn BotAdapter>, bot: Arc<dyn Bot>) -> Self {
        Self { adapter, bot }
    }
}

impl Service<Activity> for BotService {
    type Response = TurnOutcome;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<TurnOutcome, BoxError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, activity: Activity) -> Self::Future {
        let adapter = Arc::clone(&self.adapter);
        let bot = Arc::clone(&self.bot);
        async move {
            let ctx = TurnContext::new(Arc::clone(&adapter), activity);
            adapter.run_pipeline(&ctx, Some(bot.as_ref())).await?;

            let invoke_response = ctx
                .turn_state()
                .get::<Activity>(INVOKE_RESPONSE_KEY)
                .ok()
                .map(|activity| (*activity).clone());
            let outcome = TurnOutcome {
                responded: ctx.responded(),
                replies: ctx.take_buffered_replies(),
                invoke_response,
            };
            debug!(responded = outcome.responded, replies = outcome.replies.len(), "Turn complete");
            Ok(outcome)
        }
        .boxed()
    }
}

// ============================================================================
// ActivityPredicate
// ============================================================================

/// A [`Predicate`] over inbound activities.
///
/// When the closure returns `false` the request is rejected with
/// [`ActivitySkipped`].
#[derive(Clone)]
pub struct ActivityPredicate(Arc<dyn Fn(&Activity) -> bool + Send + Sync>);

impl ActivityPredicate {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Activity) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }
}

impl Predicate<Activity> for ActivityPredicate {
    type Request = Activity;

    fn check(&mut self, request: Activity) -> Result<Activity, BoxError> {
        if (self.0)(&request) {
            Ok(request)
        } else {
            Err(Box::new(ActivitySkipped))
        }
    }
}

/// Extension trait for [`tower::ServiceBuilder`] to finish a stack with a
/// bot.
pub trait ServiceBuilderExt<L> {
    /// Wraps `bot` in a [`BotService`] over `adapter` and applies all
    /// stacked layers.
    fn bot<B>(self, adapter: Arc<dyn BotAdapter>, bot: B) -> L::Service
    where
        B: Bot + 'static,
        L: Layer<BotService>;

    /// Only lets activities matching `predicate` through.
    fn rule<F>(self, predicate: F) -> ServiceBuilder<Stack<FilterLayer<ActivityPredicate>, L>>
    where
        F: Fn(&Activity) -> bool + Send + Sync + 'static;
}

impl<L> ServiceBuilderExt<L> for ServiceBuilder<L> {
    fn bot<B>(self, adapter: Arc<dyn BotAdapter>, bot: B) -> L::Service
    where
        B: Bot + 'static,
        L: Layer<BotService>,
    {
        self.service(BotService::new(adapter, bot))
    }

    fn rule<F>(self, predicate: F) -> ServiceBuilder<Stack<FilterLayer<ActivityPredicate>, L>>
    where
        F: Fn(&Activity) -> bool + Send + Sync + 'static,
    {
        self.filter(ActivityPredicate::new(predicate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::on_message;
    use parley_core::{BotError, activity_types, bot_fn, delivery_modes};
    use parley_testing::TestAdapter;
    use std::time::Duration;
    use tower::ServiceExt;

    fn echo() -> impl Bot {
        bot_fn(|ctx| {
            Box::pin(async move {
                let text = ctx.activity().and_then(|a| a.text.clone()).unwrap_or_default();
                ctx.send_activity(format!("echo: {text}")).await?;
                Ok(())
            })
        })
    }

    fn inbound(adapter: &TestAdapter, text: &str) -> Activity {
        adapter.make_activity(text)
    }

    #[tokio::test]
    async fn test_service_runs_turn() {
        let adapter = TestAdapter::new();
        let service = BotService::new(Arc::new(adapter.clone()), echo());

        let outcome = service.oneshot(inbound(&adapter, "hi")).await.unwrap();

        assert!(outcome.responded);
        assert!(outcome.replies.is_empty());
        assert_eq!(adapter.next_reply().unwrap().text.as_deref(), Some("echo: hi"));
    }

    #[tokio::test]
    async fn test_expect_replies_are_returned_in_outcome() {
        let adapter = TestAdapter::new();
        let bot = bot_fn(|ctx| {
            Box::pin(async move {
                ctx.send_activity("buffered").await?;
                let mut invoke = Activity::new(activity_types::INVOKE_RESPONSE);
                invoke.value = Some(serde_json::json!({ "status": 200 }));
                ctx.send_activity(invoke).await?;
                Ok(())
            })
        });
        let service = BotService::new(Arc::new(adapter.clone()), bot);

        let mut activity = inbound(&adapter, "hi");
        activity.delivery_mode = Some(delivery_modes::EXPECT_REPLIES.into());
        let outcome = service.oneshot(activity).await.unwrap();

        assert_eq!(outcome.replies.len(), 2);
        assert_eq!(outcome.replies[0].text.as_deref(), Some("buffered"));
        let invoke = outcome.invoke_response.unwrap();
        assert_eq!(invoke.value, Some(serde_json::json!({ "status": 200 })));
        assert!(adapter.next_reply().is_none());
    }

    #[tokio::test]
    async fn test_turn_error_becomes_service_error() {
        let adapter = TestAdapter::new();
        let failing = bot_fn(|_ctx| Box::pin(async { Err::<(), _>(BotError::channel("down")) }));
        let service = BotService::new(Arc::new(adapter.clone()), failing);

        let err = service.oneshot(inbound(&adapter, "hi")).await.unwrap_err();
        assert!(err.downcast_ref::<BotError>().is_some());
    }

    #[tokio::test]
    async fn test_filter_skips_non_matching_activity() {
        let adapter = TestAdapter::new();
        let service = on_message().bot(Arc::new(adapter.clone()), echo());

        let mut event = inbound(&adapter, "");
        event.activity_type = Some(activity_types::EVENT.into());
        let err = service.oneshot(event).await.unwrap_err();

        assert!(err.downcast_ref::<ActivitySkipped>().is_some());
        assert!(adapter.next_reply().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_layer_abandons_slow_turn() {
        let adapter = TestAdapter::new();
        let slow = bot_fn(|ctx| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                ctx.send_activity("too late").await?;
                Ok(())
            })
        });
        let service = ServiceBuilder::new()
            .timeout(Duration::from_secs(1))
            .bot(Arc::new(adapter.clone()), slow);

        let err = service.oneshot(inbound(&adapter, "hi")).await.unwrap_err();

        assert!(err.is::<tower::timeout::error::Elapsed>());
        assert!(adapter.next_reply().is_none());
    }
}
