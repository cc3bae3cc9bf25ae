//! Typing indicator middleware.

use std::time::Duration;

use parley_core::{
    Activity, BotResult, BoxFuture, Middleware, Next, TurnContext, activity_types,
};
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::error::{FrameworkError, FrameworkResult};

/// Sends `typing` activities while a message turn is being processed.
///
/// The first indicator goes out after `delay`, then one every `period`
/// until the rest of the pipeline returns. Indicators are sent straight
/// through the adapter, so they skip send interceptors and never mark the
/// turn as responded. Non-message activities pass through untouched.
///
/// ```rust,ignore
/// adapter.use_middleware(ShowTypingMiddleware::new(
///     Duration::from_millis(500),
///     Duration::from_secs(2),
/// )?);
/// ```
#[derive(Debug, Clone)]
pub struct ShowTypingMiddleware {
    delay: Duration,
    period: Duration,
}

impl ShowTypingMiddleware {
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(500);
    pub const DEFAULT_PERIOD: Duration = Duration::from_secs(2);

    /// Fails with [`FrameworkError::ZeroTypingPeriod`] if `period` is zero.
    pub fn new(delay: Duration, period: Duration) -> FrameworkResult<Self> {
        if period.is_zero() {
            return Err(FrameworkError::ZeroTypingPeriod);
        }
        Ok(Self { delay, period })
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    async fn send_typing_until(&self, ctx: &TurnContext, done: CancellationToken) {
        let mut wait = self.delay;
        loop {
            tokio::select! {
                biased;
                _ = done.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            if let Err(err) = send_typing(ctx).await {
                warn!(error = %err, "Failed to send typing indicator, giving up for this turn");
                break;
            }
            wait = self.period;
        }
    }
}

impl Default for ShowTypingMiddleware {
    fn default() -> Self {
        Self {
            delay: Self::DEFAULT_DELAY,
            period: Self::DEFAULT_PERIOD,
        }
    }
}

async fn send_typing(ctx: &TurnContext) -> BotResult<()> {
    let mut typing = Activity::typing();
    if let Some(inbound) = ctx.activity() {
        typing.relates_to.clone_from(&inbound.relates_to);
        let reference = TurnContext::get_conversation_reference(inbound);
        TurnContext::apply_conversation_reference(&mut typing, &reference, false);
    }
    trace!("Sending typing indicator");
    ctx.adapter().send_activities(ctx, &[typing]).await?;
    Ok(())
}

impl Middleware for ShowTypingMiddleware {
    fn on_turn<'a>(&'a self, ctx: &'a TurnContext, next: Next<'a>) -> BoxFuture<'a, BotResult<()>> {
        Box::pin(async move {
            let is_message = ctx
                .activity()
                .is_some_and(|a| a.is_type(activity_types::MESSAGE));
            if !is_message {
                return next.run().await;
            }

            let done = CancellationToken::new();
            let typing = self.send_typing_until(ctx, done.clone());
            let turn = async {
                let result = next.run().await;
                done.cancel();
                result
            };

            let ((), result) = tokio::join!(typing, turn);
            result
        })
    }
}
