//! The bot callback invoked at the end of the middleware chain.

use std::sync::Arc;

use crate::error::BotResult;
use crate::foundation::context::TurnContext;
use crate::framework::BoxFuture;

/// Bot logic for a single turn.
///
/// Implemented by the application; invoked once every middleware has
/// called `next`.
pub trait Bot: Send + Sync {
    fn on_turn<'a>(&'a self, ctx: &'a TurnContext) -> BoxFuture<'a, BotResult<()>>;
}

impl<B: Bot + ?Sized> Bot for Arc<B> {
    fn on_turn<'a>(&'a self, ctx: &'a TurnContext) -> BoxFuture<'a, BotResult<()>> {
        (**self).on_turn(ctx)
    }
}

/// A [`Bot`] backed by a closure. See [`bot_fn`].
#[derive(Clone)]
pub struct BotFn<F>(F);

impl<F> Bot for BotFn<F>
where
    F: for<'a> Fn(&'a TurnContext) -> BoxFuture<'a, BotResult<()>> + Send + Sync,
{
    fn on_turn<'a>(&'a self, ctx: &'a TurnContext) -> BoxFuture<'a, BotResult<()>> {
        (self.0)(ctx)
    }
}

/// Wraps a closure as a [`Bot`].
///
/// ```rust,ignore
/// let echo = bot_fn(|ctx| {
///     Box::pin(async move {
///         let text = ctx.activity().and_then(|a| a.text.clone()).unwrap_or_default();
///         ctx.send_activity(format!("You said: {text}")).await?;
///         Ok(())
///     })
/// });
/// ```
pub fn bot_fn<F>(f: F) -> BotFn<F>
where
    F: for<'a> Fn(&'a TurnContext) -> BoxFuture<'a, BotResult<()>> + Send + Sync,
{
    BotFn(f)
}
