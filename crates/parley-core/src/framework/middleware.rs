//! Turn middleware and chained-continuation dispatch.
//!
//! A [`MiddlewareSet`] runs its middleware as a call stack around the bot
//! callback:
//!
//! ```text
//!  M1 before ─▶ M2 before ─▶ M3 before ─▶ bot.on_turn
//!                                              │
//!  M1 after  ◀─ M2 after  ◀─ M3 after  ◀───────┘
//! ```
//!
//! A middleware continues the chain by calling [`Next::run`]. Returning
//! without calling it short-circuits: later middleware and the bot never
//! run, and the turn still counts as successful. Errors travel back up
//! through every enclosing `next.run().await` untouched; the set neither
//! catches nor logs them.

use std::sync::Arc;

use tracing::trace;

use crate::error::{BotError, BotResult};
use crate::foundation::context::TurnContext;
use crate::framework::BoxFuture;
use crate::integration::bot::Bot;

/// A unit of turn interception.
///
/// ```rust,ignore
/// struct Stopwatch;
///
/// impl Middleware for Stopwatch {
///     fn on_turn<'a>(&'a self, ctx: &'a TurnContext, next: Next<'a>) -> BoxFuture<'a, BotResult<()>> {
///         Box::pin(async move {
///             let started = std::time::Instant::now();
///             let result = next.run().await;
///             tracing::debug!(elapsed = ?started.elapsed(), "turn finished");
///             result
///         })
///     }
/// }
/// ```
pub trait Middleware: Send + Sync {
    /// Processes the turn, calling `next.run()` to continue the chain.
    fn on_turn<'a>(&'a self, ctx: &'a TurnContext, next: Next<'a>) -> BoxFuture<'a, BotResult<()>>;
}

impl<M: Middleware + ?Sized> Middleware for Arc<M> {
    fn on_turn<'a>(&'a self, ctx: &'a TurnContext, next: Next<'a>) -> BoxFuture<'a, BotResult<()>> {
        (**self).on_turn(ctx, next)
    }
}

/// What runs once the middleware of a chain is exhausted.
enum Tail<'a> {
    /// The bot callback, if any.
    Callback(Option<&'a dyn Bot>),
    /// The remainder of an enclosing chain (nested sets).
    Outer(Box<Next<'a>>),
}

/// The remainder of a middleware chain.
///
/// Consumed by [`run`](Self::run), so each middleware can continue the
/// chain at most once.
pub struct Next<'a> {
    ctx: &'a TurnContext,
    middleware: &'a [Arc<dyn Middleware>],
    tail: Tail<'a>,
}

impl<'a> Next<'a> {
    fn new(
        ctx: &'a TurnContext,
        middleware: &'a [Arc<dyn Middleware>],
        callback: Option<&'a dyn Bot>,
    ) -> Self {
        Self {
            ctx,
            middleware,
            tail: Tail::Callback(callback),
        }
    }

    fn nested(ctx: &'a TurnContext, middleware: &'a [Arc<dyn Middleware>], outer: Next<'a>) -> Self {
        Self {
            ctx,
            middleware,
            tail: Tail::Outer(Box::new(outer)),
        }
    }

    /// Runs the next middleware, or the bot callback once every middleware
    /// has been entered.
    pub fn run(self) -> BoxFuture<'a, BotResult<()>> {
        match self.middleware.split_first() {
            Some((middleware, rest)) => {
                trace!(remaining = rest.len(), "Entering middleware");
                let next = Next {
                    ctx: self.ctx,
                    middleware: rest,
                    tail: self.tail,
                };
                middleware.on_turn(self.ctx, next)
            }
            None => match self.tail {
                Tail::Callback(Some(bot)) => {
                    trace!("Middleware exhausted, invoking bot callback");
                    bot.on_turn(self.ctx)
                }
                Tail::Callback(None) => Box::pin(async { Ok::<_, BotError>(()) }),
                Tail::Outer(outer) => outer.run(),
            },
        }
    }
}

// =============================================================================
// MiddlewareSet
// =============================================================================

/// An ordered, append-only collection of middleware.
///
/// Insertion order is dispatch order. A set is itself [`Middleware`], so
/// sets nest: a nested set runs its own middleware and then continues the
/// enclosing chain, preserving onion ordering across the boundary.
#[derive(Clone, Default)]
pub struct MiddlewareSet {
    middleware: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareSet {
    pub fn new() -> Self {
        Self {
            middleware: Vec::new(),
        }
    }

    /// Appends a middleware to the end of the chain.
    pub fn use_middleware<M: Middleware + 'static>(&mut self, middleware: M) -> &mut Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Appends an already shared middleware.
    pub fn use_shared(&mut self, middleware: Arc<dyn Middleware>) -> &mut Self {
        self.middleware.push(middleware);
        self
    }

    /// Appends every middleware yielded by `middleware`, in order.
    pub fn use_all<I>(&mut self, middleware: I) -> &mut Self
    where
        I: IntoIterator<Item = Arc<dyn Middleware>>,
    {
        self.middleware.extend(middleware);
        self
    }

    /// Appends a middleware (builder pattern).
    pub fn with<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    /// Runs every middleware around `callback`.
    ///
    /// Returns the callback's result, `Ok(())` if a middleware short-circuits,
    /// or the first error raised anywhere in the chain.
    pub async fn receive_activity_with_status(
        &self,
        ctx: &TurnContext,
        callback: Option<&dyn Bot>,
    ) -> BotResult<()> {
        Next::new(ctx, &self.middleware, callback).run().await
    }

    /// Runs every middleware with no bot callback.
    pub async fn receive_activity(&self, ctx: &TurnContext) -> BotResult<()> {
        self.receive_activity_with_status(ctx, None).await
    }
}

impl Middleware for MiddlewareSet {
    fn on_turn<'a>(&'a self, ctx: &'a TurnContext, next: Next<'a>) -> BoxFuture<'a, BotResult<()>> {
        Next::nested(ctx, &self.middleware, next).run()
    }
}

impl std::fmt::Debug for MiddlewareSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareSet")
            .field("len", &self.middleware.len())
            .finish()
    }
}

// =============================================================================
// Closure middleware
// =============================================================================

/// Middleware backed by a closure. See [`middleware_fn`].
#[derive(Clone)]
pub struct MiddlewareFn<F>(F);

impl<F> Middleware for MiddlewareFn<F>
where
    F: for<'a> Fn(&'a TurnContext, Next<'a>) -> BoxFuture<'a, BotResult<()>> + Send + Sync,
{
    fn on_turn<'a>(&'a self, ctx: &'a TurnContext, next: Next<'a>) -> BoxFuture<'a, BotResult<()>> {
        (self.0)(ctx, next)
    }
}

/// Wraps a closure as [`Middleware`].
///
/// ```rust,ignore
/// adapter.use_middleware(middleware_fn(|ctx, next| {
///     Box::pin(async move {
///         tracing::info!(text = ?ctx.activity().and_then(|a| a.text.as_deref()), "inbound");
///         next.run().await
///     })
/// }));
/// ```
pub fn middleware_fn<F>(f: F) -> MiddlewareFn<F>
where
    F: for<'a> Fn(&'a TurnContext, Next<'a>) -> BoxFuture<'a, BotResult<()>> + Send + Sync,
{
    MiddlewareFn(f)
}
