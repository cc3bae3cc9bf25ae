//! Interception of outbound activity operations.
//!
//! Every send, update and delete issued through a [`TurnContext`] runs
//! through an ordered list of interceptors before the adapter performs the
//! actual channel call. Interceptors follow the same onion discipline as
//! turn middleware:
//!
//! ```text
//! ctx.send_activities(batch)
//!   └─ interceptor #1 ── next.run(batch) ──┐
//!        └─ interceptor #2 ── next.run ──┐ │
//!             └─ adapter.send_activities │ │
//!        ◀──────────── responses ────────┘ │
//!   ◀────────────────── responses ─────────┘
//! ```
//!
//! Each interceptor owns the payload it was handed and may rewrite it
//! before calling [`InterceptNext::run`], inspect the result afterwards, or
//! return without calling `next` at all, in which case the adapter is never
//! reached.
//!
//! The handler list is snapshotted when the operation starts: interceptors
//! registered while an operation is in flight apply to the next operation.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::error::BotResult;
use crate::foundation::context::TurnContext;
use crate::foundation::schema::{Activity, ConversationReference, ResourceResponse};
use crate::framework::BoxFuture;

/// The terminal step of an interception chain.
pub(crate) type Terminal<'a, P, R> = dyn Fn(P) -> BoxFuture<'a, BotResult<R>> + Send + Sync + 'a;

type InterceptFn<P, R> = dyn for<'a> Fn(&'a TurnContext, P, InterceptNext<'a, P, R>) -> BoxFuture<'a, BotResult<R>>
    + Send
    + Sync;

/// A type-erased interceptor for payload `P` producing `R`.
pub struct Interceptor<P, R>(Arc<InterceptFn<P, R>>);

impl<P, R> Interceptor<P, R> {
    /// Wraps a closure as an interceptor.
    ///
    /// ```rust,ignore
    /// let log = Interceptor::new(|_ctx, activities: Vec<Activity>, next| {
    ///     Box::pin(async move {
    ///         let count = activities.len();
    ///         let responses = next.run(activities).await?;
    ///         tracing::info!(count, "sent");
    ///         Ok(responses)
    ///     })
    /// });
    /// ```
    pub fn new<F>(f: F) -> Self
    where
        F: for<'a> Fn(&'a TurnContext, P, InterceptNext<'a, P, R>) -> BoxFuture<'a, BotResult<R>>
            + Send
            + Sync
            + 'static,
    {
        Self(Arc::new(f))
    }
}

impl<P, R> Clone for Interceptor<P, R> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

/// Interceptor over outgoing activity batches.
pub type SendActivitiesHandler = Interceptor<Vec<Activity>, Vec<ResourceResponse>>;
/// Interceptor over activity updates.
pub type UpdateActivityHandler = Interceptor<Activity, ResourceResponse>;
/// Interceptor over activity deletions.
pub type DeleteActivityHandler = Interceptor<ConversationReference, ()>;

/// Continuation handed to a send interceptor.
pub type SendNext<'a> = InterceptNext<'a, Vec<Activity>, Vec<ResourceResponse>>;
/// Continuation handed to an update interceptor.
pub type UpdateNext<'a> = InterceptNext<'a, Activity, ResourceResponse>;
/// Continuation handed to a delete interceptor.
pub type DeleteNext<'a> = InterceptNext<'a, ConversationReference, ()>;

/// The rest of an interception chain.
///
/// Consumed by [`run`](Self::run), so a handler can continue the chain at
/// most once.
pub struct InterceptNext<'a, P, R> {
    ctx: &'a TurnContext,
    handlers: &'a [Interceptor<P, R>],
    terminal: &'a Terminal<'a, P, R>,
}

impl<'a, P, R> InterceptNext<'a, P, R>
where
    P: Send + 'a,
    R: Send + 'a,
{
    pub(crate) fn new(
        ctx: &'a TurnContext,
        handlers: &'a [Interceptor<P, R>],
        terminal: &'a Terminal<'a, P, R>,
    ) -> Self {
        Self {
            ctx,
            handlers,
            terminal,
        }
    }

    /// Passes `payload` to the next interceptor, or to the adapter once the
    /// list is exhausted.
    pub fn run(self, payload: P) -> BoxFuture<'a, BotResult<R>> {
        match self.handlers.split_first() {
            Some((handler, rest)) => {
                trace!(remaining = rest.len(), "Invoking interceptor");
                let next = InterceptNext {
                    ctx: self.ctx,
                    handlers: rest,
                    terminal: self.terminal,
                };
                (handler.0)(self.ctx, payload, next)
            }
            None => (self.terminal)(payload),
        }
    }

    /// Number of interceptors still ahead of the terminal step.
    pub fn remaining(&self) -> usize {
        self.handlers.len()
    }
}

/// The per-turn interceptor lists.
///
/// A [`TurnContext`] and every child context created from it hold the same
/// registry, so an interceptor registered through either is seen by both.
#[derive(Default)]
pub struct InterceptorRegistry {
    send: RwLock<Vec<SendActivitiesHandler>>,
    update: RwLock<Vec<UpdateActivityHandler>>,
    delete: RwLock<Vec<DeleteActivityHandler>>,
}

impl InterceptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_send(&self, handler: SendActivitiesHandler) {
        self.send.write().push(handler);
    }

    pub fn add_update(&self, handler: UpdateActivityHandler) {
        self.update.write().push(handler);
    }

    pub fn add_delete(&self, handler: DeleteActivityHandler) {
        self.delete.write().push(handler);
    }

    /// Snapshot of the send interceptors in registration order.
    pub fn send_handlers(&self) -> Vec<SendActivitiesHandler> {
        self.send.read().clone()
    }

    /// Snapshot of the update interceptors in registration order.
    pub fn update_handlers(&self) -> Vec<UpdateActivityHandler> {
        self.update.read().clone()
    }

    /// Snapshot of the delete interceptors in registration order.
    pub fn delete_handlers(&self) -> Vec<DeleteActivityHandler> {
        self.delete.read().clone()
    }

    /// Returns `(send, update, delete)` handler counts.
    pub fn counts(&self) -> (usize, usize, usize) {
        (
            self.send.read().len(),
            self.update.read().len(),
            self.delete.read().len(),
        )
    }
}

impl std::fmt::Debug for InterceptorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (send, update, delete) = self.counts();
        f.debug_struct("InterceptorRegistry")
            .field("send", &send)
            .field("update", &update)
            .field("delete", &delete)
            .finish()
    }
}
