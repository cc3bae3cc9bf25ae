//! Transcript logging middleware.

use std::sync::Arc;

use parking_lot::Mutex;
use parley_core::{
    Activity, BotResult, BoxFuture, ChannelAccount, Middleware, Next, TurnContext,
    activity_types, event_names,
};
use time::OffsetDateTime;
use tracing::{trace, warn};
use uuid::Uuid;

use super::logger::TranscriptLogger;

type Queue = Arc<Mutex<Vec<Activity>>>;

/// Logs every inbound and outbound activity of a turn.
///
/// Activities are queued while the turn runs and handed to the logger
/// after the rest of the pipeline returns, in the order they happened.
/// Entries without a timestamp are stamped when they are queued.
///
/// - the inbound activity, with the sender's role defaulted to `user`
///   (`ContinueConversation` events are not logged)
/// - each sent activity, with the id the channel assigned to it
/// - each update, logged as `messageUpdate`
/// - each delete, logged as `messageDelete`
pub struct TranscriptLoggerMiddleware {
    logger: Arc<dyn TranscriptLogger>,
}

impl TranscriptLoggerMiddleware {
    pub fn new(logger: impl TranscriptLogger + 'static) -> Self {
        Self {
            logger: Arc::new(logger),
        }
    }

    /// Uses an already shared logger, e.g. a store the application also
    /// reads from.
    pub fn from_shared(logger: Arc<dyn TranscriptLogger>) -> Self {
        Self { logger }
    }

    fn register_interceptors(ctx: &TurnContext, queue: &Queue) {
        let sent = Arc::clone(queue);
        ctx.on_send_activities(move |_ctx, activities, next| {
            let queue = Arc::clone(&sent);
            Box::pin(async move {
                let logged = activities.clone();
                let responses = next.run(activities).await?;

                let mut queue = queue.lock();
                for (index, mut activity) in logged.into_iter().enumerate() {
                    if let Some(response) = responses.get(index) {
                        activity.id = Some(response.id.clone());
                    }
                    activity.timestamp.get_or_insert_with(OffsetDateTime::now_utc);
                    if activity.id.as_deref().is_none_or(str::is_empty) {
                        activity.id = Some(generated_id(&activity));
                    }
                    queue.push(activity);
                }
                Ok(responses)
            })
        });

        let updated = Arc::clone(queue);
        ctx.on_update_activity(move |_ctx, activity, next| {
            let queue = Arc::clone(&updated);
            Box::pin(async move {
                let mut logged = activity.clone();
                let response = next.run(activity).await?;
                logged.activity_type = Some(activity_types::MESSAGE_UPDATE.to_string());
                logged.timestamp.get_or_insert_with(OffsetDateTime::now_utc);
                queue.lock().push(logged);
                Ok(response)
            })
        });

        let deleted = Arc::clone(queue);
        ctx.on_delete_activity(move |_ctx, reference, next| {
            let queue = Arc::clone(&deleted);
            Box::pin(async move {
                let mut logged = Activity::new(activity_types::MESSAGE_DELETE);
                logged.id.clone_from(&reference.activity_id);
                TurnContext::apply_conversation_reference(&mut logged, &reference, false);
                next.run(reference).await?;
                logged.timestamp = Some(OffsetDateTime::now_utc());
                queue.lock().push(logged);
                Ok(())
            })
        });
    }

    async fn flush(&self, queue: &Queue) -> BotResult<()> {
        let activities = std::mem::take(&mut *queue.lock());
        trace!(count = activities.len(), "Flushing transcript");
        for activity in &activities {
            self.logger.log_activity(activity).await?;
        }
        Ok(())
    }
}

fn is_continue_conversation(activity: &Activity) -> bool {
    activity.is_type(activity_types::EVENT)
        && activity.name.as_deref() == Some(event_names::CONTINUE_CONVERSATION)
}

/// Id for a sent activity the channel did not acknowledge with one:
/// `g_` + 5 random characters + milliseconds since the epoch.
fn generated_id(activity: &Activity) -> String {
    let reference = activity.timestamp.unwrap_or_else(OffsetDateTime::now_utc);
    let millis = reference.unix_timestamp_nanos() / 1_000_000;
    let random = Uuid::new_v4().simple().to_string();
    format!("g_{}{millis}", &random[..5])
}

impl Middleware for TranscriptLoggerMiddleware {
    fn on_turn<'a>(&'a self, ctx: &'a TurnContext, next: Next<'a>) -> BoxFuture<'a, BotResult<()>> {
        Box::pin(async move {
            let queue: Queue = Arc::default();

            if let Some(inbound) = ctx.activity() {
                let mut logged = inbound.clone();
                logged
                    .from
                    .get_or_insert_with(ChannelAccount::default)
                    .role
                    .get_or_insert_with(|| "user".to_string());
                logged.timestamp.get_or_insert_with(OffsetDateTime::now_utc);
                if !is_continue_conversation(&logged) {
                    queue.lock().push(logged);
                }
            }

            Self::register_interceptors(ctx, &queue);

            let result = next.run().await;
            let flushed = self.flush(&queue).await;
            match (result, flushed) {
                (Err(err), Err(flush_err)) => {
                    warn!(error = %flush_err, "Failed to flush transcript after turn error");
                    Err(err)
                }
                (result, flushed) => result.and(flushed),
            }
        })
    }
}
