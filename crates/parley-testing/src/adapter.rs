//! In-memory adapter.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use parley_core::{
    Activity, Bot, BotAdapter, BotResult, ChannelAccount, ConfigurableAdapter,
    ConversationAccount, ConversationReference, Middleware, Pipeline, ResourceResponse,
    TurnContext, activity_types,
};
use serde::Deserialize;
use time::OffsetDateTime;
use tracing::{debug, trace};

/// Configuration section (`adapters.test`) for a [`TestAdapter`].
///
/// Every field defaults to the addressing of [`TestAdapter::new`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TestAdapterConfig {
    pub channel_id: String,
    pub conversation_id: String,
    pub user_id: String,
    pub user_name: String,
    pub bot_id: String,
    pub bot_name: String,
    pub locale: String,
    /// Keep trace activities in the reply queue.
    pub send_trace_activities: bool,
}

impl Default for TestAdapterConfig {
    fn default() -> Self {
        Self {
            channel_id: "test".into(),
            conversation_id: "Convo1".into(),
            user_id: "user".into(),
            user_name: "User1".into(),
            bot_id: "bot".into(),
            bot_name: "Bot".into(),
            locale: "en-US".into(),
            send_trace_activities: false,
        }
    }
}

impl TestAdapterConfig {
    /// Fields copied onto every inbound activity that does not set them.
    fn template(&self) -> Activity {
        let mut user = ChannelAccount::new(self.user_id.as_str(), self.user_name.as_str());
        user.role = Some("user".into());
        let mut bot = ChannelAccount::new(self.bot_id.as_str(), self.bot_name.as_str());
        bot.role = Some("bot".into());

        Activity {
            channel_id: Some(self.channel_id.clone()),
            service_url: Some("https://test.com".into()),
            locale: Some(self.locale.clone()),
            from: Some(user),
            recipient: Some(bot),
            conversation: Some(ConversationAccount::new(self.conversation_id.as_str())),
            ..Default::default()
        }
    }
}

#[derive(Default)]
struct Channel {
    next_inbound_id: u64,
    next_reply_id: u64,
    replies: VecDeque<Activity>,
    updated: Vec<Activity>,
    deleted: Vec<ConversationReference>,
}

struct Shared {
    template: Activity,
    send_trace_activities: AtomicBool,
    channel: Mutex<Channel>,
}

/// An adapter that keeps everything the bot sends in memory.
///
/// Replies queue up in arrival order and are read back with
/// [`next_reply`](Self::next_reply). Clones share the reply queue, so the
/// copy handed to a [`TurnContext`] and the one held by the test observe
/// the same channel.
///
/// ```rust,ignore
/// let adapter = TestAdapter::new().with_middleware(MyMiddleware);
/// adapter.send("hi", &bot).await?;
/// assert_eq!(adapter.next_reply().unwrap().text.as_deref(), Some("hello"));
/// ```
#[derive(Clone)]
pub struct TestAdapter {
    pipeline: Pipeline,
    shared: Arc<Shared>,
}

impl Default for TestAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl TestAdapter {
    pub fn new() -> Self {
        Self::with_template(TestAdapterConfig::default().template())
    }

    /// Uses `template` for the addressing of inbound activities.
    pub fn with_template(template: Activity) -> Self {
        Self {
            pipeline: Pipeline::new(),
            shared: Arc::new(Shared {
                template,
                send_trace_activities: AtomicBool::new(false),
                channel: Mutex::new(Channel::default()),
            }),
        }
    }

    /// Keeps trace activities in the reply queue instead of dropping them.
    pub fn with_trace_activities(self) -> Self {
        self.shared.send_trace_activities.store(true, Ordering::Relaxed);
        self
    }

    /// Appends a middleware (builder pattern).
    pub fn with_middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.use_middleware(middleware);
        self
    }

    /// The addressing template for inbound activities.
    pub fn template(&self) -> &Activity {
        &self.shared.template
    }

    /// A conversation reference matching the template.
    pub fn conversation_reference(&self) -> ConversationReference {
        TurnContext::get_conversation_reference(&self.shared.template)
    }

    /// Builds an inbound message addressed per the template.
    pub fn make_activity(&self, text: impl Into<String>) -> Activity {
        self.complete_inbound(Activity::message(text))
    }

    fn complete_inbound(&self, mut activity: Activity) -> Activity {
        let template = &self.shared.template;
        let id = {
            let mut channel = self.shared.channel.lock();
            channel.next_inbound_id += 1;
            channel.next_inbound_id
        };

        activity
            .activity_type
            .get_or_insert_with(|| activity_types::MESSAGE.to_string());
        activity.id.get_or_insert_with(|| id.to_string());
        activity.timestamp.get_or_insert_with(OffsetDateTime::now_utc);
        fill(&mut activity.channel_id, &template.channel_id);
        fill(&mut activity.service_url, &template.service_url);
        fill(&mut activity.locale, &template.locale);
        fill(&mut activity.from, &template.from);
        fill(&mut activity.recipient, &template.recipient);
        fill(&mut activity.conversation, &template.conversation);
        activity
    }

    /// Runs a full turn for `activity` through the pipeline and `bot`.
    ///
    /// Missing addressing fields are taken from the template.
    pub async fn receive_activity(
        &self,
        activity: impl Into<Activity>,
        bot: &dyn Bot,
    ) -> BotResult<TurnContext> {
        let activity = self.complete_inbound(activity.into());
        debug!(id = ?activity.id, text = ?activity.text, "Test turn");

        let ctx = TurnContext::new(Arc::new(self.clone()), activity);
        self.run_pipeline(&ctx, Some(bot)).await?;
        Ok(ctx)
    }

    /// Sends a user message and runs the turn.
    pub async fn send(&self, text: &str, bot: &dyn Bot) -> BotResult<TurnContext> {
        self.receive_activity(text, bot).await
    }

    /// Pops the oldest unread reply.
    pub fn next_reply(&self) -> Option<Activity> {
        self.shared.channel.lock().replies.pop_front()
    }

    /// Drains every unread reply.
    pub fn take_replies(&self) -> Vec<Activity> {
        self.shared.channel.lock().replies.drain(..).collect()
    }

    /// Activities passed to [`BotAdapter::update_activity`].
    pub fn updated_activities(&self) -> Vec<Activity> {
        self.shared.channel.lock().updated.clone()
    }

    /// References passed to [`BotAdapter::delete_activity`].
    pub fn deleted_references(&self) -> Vec<ConversationReference> {
        self.shared.channel.lock().deleted.clone()
    }
}

fn fill<T: Clone>(field: &mut Option<T>, template: &Option<T>) {
    if field.is_none() {
        field.clone_from(template);
    }
}

#[async_trait]
impl BotAdapter for TestAdapter {
    fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    fn pipeline_mut(&mut self) -> &mut Pipeline {
        &mut self.pipeline
    }

    async fn send_activities(
        &self,
        _ctx: &TurnContext,
        activities: &[Activity],
    ) -> BotResult<Vec<ResourceResponse>> {
        let mut responses = Vec::with_capacity(activities.len());
        for activity in activities {
            if activity.is_type(activity_types::DELAY) {
                let delay = activity.delay_duration();
                trace!(?delay, "Delay activity");
                tokio::time::sleep(delay).await;
            }

            let id = {
                let mut channel = self.shared.channel.lock();
                channel.next_reply_id += 1;
                let id = format!("reply-{}", channel.next_reply_id);

                let dropped = activity.is_type(activity_types::DELAY)
                    || (activity.is_type(activity_types::TRACE)
                        && !self.shared.send_trace_activities.load(Ordering::Relaxed));
                if !dropped {
                    let mut reply = activity.clone();
                    reply.id = Some(id.clone());
                    channel.replies.push_back(reply);
                }
                id
            };
            responses.push(ResourceResponse::new(id));
        }
        Ok(responses)
    }

    async fn update_activity(
        &self,
        _ctx: &TurnContext,
        activity: &Activity,
    ) -> BotResult<ResourceResponse> {
        self.shared.channel.lock().updated.push(activity.clone());
        Ok(ResourceResponse::new(activity.id.clone().unwrap_or_default()))
    }

    async fn delete_activity(
        &self,
        _ctx: &TurnContext,
        reference: &ConversationReference,
    ) -> BotResult<()> {
        self.shared.channel.lock().deleted.push(reference.clone());
        Ok(())
    }
}

impl ConfigurableAdapter for TestAdapter {
    type Config = TestAdapterConfig;

    fn name() -> &'static str {
        "test"
    }

    fn from_config(config: Self::Config) -> BotResult<Self> {
        let adapter = Self::with_template(config.template());
        if config.send_trace_activities {
            return Ok(adapter.with_trace_activities());
        }
        Ok(adapter)
    }
}

impl std::fmt::Debug for TestAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestAdapter")
            .field("pipeline", &self.pipeline)
            .field("pending_replies", &self.shared.channel.lock().replies.len())
            .finish()
    }
}
