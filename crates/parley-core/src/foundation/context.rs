//! Per-turn context.
//!
//! A [`TurnContext`] is created for each inbound activity (or proactive
//! continuation) and dropped when the turn ends. It carries:
//!
//! - the inbound [`Activity`],
//! - the turn-scoped [`TurnState`],
//! - the monotonic `responded` flag,
//! - the [`InterceptorRegistry`] every outbound send/update/delete runs
//!   through before the adapter sees it.
//!
//! Everything except the adapter handle is per-turn. A child context made
//! with [`TurnContext::child`] shares all of it by `Arc`, so interceptors
//! registered on the child fire for sends issued through the parent and
//! vice versa.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::{BotError, BotResult};
use crate::foundation::schema::{
    Activity, ConversationReference, Mention, ResourceResponse, activity_types, event_names,
    input_hints,
};
use crate::foundation::state::TurnState;
use crate::framework::BoxFuture;
use crate::framework::interceptor::{
    DeleteNext, InterceptNext, Interceptor, InterceptorRegistry, SendNext, UpdateNext,
};
use crate::integration::adapter::BotAdapter;

/// Turn state key under which an `invokeResponse` activity is stored when
/// replies are buffered instead of sent.
pub const INVOKE_RESPONSE_KEY: &str = "BotAdapter.InvokeResponse";

/// The mutable per-turn object handed to middleware and bot logic.
pub struct TurnContext {
    adapter: Arc<dyn BotAdapter>,
    activity: Option<Arc<Activity>>,
    responded: Arc<AtomicBool>,
    turn_state: Arc<TurnState>,
    interceptors: Arc<InterceptorRegistry>,
    buffered_replies: Arc<Mutex<Vec<Activity>>>,
    is_child: bool,
}

impl TurnContext {
    /// Creates the context for one inbound activity.
    pub fn new(adapter: Arc<dyn BotAdapter>, activity: Activity) -> Self {
        Self::build(adapter, Some(Arc::new(activity)))
    }

    /// Creates a context with no inbound activity.
    ///
    /// [`BotAdapter::run_pipeline`] skips middleware for such contexts and
    /// calls the bot directly.
    pub fn without_activity(adapter: Arc<dyn BotAdapter>) -> Self {
        Self::build(adapter, None)
    }

    fn build(adapter: Arc<dyn BotAdapter>, activity: Option<Arc<Activity>>) -> Self {
        Self {
            adapter,
            activity,
            responded: Arc::new(AtomicBool::new(false)),
            turn_state: Arc::new(TurnState::new()),
            interceptors: Arc::new(InterceptorRegistry::new()),
            buffered_replies: Arc::new(Mutex::new(Vec::new())),
            is_child: false,
        }
    }

    /// Creates a child context for the same turn.
    ///
    /// The child shares the adapter, activity, `responded` flag, turn state,
    /// buffered replies and interceptor registry with `self`. Only one level
    /// of nesting is supported: calling this on a child fails with a
    /// contract violation.
    pub fn child(&self) -> BotResult<TurnContext> {
        if self.is_child {
            return Err(BotError::contract(
                "child contexts cannot themselves create child contexts",
            ));
        }
        Ok(Self {
            adapter: Arc::clone(&self.adapter),
            activity: self.activity.clone(),
            responded: Arc::clone(&self.responded),
            turn_state: Arc::clone(&self.turn_state),
            interceptors: Arc::clone(&self.interceptors),
            buffered_replies: Arc::clone(&self.buffered_replies),
            is_child: true,
        })
    }

    /// Returns `true` if this context was created by [`child`](Self::child).
    pub fn is_child(&self) -> bool {
        self.is_child
    }

    // ─── Accessors ────────────────────────────────────────────────────────────

    /// The adapter that owns this turn.
    pub fn adapter(&self) -> &Arc<dyn BotAdapter> {
        &self.adapter
    }

    /// The inbound activity, if the turn has one.
    pub fn activity(&self) -> Option<&Activity> {
        self.activity.as_deref()
    }

    fn require_activity(&self) -> BotResult<&Activity> {
        self.activity()
            .ok_or_else(|| BotError::contract("the turn has no inbound activity"))
    }

    /// Turn-scoped named values.
    pub fn turn_state(&self) -> &TurnState {
        &self.turn_state
    }

    /// The interceptor lists shared by this context and its child.
    pub fn interceptors(&self) -> &InterceptorRegistry {
        &self.interceptors
    }

    /// `true` once at least one non-trace activity was sent this turn.
    pub fn responded(&self) -> bool {
        self.responded.load(Ordering::SeqCst)
    }

    /// Marks the turn as responded.
    ///
    /// The flag is monotonic: passing `false` fails with
    /// [`BotError::RespondedReset`] and leaves it unchanged.
    pub fn set_responded(&self, responded: bool) -> BotResult<()> {
        if !responded {
            return Err(BotError::RespondedReset);
        }
        self.responded.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Replies buffered because the inbound activity asked for
    /// `expectReplies` delivery.
    pub fn buffered_reply_activities(&self) -> Vec<Activity> {
        self.buffered_replies.lock().clone()
    }

    /// Drains the buffered replies.
    pub fn take_buffered_replies(&self) -> Vec<Activity> {
        std::mem::take(&mut *self.buffered_replies.lock())
    }

    // ─── Interceptor registration ─────────────────────────────────────────────

    /// Registers a handler that runs around every outgoing batch.
    ///
    /// ```rust,ignore
    /// ctx.on_send_activities(|_ctx, mut activities, next| {
    ///     Box::pin(async move {
    ///         for activity in &mut activities {
    ///             activity.text = activity.text.take().map(|t| t.to_uppercase());
    ///         }
    ///         next.run(activities).await
    ///     })
    /// });
    /// ```
    pub fn on_send_activities<F>(&self, handler: F) -> &Self
    where
        F: for<'a> Fn(
                &'a TurnContext,
                Vec<Activity>,
                SendNext<'a>,
            ) -> BoxFuture<'a, BotResult<Vec<ResourceResponse>>>
            + Send
            + Sync
            + 'static,
    {
        self.interceptors.add_send(Interceptor::new(handler));
        self
    }

    /// Registers a handler that runs around every activity update.
    pub fn on_update_activity<F>(&self, handler: F) -> &Self
    where
        F: for<'a> Fn(&'a TurnContext, Activity, UpdateNext<'a>) -> BoxFuture<'a, BotResult<ResourceResponse>>
            + Send
            + Sync
            + 'static,
    {
        self.interceptors.add_update(Interceptor::new(handler));
        self
    }

    /// Registers a handler that runs around every activity deletion.
    pub fn on_delete_activity<F>(&self, handler: F) -> &Self
    where
        F: for<'a> Fn(&'a TurnContext, ConversationReference, DeleteNext<'a>) -> BoxFuture<'a, BotResult<()>>
            + Send
            + Sync
            + 'static,
    {
        self.interceptors.add_delete(Interceptor::new(handler));
        self
    }

    // ─── Outbound operations ──────────────────────────────────────────────────

    /// Sends a single activity, or a plain text message via `From<&str>`.
    ///
    /// Returns the channel's response, or `None` if the channel returned
    /// nothing for it.
    pub async fn send_activity(
        &self,
        activity: impl Into<Activity>,
    ) -> BotResult<Option<ResourceResponse>> {
        let responses = self.send_activities(vec![activity.into()]).await?;
        Ok(responses.into_iter().next())
    }

    /// Sends a text message with optional speech and input hint.
    ///
    /// The input hint defaults to `acceptingInput`.
    pub async fn send_text(
        &self,
        text: impl Into<String>,
        speak: Option<&str>,
        input_hint: Option<&str>,
    ) -> BotResult<Option<ResourceResponse>> {
        let mut activity = Activity::message(text)
            .with_input_hint(input_hint.unwrap_or(input_hints::ACCEPTING_INPUT));
        activity.speak = speak.map(str::to_string);
        self.send_activity(activity).await
    }

    /// Sends a trace activity. Traces never mark the turn as responded.
    pub async fn send_trace_activity(
        &self,
        name: impl Into<String>,
        value: Option<Value>,
        value_type: Option<&str>,
        label: Option<&str>,
    ) -> BotResult<Option<ResourceResponse>> {
        let activity = Activity::trace(
            name,
            value,
            value_type.map(str::to_string),
            label.map(str::to_string),
        );
        self.send_activity(activity).await
    }

    /// Sends a batch of activities through the send interceptors.
    ///
    /// Each activity is addressed as a reply to the inbound activity, gets
    /// type `message` and input hint `acceptingInput` when unset, and has
    /// its id cleared. Once the adapter accepts a batch containing at least
    /// one non-trace activity, the turn is marked as responded.
    ///
    /// Fails with a contract violation if `activities` is empty.
    pub async fn send_activities(
        &self,
        activities: Vec<Activity>,
    ) -> BotResult<Vec<ResourceResponse>> {
        if activities.is_empty() {
            return Err(BotError::contract(
                "send_activities requires at least one activity",
            ));
        }

        let reference = self.activity().map(Self::get_conversation_reference);
        let output: Vec<Activity> = activities
            .into_iter()
            .map(|mut activity| {
                if let Some(reference) = &reference {
                    Self::apply_conversation_reference(&mut activity, reference, false);
                }
                activity
                    .activity_type
                    .get_or_insert_with(|| activity_types::MESSAGE.to_string());
                activity
                    .input_hint
                    .get_or_insert_with(|| input_hints::ACCEPTING_INPUT.to_string());
                activity.id = None;
                activity
            })
            .collect();

        let handlers = self.interceptors.send_handlers();
        trace!(count = output.len(), interceptors = handlers.len(), "Sending activities");

        let deliver = |activities: Vec<Activity>| {
            Box::pin(self.deliver_activities(activities))
                as BoxFuture<'_, BotResult<Vec<ResourceResponse>>>
        };
        InterceptNext::new(self, &handlers, &deliver)
            .run(output)
            .await
    }

    /// Terminal step of the send chain.
    async fn deliver_activities(
        &self,
        activities: Vec<Activity>,
    ) -> BotResult<Vec<ResourceResponse>> {
        let sent_non_trace = activities
            .iter()
            .any(|a| !a.is_type(activity_types::TRACE));

        let responses = if self.activity().is_some_and(Activity::expects_replies) {
            self.buffer_replies(activities)?
        } else {
            self.adapter.send_activities(self, &activities).await?
        };

        if sent_non_trace {
            self.responded.store(true, Ordering::SeqCst);
        }
        Ok(responses)
    }

    fn buffer_replies(&self, activities: Vec<Activity>) -> BotResult<Vec<ResourceResponse>> {
        debug!(count = activities.len(), "Buffering replies for expectReplies delivery");
        let mut responses = Vec::with_capacity(activities.len());
        let mut buffered = self.buffered_replies.lock();
        for activity in activities {
            if activity.is_type(activity_types::INVOKE_RESPONSE) {
                self.turn_state.set(INVOKE_RESPONSE_KEY, activity.clone())?;
            }
            buffered.push(activity);
            responses.push(ResourceResponse::default());
        }
        Ok(responses)
    }

    /// Replaces a previously sent activity through the update interceptors.
    pub async fn update_activity(&self, mut activity: Activity) -> BotResult<ResourceResponse> {
        if let Some(inbound) = self.activity() {
            let reference = Self::get_conversation_reference(inbound);
            Self::apply_conversation_reference(&mut activity, &reference, false);
        }

        let handlers = self.interceptors.update_handlers();
        let deliver = |activity: Activity| {
            Box::pin(async move { self.adapter.update_activity(self, &activity).await })
                as BoxFuture<'_, BotResult<ResourceResponse>>
        };
        InterceptNext::new(self, &handlers, &deliver)
            .run(activity)
            .await
    }

    /// Deletes a previously sent activity in the current conversation.
    pub async fn delete_activity(&self, activity_id: impl Into<String>) -> BotResult<()> {
        let mut reference = Self::get_conversation_reference(self.require_activity()?);
        reference.activity_id = Some(activity_id.into());
        self.delete_activity_reference(reference).await
    }

    /// Deletes the activity identified by `reference`.
    pub async fn delete_activity_reference(&self, reference: ConversationReference) -> BotResult<()> {
        let handlers = self.interceptors.delete_handlers();
        let deliver = |reference: ConversationReference| {
            Box::pin(async move { self.adapter.delete_activity(self, &reference).await })
                as BoxFuture<'_, BotResult<()>>
        };
        InterceptNext::new(self, &handlers, &deliver)
            .run(reference)
            .await
    }

    // ─── Addressing helpers ───────────────────────────────────────────────────

    /// Captures the addressing of `activity` so the conversation can be
    /// resumed later.
    pub fn get_conversation_reference(activity: &Activity) -> ConversationReference {
        ConversationReference {
            activity_id: activity.id.clone(),
            user: activity.from.clone(),
            bot: activity.recipient.clone(),
            conversation: activity.conversation.clone(),
            channel_id: activity.channel_id.clone(),
            locale: activity.locale.clone(),
            service_url: activity.service_url.clone(),
        }
    }

    /// Like [`get_conversation_reference`](Self::get_conversation_reference),
    /// but pointing at the reply the channel acknowledged with `reply`.
    pub fn get_reply_conversation_reference(
        activity: &Activity,
        reply: &ResourceResponse,
    ) -> ConversationReference {
        let mut reference = Self::get_conversation_reference(activity);
        reference.activity_id = Some(reply.id.clone());
        reference
    }

    /// Copies the addressing of `reference` onto `activity`.
    ///
    /// Outgoing (`is_incoming == false`): `from` is the bot, `recipient` the
    /// user and `reply_to_id` the referenced activity. Incoming: `from` is
    /// the user, `recipient` the bot and `id` the referenced activity.
    pub fn apply_conversation_reference(
        activity: &mut Activity,
        reference: &ConversationReference,
        is_incoming: bool,
    ) {
        activity.channel_id.clone_from(&reference.channel_id);
        activity.service_url.clone_from(&reference.service_url);
        activity.conversation.clone_from(&reference.conversation);
        if reference.locale.is_some() {
            activity.locale.clone_from(&reference.locale);
        }

        if is_incoming {
            activity.from.clone_from(&reference.user);
            activity.recipient.clone_from(&reference.bot);
            if reference.activity_id.is_some() {
                activity.id.clone_from(&reference.activity_id);
            }
        } else {
            activity.from.clone_from(&reference.bot);
            activity.recipient.clone_from(&reference.user);
            if reference.activity_id.is_some() {
                activity.reply_to_id.clone_from(&reference.activity_id);
            }
        }
    }

    /// Builds the event activity that starts a proactive turn.
    pub fn get_continuation_activity(reference: &ConversationReference) -> Activity {
        let mut activity = Activity::new(activity_types::EVENT);
        activity.name = Some(event_names::CONTINUE_CONVERSATION.to_string());
        activity.id = Some(Uuid::new_v4().to_string());
        activity.channel_id.clone_from(&reference.channel_id);
        activity.service_url.clone_from(&reference.service_url);
        activity.conversation.clone_from(&reference.conversation);
        activity.locale.clone_from(&reference.locale);
        activity.from.clone_from(&reference.user);
        activity.recipient.clone_from(&reference.bot);
        activity.relates_to = Some(reference.clone());
        activity
    }

    // ─── Mentions ─────────────────────────────────────────────────────────────

    /// Every `mention` entity on `activity`.
    pub fn get_mentions(activity: &Activity) -> Vec<Mention> {
        activity.mentions()
    }

    /// Strips mentions of the recipient (the bot) from the message text and
    /// returns the new text.
    pub fn remove_recipient_mention(activity: &mut Activity) -> Option<String> {
        match activity.recipient.as_ref().map(|r| r.id.clone()) {
            Some(id) => Self::remove_mention_text(activity, &id),
            None => activity.text.clone(),
        }
    }

    /// Strips mentions of account `id` from the message text and returns
    /// the new text.
    pub fn remove_mention_text(activity: &mut Activity, id: &str) -> Option<String> {
        for mention in activity.mentions() {
            if mention.mentioned.id != id {
                continue;
            }
            let Some(name) = mention.text.as_deref().and_then(mention_name) else {
                continue;
            };
            if let Some(text) = activity.text.as_mut() {
                *text = text.replace(name, "").replace("<at></at>", "");
            }
        }
        activity.text.clone()
    }
}

/// Extracts `name` from `<at ...>name</at>` markup.
fn mention_name(markup: &str) -> Option<&str> {
    let lower = markup.to_ascii_lowercase();
    let open = lower.find("<at")?;
    let start = open + lower[open..].find('>')? + 1;
    let end = start + lower[start..].find("</at>")?;
    Some(&markup[start..end])
}

impl std::fmt::Debug for TurnContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnContext")
            .field("activity", &self.activity)
            .field("responded", &self.responded())
            .field("turn_state", &self.turn_state)
            .field("interceptors", &self.interceptors)
            .field("is_child", &self.is_child)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::schema::{ChannelAccount, ConversationAccount, delivery_modes};
    use crate::testing::{MockAdapter, inbound_message};
    use std::sync::atomic::AtomicUsize;
    use tokio_test::{assert_err, assert_ok};

    fn context(adapter: &Arc<MockAdapter>) -> TurnContext {
        TurnContext::new(adapter.clone(), inbound_message("hello"))
    }

    #[tokio::test]
    async fn test_send_activity_normalizes_and_addresses() {
        let adapter = MockAdapter::shared();
        let ctx = context(&adapter);

        let mut outgoing = Activity::default();
        outgoing.text = Some("reply".into());
        outgoing.id = Some("caller-chosen".into());
        let response = ctx.send_activity(outgoing).await.unwrap();

        assert_eq!(response, Some(ResourceResponse::new("1")));
        let sent = adapter.sent();
        assert_eq!(sent.len(), 1);
        let sent = &sent[0];
        assert_eq!(sent.activity_type.as_deref(), Some(activity_types::MESSAGE));
        assert_eq!(sent.input_hint.as_deref(), Some(input_hints::ACCEPTING_INPUT));
        assert_eq!(sent.id, None);
        assert_eq!(sent.reply_to_id.as_deref(), Some("inbound-1"));
        assert_eq!(sent.from.as_ref().map(|a| a.id.as_str()), Some("bot"));
        assert_eq!(sent.recipient.as_ref().map(|a| a.id.as_str()), Some("user"));
        assert_eq!(sent.conversation_id(), Some("convo"));
        assert!(ctx.responded());
    }

    #[tokio::test]
    async fn test_send_text_uses_speak_and_hint() {
        let adapter = MockAdapter::shared();
        let ctx = context(&adapter);

        ctx.send_text("hi", Some("hi there"), Some(input_hints::EXPECTING_INPUT))
            .await
            .unwrap();

        let sent = adapter.sent();
        assert_eq!(sent[0].speak.as_deref(), Some("hi there"));
        assert_eq!(sent[0].input_hint.as_deref(), Some(input_hints::EXPECTING_INPUT));
    }

    #[tokio::test]
    async fn test_empty_batch_is_a_contract_violation() {
        let adapter = MockAdapter::shared();
        let ctx = context(&adapter);

        let err = ctx.send_activities(Vec::new()).await.unwrap_err();
        assert!(matches!(err, BotError::Contract(_)));
        assert!(adapter.sent().is_empty());
    }

    #[tokio::test]
    async fn test_responded_is_monotonic() {
        let adapter = MockAdapter::shared();
        let ctx = context(&adapter);

        assert!(!ctx.responded());
        assert!(matches!(ctx.set_responded(false), Err(BotError::RespondedReset)));
        assert!(!ctx.responded());

        assert_ok!(ctx.set_responded(true));
        assert!(ctx.responded());
        assert_err!(ctx.set_responded(false));
        assert!(ctx.responded());
    }

    #[tokio::test]
    async fn test_trace_only_batch_does_not_mark_responded() {
        let adapter = MockAdapter::shared();
        let ctx = context(&adapter);

        ctx.send_trace_activity("debug", Some(serde_json::json!({ "step": 1 })), None, None)
            .await
            .unwrap();

        assert_eq!(adapter.sent().len(), 1);
        assert!(!ctx.responded());
    }

    #[tokio::test]
    async fn test_trace_and_message_batch_marks_responded() {
        let adapter = MockAdapter::shared();
        let ctx = context(&adapter);

        let responses = ctx
            .send_activities(vec![
                Activity::trace("trace", None, None, None),
                Activity::message("hi"),
            ])
            .await
            .unwrap();

        assert_eq!(responses.len(), 2);
        let sent = adapter.sent();
        assert!(sent[0].is_type(activity_types::TRACE));
        assert!(sent[1].is_type(activity_types::MESSAGE));
        assert!(ctx.responded());
    }

    #[tokio::test]
    async fn test_failed_send_does_not_mark_responded() {
        let adapter = MockAdapter::shared();
        adapter.fail_sends("channel down");
        let ctx = context(&adapter);

        let err = ctx.send_activity("hi").await.unwrap_err();
        assert!(matches!(err, BotError::Channel(ref msg) if msg == "channel down"));
        assert!(!ctx.responded());
    }

    #[tokio::test]
    async fn test_send_interceptors_run_in_onion_order() {
        let adapter = MockAdapter::shared();
        let ctx = context(&adapter);
        let log = Arc::new(Mutex::new(Vec::new()));

        for name in ["first", "second"] {
            let log = log.clone();
            ctx.on_send_activities(move |_ctx, activities, next| {
                let log = log.clone();
                Box::pin(async move {
                    log.lock().push(format!("{name}:before"));
                    let responses = next.run(activities).await;
                    log.lock().push(format!("{name}:after"));
                    responses
                })
            });
        }

        ctx.send_activity("hi").await.unwrap();

        assert_eq!(
            *log.lock(),
            vec!["first:before", "second:before", "second:after", "first:after"]
        );
    }

    #[tokio::test]
    async fn test_send_interceptor_can_rewrite_payload() {
        let adapter = MockAdapter::shared();
        let ctx = context(&adapter);

        ctx.on_send_activities(|_ctx, mut activities, next| {
            Box::pin(async move {
                for activity in &mut activities {
                    activity.text = activity.text.take().map(|t| t.to_uppercase());
                }
                next.run(activities).await
            })
        });

        ctx.send_activity("shout").await.unwrap();
        assert_eq!(adapter.sent()[0].text.as_deref(), Some("SHOUT"));
    }

    #[tokio::test]
    async fn test_send_interceptor_short_circuit_skips_adapter() {
        let adapter = MockAdapter::shared();
        let ctx = context(&adapter);

        ctx.on_send_activities(|_ctx, activities, _next| {
            Box::pin(async move { Ok(vec![ResourceResponse::new("held"); activities.len()]) })
        });

        let response = ctx.send_activity("hi").await.unwrap();
        assert_eq!(response, Some(ResourceResponse::new("held")));
        assert!(adapter.sent().is_empty());
        assert!(!ctx.responded());
    }

    #[tokio::test]
    async fn test_interceptor_registered_on_child_is_visible_to_parent() {
        let adapter = MockAdapter::shared();
        let parent = context(&adapter);
        let child = parent.child().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        child.on_send_activities(move |_ctx, activities, next| {
            counter.fetch_add(1, Ordering::SeqCst);
            next.run(activities)
        });

        parent.send_activity("from parent").await.unwrap();
        child.send_activity("from child").await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(parent.responded());
        child.turn_state().set("shared", 1u8).unwrap();
        assert!(parent.turn_state().has("shared"));
    }

    #[tokio::test]
    async fn test_child_of_child_is_rejected() {
        let adapter = MockAdapter::shared();
        let parent = context(&adapter);
        let child = parent.child().unwrap();

        assert!(child.is_child());
        let Err(err) = child.child() else {
            panic!("grandchild context was created");
        };
        assert!(matches!(err, BotError::Contract(_)));
        assert!(err.is_contract_violation());
    }

    #[tokio::test]
    async fn test_intercept_next_reports_remaining_handlers() {
        let adapter = MockAdapter::shared();
        let ctx = context(&adapter);
        let seen = Arc::new(Mutex::new(Vec::new()));

        for _ in 0..2 {
            let seen = seen.clone();
            ctx.on_send_activities(move |_ctx, activities, next| {
                seen.lock().push(next.remaining());
                next.run(activities)
            });
        }

        ctx.send_activity("hi").await.unwrap();
        assert_eq!(*seen.lock(), vec![1, 0]);
        assert_eq!(adapter.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_interceptor_added_during_send_applies_to_next_send() {
        let adapter = MockAdapter::shared();
        let ctx = context(&adapter);
        let late_calls = Arc::new(AtomicUsize::new(0));

        let late = late_calls.clone();
        ctx.on_send_activities(move |ctx, activities, next| {
            let late = late.clone();
            if ctx.interceptors().counts().0 == 1 {
                ctx.on_send_activities(move |_ctx, activities, next| {
                    late.fetch_add(1, Ordering::SeqCst);
                    next.run(activities)
                });
            }
            next.run(activities)
        });

        ctx.send_activity("one").await.unwrap();
        assert_eq!(late_calls.load(Ordering::SeqCst), 0);

        ctx.send_activity("two").await.unwrap();
        assert_eq!(late_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_update_activity_runs_interceptors_then_adapter() {
        let adapter = MockAdapter::shared();
        let ctx = context(&adapter);
        let seen = Arc::new(Mutex::new(None));

        let captured = seen.clone();
        ctx.on_update_activity(move |_ctx, activity, next| {
            *captured.lock() = activity.text.clone();
            next.run(activity)
        });

        let mut update = Activity::message("edited");
        update.id = Some("reply-7".into());
        let response = ctx.update_activity(update).await.unwrap();

        assert_eq!(response.id, "reply-7");
        assert_eq!(seen.lock().as_deref(), Some("edited"));
        let updated = adapter.updated();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].conversation_id(), Some("convo"));
    }

    #[tokio::test]
    async fn test_delete_activity_builds_reference_from_inbound() {
        let adapter = MockAdapter::shared();
        let ctx = context(&adapter);

        ctx.on_delete_activity(|_ctx, reference, next| {
            Box::pin(async move {
                assert_eq!(reference.activity_id.as_deref(), Some("reply-9"));
                next.run(reference).await
            })
        });

        ctx.delete_activity("reply-9").await.unwrap();

        let deleted = adapter.deleted();
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].activity_id.as_deref(), Some("reply-9"));
        assert_eq!(deleted[0].channel_id.as_deref(), Some("test"));
    }

    #[tokio::test]
    async fn test_delete_without_inbound_activity_fails() {
        let adapter = MockAdapter::shared();
        let ctx = TurnContext::without_activity(adapter.clone());

        assert!(matches!(
            ctx.delete_activity("x").await,
            Err(BotError::Contract(_))
        ));
    }

    #[tokio::test]
    async fn test_expect_replies_buffers_instead_of_sending() {
        let adapter = MockAdapter::shared();
        let mut inbound = inbound_message("hello");
        inbound.delivery_mode = Some(delivery_modes::EXPECT_REPLIES.into());
        let ctx = TurnContext::new(adapter.clone(), inbound);

        let responses = ctx
            .send_activities(vec![
                Activity::message("one"),
                Activity::new(activity_types::INVOKE_RESPONSE),
            ])
            .await
            .unwrap();

        assert_eq!(responses, vec![ResourceResponse::default(); 2]);
        assert!(adapter.sent().is_empty());
        assert_eq!(ctx.buffered_reply_activities().len(), 2);
        assert!(ctx.turn_state().has(INVOKE_RESPONSE_KEY));
        assert!(ctx.responded());

        assert_eq!(ctx.take_buffered_replies().len(), 2);
        assert!(ctx.buffered_reply_activities().is_empty());
    }

    fn sample_activity() -> Activity {
        let mut activity = Activity::message("hi");
        activity.id = Some("123".into());
        activity.channel_id = Some("test".into());
        activity.service_url = Some("https://example.org".into());
        activity.locale = Some("en-US".into());
        activity.from = Some(ChannelAccount::new("user", "User"));
        activity.recipient = Some(ChannelAccount::new("bot", "Bot"));
        activity.conversation = Some(ConversationAccount::new("convo"));
        activity
    }

    #[test]
    fn test_conversation_reference_round_trip() {
        let source = sample_activity();
        let reference = TurnContext::get_conversation_reference(&source);

        let mut outgoing = Activity::message("reply");
        TurnContext::apply_conversation_reference(&mut outgoing, &reference, false);
        assert_eq!(outgoing.from, source.recipient);
        assert_eq!(outgoing.recipient, source.from);
        assert_eq!(outgoing.reply_to_id.as_deref(), Some("123"));
        assert_eq!(outgoing.id, None);
        assert_eq!(outgoing.conversation, source.conversation);
        assert_eq!(outgoing.locale.as_deref(), Some("en-US"));

        let mut incoming = Activity::message("again");
        TurnContext::apply_conversation_reference(&mut incoming, &reference, true);
        assert_eq!(incoming.from, source.from);
        assert_eq!(incoming.recipient, source.recipient);
        assert_eq!(incoming.id.as_deref(), Some("123"));
        assert_eq!(incoming.reply_to_id, None);
    }

    #[test]
    fn test_reply_conversation_reference_points_at_reply() {
        let source = sample_activity();
        let reference = TurnContext::get_reply_conversation_reference(
            &source,
            &ResourceResponse::new("reply-1"),
        );
        assert_eq!(reference.activity_id.as_deref(), Some("reply-1"));
        assert_eq!(reference.user, source.from);
    }

    #[test]
    fn test_continuation_activity_is_incoming_event() {
        let reference = TurnContext::get_conversation_reference(&sample_activity());
        let activity = TurnContext::get_continuation_activity(&reference);

        assert!(activity.is_type(activity_types::EVENT));
        assert_eq!(activity.name.as_deref(), Some(event_names::CONTINUE_CONVERSATION));
        assert_eq!(activity.from.as_ref().map(|a| a.id.as_str()), Some("user"));
        assert_eq!(activity.recipient.as_ref().map(|a| a.id.as_str()), Some("bot"));
        assert_eq!(activity.relates_to.as_ref(), Some(&reference));
        assert!(activity.id.is_some());
    }

    #[test]
    fn test_remove_recipient_mention() {
        let mut activity = sample_activity();
        activity.text = Some("<at>Bot</at> what's up".into());
        activity.entities.push(
            Mention {
                mentioned: ChannelAccount::new("bot", "Bot"),
                text: Some("<at>Bot</at>".into()),
            }
            .into_entity(),
        );

        let text = TurnContext::remove_recipient_mention(&mut activity);
        assert_eq!(text.as_deref(), Some(" what's up"));
        assert_eq!(TurnContext::get_mentions(&activity).len(), 1);
    }

    #[test]
    fn test_remove_mention_of_someone_else_keeps_text() {
        let mut activity = sample_activity();
        activity.text = Some("<at>Alice</at> hi".into());
        activity.entities.push(
            Mention {
                mentioned: ChannelAccount::new("alice", "Alice"),
                text: Some("<at>Alice</at>".into()),
            }
            .into_entity(),
        );

        let text = TurnContext::remove_recipient_mention(&mut activity);
        assert_eq!(text.as_deref(), Some("<at>Alice</at> hi"));
    }
}
