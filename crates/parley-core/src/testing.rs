//! In-crate adapter double used by unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{BotError, BotResult};
use crate::foundation::context::TurnContext;
use crate::foundation::schema::{
    Activity, ChannelAccount, ConversationAccount, ConversationReference, ResourceResponse,
};
use crate::integration::adapter::{BotAdapter, Pipeline};

/// Records every outbound operation instead of talking to a channel.
#[derive(Default)]
pub(crate) struct MockAdapter {
    pipeline: Pipeline,
    next_id: AtomicUsize,
    sent: Mutex<Vec<Activity>>,
    updated: Mutex<Vec<Activity>>,
    deleted: Mutex<Vec<ConversationReference>>,
    send_failure: Mutex<Option<String>>,
}

impl MockAdapter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub(crate) fn sent(&self) -> Vec<Activity> {
        self.sent.lock().clone()
    }

    pub(crate) fn updated(&self) -> Vec<Activity> {
        self.updated.lock().clone()
    }

    pub(crate) fn deleted(&self) -> Vec<ConversationReference> {
        self.deleted.lock().clone()
    }

    /// Makes every subsequent send fail with a channel error.
    pub(crate) fn fail_sends(&self, message: &str) {
        *self.send_failure.lock() = Some(message.to_string());
    }
}

#[async_trait]
impl BotAdapter for MockAdapter {
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
        if let Some(message) = self.send_failure.lock().clone() {
            return Err(BotError::channel(message));
        }
        let mut sent = self.sent.lock();
        Ok(activities
            .iter()
            .map(|activity| {
                sent.push(activity.clone());
                let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                ResourceResponse::new(id.to_string())
            })
            .collect())
    }

    async fn update_activity(
        &self,
        _ctx: &TurnContext,
        activity: &Activity,
    ) -> BotResult<ResourceResponse> {
        self.updated.lock().push(activity.clone());
        Ok(ResourceResponse::new(activity.id.clone().unwrap_or_default()))
    }

    async fn delete_activity(
        &self,
        _ctx: &TurnContext,
        reference: &ConversationReference,
    ) -> BotResult<()> {
        self.deleted.lock().push(reference.clone());
        Ok(())
    }
}

/// An inbound message from `user` to `bot` in conversation `convo`.
pub(crate) fn inbound_message(text: &str) -> Activity {
    let mut activity = Activity::message(text);
    activity.id = Some("inbound-1".into());
    activity.channel_id = Some("test".into());
    activity.service_url = Some("https://test.invalid".into());
    activity.from = Some(ChannelAccount::new("user", "User"));
    activity.recipient = Some(ChannelAccount::new("bot", "Bot"));
    activity.conversation = Some(ConversationAccount::new("convo"));
    activity
}
