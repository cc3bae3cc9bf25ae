//! Transcript logger and store contracts.

use std::sync::Arc;

use async_trait::async_trait;
use parley_core::{Activity, BotResult};
use time::OffsetDateTime;
use tracing::info;

/// Receives every activity of a conversation for recall.
#[async_trait]
pub trait TranscriptLogger: Send + Sync {
    async fn log_activity(&self, activity: &Activity) -> BotResult<()>;
}

#[async_trait]
impl<T: TranscriptLogger + ?Sized> TranscriptLogger for Arc<T> {
    async fn log_activity(&self, activity: &Activity) -> BotResult<()> {
        (**self).log_activity(activity).await
    }
}

/// A page of results plus the token for the next page.
#[derive(Debug, Clone, PartialEq)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    /// Present when more items may follow.
    pub continuation_token: Option<String>,
}

impl<T> Default for PagedResult<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            continuation_token: None,
        }
    }
}

/// Metadata for a stored transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptInfo {
    pub channel_id: String,
    /// Conversation id.
    pub id: String,
    /// Timestamp of the first logged activity.
    pub created: Option<OffsetDateTime>,
}

/// A [`TranscriptLogger`] that can also read transcripts back.
#[async_trait]
pub trait TranscriptStore: TranscriptLogger {
    /// Activities of one conversation in timestamp order, starting at
    /// `start_date` if given.
    async fn get_transcript_activities(
        &self,
        channel_id: &str,
        conversation_id: &str,
        continuation_token: Option<&str>,
        start_date: Option<OffsetDateTime>,
    ) -> BotResult<PagedResult<Activity>>;

    /// Conversations logged on a channel, newest first.
    async fn list_transcripts(
        &self,
        channel_id: &str,
        continuation_token: Option<&str>,
    ) -> BotResult<PagedResult<TranscriptInfo>>;

    /// Deletes one conversation and all of its activities.
    async fn delete_transcript(&self, channel_id: &str, conversation_id: &str) -> BotResult<()>;
}

/// Writes every activity to the `parley::transcript` tracing target as
/// JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTranscriptLogger;

#[async_trait]
impl TranscriptLogger for TracingTranscriptLogger {
    async fn log_activity(&self, activity: &Activity) -> BotResult<()> {
        let json = serde_json::to_string(activity)?;
        info!(target: "parley::transcript", activity = %json, "Activity log");
        Ok(())
    }
}
