//! Volatile transcript store.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use parley_core::{Activity, BotError, BotResult};
use time::OffsetDateTime;

use super::logger::{PagedResult, TranscriptInfo, TranscriptLogger, TranscriptStore};

/// Transcripts keyed by channel id, then conversation id.
type Channels = HashMap<String, HashMap<String, Vec<Activity>>>;

/// Keeps transcripts in process memory.
///
/// Useful for local runs and tests. Everything is lost when the store is
/// dropped.
#[derive(Debug, Default)]
pub struct MemoryTranscriptStore {
    channels: RwLock<Channels>,
}

impl MemoryTranscriptStore {
    /// Items per page for reads and listings.
    pub const PAGE_SIZE: usize = 20;

    pub fn new() -> Self {
        Self::default()
    }
}

fn require<'a>(value: &'a str, what: &str) -> BotResult<&'a str> {
    if value.is_empty() {
        return Err(BotError::transcript(format!("missing {what}")));
    }
    Ok(value)
}

/// Takes one page from `items`, resuming after the item whose id equals
/// `token`.
fn page<T>(
    items: Vec<T>,
    token: Option<&str>,
    id_of: impl Fn(&T) -> Option<&str>,
) -> PagedResult<T> {
    let mut iter = items.into_iter().peekable();
    if let Some(token) = token {
        while iter.next_if(|item| id_of(item) != Some(token)).is_some() {}
        iter.next();
    }

    let items: Vec<T> = iter.take(MemoryTranscriptStore::PAGE_SIZE).collect();
    let continuation_token = if items.len() == MemoryTranscriptStore::PAGE_SIZE {
        items.last().and_then(|item| id_of(item)).map(str::to_string)
    } else {
        None
    };

    PagedResult {
        items,
        continuation_token,
    }
}

#[async_trait]
impl TranscriptLogger for MemoryTranscriptStore {
    async fn log_activity(&self, activity: &Activity) -> BotResult<()> {
        let channel_id = activity
            .channel_id
            .as_deref()
            .ok_or_else(|| BotError::transcript("activity has no channel id"))?;
        let conversation_id = activity
            .conversation_id()
            .ok_or_else(|| BotError::transcript("activity has no conversation"))?;

        self.channels
            .write()
            .entry(channel_id.to_string())
            .or_default()
            .entry(conversation_id.to_string())
            .or_default()
            .push(activity.clone());
        Ok(())
    }
}

#[async_trait]
impl TranscriptStore for MemoryTranscriptStore {
    async fn get_transcript_activities(
        &self,
        channel_id: &str,
        conversation_id: &str,
        continuation_token: Option<&str>,
        start_date: Option<OffsetDateTime>,
    ) -> BotResult<PagedResult<Activity>> {
        require(channel_id, "channel id")?;
        require(conversation_id, "conversation id")?;

        let mut activities: Vec<Activity> = {
            let channels = self.channels.read();
            match channels.get(channel_id).and_then(|c| c.get(conversation_id)) {
                Some(transcript) => transcript.clone(),
                None => return Ok(PagedResult::default()),
            }
        };

        activities.sort_by_key(|a| a.timestamp);
        if let Some(start) = start_date {
            activities.retain(|a| a.timestamp.is_some_and(|ts| ts >= start));
        }

        Ok(page(activities, continuation_token, |a| a.id.as_deref()))
    }

    async fn list_transcripts(
        &self,
        channel_id: &str,
        continuation_token: Option<&str>,
    ) -> BotResult<PagedResult<TranscriptInfo>> {
        require(channel_id, "channel id")?;

        let mut transcripts: Vec<TranscriptInfo> = {
            let channels = self.channels.read();
            let Some(channel) = channels.get(channel_id) else {
                return Ok(PagedResult::default());
            };
            channel
                .iter()
                .map(|(id, activities)| TranscriptInfo {
                    channel_id: channel_id.to_string(),
                    id: id.clone(),
                    created: activities.first().and_then(|a| a.timestamp),
                })
                .collect()
        };

        transcripts.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| a.id.cmp(&b.id)));
        Ok(page(transcripts, continuation_token, |t| Some(t.id.as_str())))
    }

    async fn delete_transcript(&self, channel_id: &str, conversation_id: &str) -> BotResult<()> {
        require(channel_id, "channel id")?;
        require(conversation_id, "conversation id")?;

        if let Some(channel) = self.channels.write().get_mut(channel_id) {
            channel.remove(conversation_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::ConversationAccount;
    use time::Duration;
    use tokio_test::assert_err;

    fn activity(conversation: &str, id: usize, at: OffsetDateTime) -> Activity {
        let mut activity = Activity::message(format!("msg {id}"));
        activity.id = Some(id.to_string());
        activity.channel_id = Some("test".into());
        activity.conversation = Some(ConversationAccount::new(conversation));
        activity.timestamp = Some(at);
        activity
    }

    #[tokio::test]
    async fn test_log_requires_addressing() {
        let store = MemoryTranscriptStore::new();
        let err = assert_err!(store.log_activity(&Activity::message("x")).await);
        assert!(matches!(err, BotError::Transcript(_)));
    }

    #[tokio::test]
    async fn test_activities_are_paged_in_timestamp_order() {
        let store = MemoryTranscriptStore::new();
        let base = OffsetDateTime::UNIX_EPOCH;
        for i in (0..25).rev() {
            store
                .log_activity(&activity("c1", i, base + Duration::seconds(i as i64)))
                .await
                .unwrap();
        }

        let first = store
            .get_transcript_activities("test", "c1", None, None)
            .await
            .unwrap();
        assert_eq!(first.items.len(), 20);
        assert_eq!(first.items[0].id.as_deref(), Some("0"));
        assert_eq!(first.continuation_token.as_deref(), Some("19"));

        let second = store
            .get_transcript_activities("test", "c1", first.continuation_token.as_deref(), None)
            .await
            .unwrap();
        assert_eq!(second.items.len(), 5);
        assert_eq!(second.items[0].id.as_deref(), Some("20"));
        assert_eq!(second.continuation_token, None);
    }

    #[tokio::test]
    async fn test_start_date_filters_older_activities() {
        let store = MemoryTranscriptStore::new();
        let base = OffsetDateTime::UNIX_EPOCH;
        for i in 0..5 {
            store
                .log_activity(&activity("c1", i, base + Duration::minutes(i as i64)))
                .await
                .unwrap();
        }

        let page = store
            .get_transcript_activities("test", "c1", None, Some(base + Duration::minutes(3)))
            .await
            .unwrap();
        let ids: Vec<_> = page.items.iter().filter_map(|a| a.id.as_deref()).collect();
        assert_eq!(ids, vec!["3", "4"]);
    }

    #[tokio::test]
    async fn test_list_transcripts_newest_first_and_delete() {
        let store = MemoryTranscriptStore::new();
        let base = OffsetDateTime::UNIX_EPOCH;
        store.log_activity(&activity("old", 1, base)).await.unwrap();
        store
            .log_activity(&activity("new", 2, base + Duration::hours(1)))
            .await
            .unwrap();

        let listed = store.list_transcripts("test", None).await.unwrap();
        let ids: Vec<_> = listed.items.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);
        assert_eq!(listed.items[1].created, Some(base));

        store.delete_transcript("test", "old").await.unwrap();
        let listed = store.list_transcripts("test", None).await.unwrap();
        assert_eq!(listed.items.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_channel_is_empty_and_blank_ids_fail() {
        let store = MemoryTranscriptStore::new();
        let page = store
            .get_transcript_activities("nowhere", "c1", None, None)
            .await
            .unwrap();
        assert!(page.items.is_empty());

        assert_err!(store.list_transcripts("", None).await);
        assert_err!(store.delete_transcript("test", "").await);
    }
}
