//! Activity envelope and addressing records.
//!
//! These are plain data containers. The runtime reads and writes the
//! addressing fields (`from`, `recipient`, `conversation`, ...) and leaves
//! the rest to bot code and adapters.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

/// Well-known values of [`Activity::activity_type`].
pub mod activity_types {
    pub const MESSAGE: &str = "message";
    pub const TRACE: &str = "trace";
    pub const TYPING: &str = "typing";
    pub const EVENT: &str = "event";
    pub const INVOKE: &str = "invoke";
    pub const INVOKE_RESPONSE: &str = "invokeResponse";
    pub const MESSAGE_UPDATE: &str = "messageUpdate";
    pub const MESSAGE_DELETE: &str = "messageDelete";
    pub const CONVERSATION_UPDATE: &str = "conversationUpdate";
    pub const MESSAGE_REACTION: &str = "messageReaction";
    pub const INSTALLATION_UPDATE: &str = "installationUpdate";
    pub const END_OF_CONVERSATION: &str = "endOfConversation";
    pub const DELAY: &str = "delay";
}

/// Well-known values of [`Activity::input_hint`].
pub mod input_hints {
    pub const ACCEPTING_INPUT: &str = "acceptingInput";
    pub const IGNORING_INPUT: &str = "ignoringInput";
    pub const EXPECTING_INPUT: &str = "expectingInput";
}

/// Well-known values of [`Activity::delivery_mode`].
pub mod delivery_modes {
    pub const NORMAL: &str = "normal";
    pub const EXPECT_REPLIES: &str = "expectReplies";
}

/// Well-known values of [`Activity::name`] for event activities.
pub mod event_names {
    pub const CONTINUE_CONVERSATION: &str = "ContinueConversation";
    pub const TOKEN_RESPONSE: &str = "tokens/response";
}

/// A reaction added to or removed from a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReaction {
    #[serde(rename = "type")]
    pub reaction_type: String,
}

/// The result of an `invoke` activity, returned to the channel as the
/// value of an `invokeResponse` activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeResponse {
    /// HTTP-style status code.
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl InvokeResponse {
    pub fn new(status: u16) -> Self {
        Self { status, body: None }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// A participant in a conversation (user or bot).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAccount {
    /// Channel-specific identifier.
    pub id: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Role of the account ("user" or "bot").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl ChannelAccount {
    /// Creates an account with an id and display name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            role: None,
        }
    }
}

/// The conversation an activity belongs to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationAccount {
    /// Channel-specific conversation id.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_group: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_type: Option<String>,
    /// Channel-defined extra properties.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,
}

impl ConversationAccount {
    /// Creates a conversation with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// Addressing record sufficient to resume a conversation later.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot: Option<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<ConversationAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
}

/// Channel acknowledgement for a sent or updated activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceResponse {
    /// Id assigned by the channel. Empty for placeholder responses.
    #[serde(default)]
    pub id: String,
}

impl ResourceResponse {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Free-form metadata attached to an activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Entity kind, e.g. `"mention"`.
    #[serde(rename = "type")]
    pub entity_type: String,
    /// Remaining entity properties.
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

/// A `mention` entity: someone was @-mentioned in the message text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mention {
    /// The mentioned account.
    pub mentioned: ChannelAccount,
    /// Markup of the mention inside the text, e.g. `<at>Bot</at>`.
    #[serde(default)]
    pub text: Option<String>,
}

impl Mention {
    pub const ENTITY_TYPE: &'static str = "mention";

    /// Converts this mention into a generic entity.
    pub fn into_entity(self) -> Entity {
        let properties = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        Entity {
            entity_type: Self::ENTITY_TYPE.to_string(),
            properties,
        }
    }
}

/// The envelope exchanged between a bot and a channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    /// Activity kind, see [`activity_types`].
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub activity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<ConversationAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speak: Option<String>,
    /// See [`input_hints`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
    /// Event or trace name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// See [`delivery_modes`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<Entity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relates_to: Option<ConversationReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_data: Option<Value>,
    /// Members who joined, on `conversationUpdate`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members_added: Vec<ChannelAccount>,
    /// Members who left, on `conversationUpdate`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members_removed: Vec<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reactions_added: Vec<MessageReaction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reactions_removed: Vec<MessageReaction>,
    /// `add`, `remove`, ... on `installationUpdate`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl Activity {
    /// Creates an empty activity of the given type.
    pub fn new(activity_type: impl Into<String>) -> Self {
        Self {
            activity_type: Some(activity_type.into()),
            ..Default::default()
        }
    }

    /// Creates a text message.
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            activity_type: Some(activity_types::MESSAGE.to_string()),
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Creates a typing indicator.
    pub fn typing() -> Self {
        Self::new(activity_types::TYPING)
    }

    /// Creates a trace activity. Channels that do not understand traces
    /// drop them.
    pub fn trace(
        name: impl Into<String>,
        value: Option<Value>,
        value_type: Option<String>,
        label: Option<String>,
    ) -> Self {
        Self {
            activity_type: Some(activity_types::TRACE.to_string()),
            timestamp: Some(OffsetDateTime::now_utc()),
            name: Some(name.into()),
            value,
            value_type,
            label,
            ..Default::default()
        }
    }

    /// Sets the spoken form of the message.
    pub fn with_speak(mut self, speak: impl Into<String>) -> Self {
        self.speak = Some(speak.into());
        self
    }

    /// Sets the input hint.
    pub fn with_input_hint(mut self, hint: impl Into<String>) -> Self {
        self.input_hint = Some(hint.into());
        self
    }

    /// Returns `true` if the activity has the given type.
    pub fn is_type(&self, activity_type: &str) -> bool {
        self.activity_type.as_deref() == Some(activity_type)
    }

    /// Returns the conversation id, if any.
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation.as_ref().map(|c| c.id.as_str())
    }

    /// How long a `delay` activity pauses, from its `value` in milliseconds.
    ///
    /// Fractions are truncated. Missing, negative or non-numeric values mean
    /// no pause.
    pub fn delay_duration(&self) -> Duration {
        let millis = self
            .value
            .as_ref()
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
            .map_or(0, |v| v.max(0.0) as u64);
        Duration::from_millis(millis)
    }

    /// Returns `true` if the sender expects replies to be returned in the
    /// response body instead of being sent to the channel.
    pub fn expects_replies(&self) -> bool {
        self.delivery_mode.as_deref() == Some(delivery_modes::EXPECT_REPLIES)
    }

    /// Returns every `mention` entity on this activity.
    pub fn mentions(&self) -> Vec<Mention> {
        self.entities
            .iter()
            .filter(|e| e.entity_type.eq_ignore_ascii_case(Mention::ENTITY_TYPE))
            .filter_map(|e| serde_json::from_value(Value::Object(e.properties.clone())).ok())
            .collect()
    }
}

impl From<&str> for Activity {
    fn from(text: &str) -> Self {
        Activity::message(text).with_input_hint(input_hints::ACCEPTING_INPUT)
    }
}

impl From<String> for Activity {
    fn from(text: String) -> Self {
        Activity::message(text).with_input_hint(input_hints::ACCEPTING_INPUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_activity_serializes_camel_case() {
        let mut activity = Activity::message("hi");
        activity.reply_to_id = Some("42".into());
        activity.channel_id = Some("test".into());

        let value = serde_json::to_value(&activity).unwrap();
        assert_eq!(value["type"], "message");
        assert_eq!(value["replyToId"], "42");
        assert_eq!(value["channelId"], "test");
        assert!(value.get("id").is_none());
    }

    #[test]
    fn test_mentions_are_parsed_from_entities() {
        let activity: Activity = serde_json::from_value(json!({
            "type": "message",
            "text": "<at>Bot</at> hello",
            "entities": [
                { "type": "mention", "mentioned": { "id": "bot", "name": "Bot" }, "text": "<at>Bot</at>" },
                { "type": "clientInfo", "locale": "en-US" }
            ]
        }))
        .unwrap();

        let mentions = activity.mentions();
        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].mentioned.id, "bot");
        assert_eq!(mentions[0].text.as_deref(), Some("<at>Bot</at>"));
    }

    #[test]
    fn test_delay_duration_accepts_integers_and_floats() {
        let mut delay = Activity::new(activity_types::DELAY);
        assert_eq!(delay.delay_duration(), Duration::ZERO);

        delay.value = Some(json!(250));
        assert_eq!(delay.delay_duration(), Duration::from_millis(250));

        delay.value = Some(json!(250.9));
        assert_eq!(delay.delay_duration(), Duration::from_millis(250));

        delay.value = Some(json!(-40));
        assert_eq!(delay.delay_duration(), Duration::ZERO);

        delay.value = Some(json!("soon"));
        assert_eq!(delay.delay_duration(), Duration::ZERO);
    }

    #[test]
    fn test_text_converts_to_accepting_input_message() {
        let activity = Activity::from("hello");
        assert!(activity.is_type(activity_types::MESSAGE));
        assert_eq!(activity.input_hint.as_deref(), Some(input_hints::ACCEPTING_INPUT));
    }
}
