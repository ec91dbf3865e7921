//! Server payload shapes and their conversion into core types.
//!
//! The server owns this schema; everything here is tolerant of missing
//! optional fields and strict about the discriminants (ids, sender, and the
//! recipient/channel split). Conversion failures are [`EventError`]s and the
//! caller drops the payload.

use serde::Deserialize;

use crate::directory::DirectoryEntry;
use crate::state::{
    now_millis, ChatMessage, ContactOption, ContactProfile, ConversationKind, MessageBody,
    MessageScope, Selection,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    #[error("payload is not a message object: {0}")]
    Shape(String),
    #[error("message has no id")]
    MissingId,
    #[error("message has no sender")]
    MissingSender,
    #[error("direct message has no recipient")]
    MissingRecipient,
    #[error("channel message has no channel id")]
    MissingChannel,
    #[error("file message has no file url")]
    MissingFileUrl,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireProfile {
    #[serde(rename = "_id", alias = "id")]
    id: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    image: Option<String>,
    color: Option<u32>,
}

impl WireProfile {
    fn into_profile(self) -> Option<ContactProfile> {
        let user_id = non_empty(self.id)?;
        Some(ContactProfile {
            user_id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            image: self.image,
            color: self.color,
        })
    }
}

/// Participants arrive either populated (`{"_id": ..}`) or as a bare id.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ParticipantRef {
    Id(String),
    Profile(WireProfile),
}

impl ParticipantRef {
    /// `(id, profile-if-populated)`
    fn resolve(self) -> Option<(String, Option<ContactProfile>)> {
        match self {
            ParticipantRef::Id(id) => non_empty(Some(id)).map(|id| (id, None)),
            ParticipantRef::Profile(p) => {
                let profile = p.into_profile()?;
                let id = profile.user_id.clone();
                let profile = profile.has_metadata().then_some(profile);
                Some((id, profile))
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum WireTimestamp {
    Millis(i64),
    Text(String),
}

impl WireTimestamp {
    fn to_millis(&self) -> Option<i64> {
        match self {
            WireTimestamp::Millis(ms) => Some(*ms),
            WireTimestamp::Text(s) => chrono::DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|d| d.timestamp_millis()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    #[serde(rename = "_id", alias = "id")]
    id: Option<String>,
    sender: Option<ParticipantRef>,
    recipient: Option<ParticipantRef>,
    channel_id: Option<String>,
    message_type: Option<String>,
    content: Option<String>,
    file_url: Option<String>,
    timestamp: Option<WireTimestamp>,
}

impl WireMessage {
    fn into_message(
        self,
        kind: ConversationKind,
        channel_fallback: Option<&str>,
    ) -> Result<ChatMessage, EventError> {
        let id = non_empty(self.id).ok_or(EventError::MissingId)?;
        let (sender_id, sender) = self
            .sender
            .and_then(ParticipantRef::resolve)
            .ok_or(EventError::MissingSender)?;

        let scope = match kind {
            ConversationKind::Direct => {
                let (recipient_id, recipient) = self
                    .recipient
                    .and_then(ParticipantRef::resolve)
                    .ok_or(EventError::MissingRecipient)?;
                MessageScope::Direct {
                    recipient_id,
                    recipient,
                }
            }
            ConversationKind::Channel => {
                let channel_id = non_empty(self.channel_id)
                    .or_else(|| channel_fallback.map(str::to_string))
                    .ok_or(EventError::MissingChannel)?;
                MessageScope::Channel { channel_id }
            }
        };

        let is_file = match self.message_type.as_deref() {
            Some("file") => true,
            Some(_) => false,
            None => self.content.is_none() && self.file_url.is_some(),
        };
        let body = if is_file {
            MessageBody::File {
                file_url: non_empty(self.file_url).ok_or(EventError::MissingFileUrl)?,
            }
        } else {
            MessageBody::Text {
                content: self.content.unwrap_or_default(),
            }
        };

        let timestamp_ms = self
            .timestamp
            .as_ref()
            .and_then(WireTimestamp::to_millis)
            .unwrap_or_else(now_millis);

        Ok(ChatMessage {
            id,
            sender_id,
            sender,
            scope,
            body,
            timestamp_ms,
        })
    }
}

/// Parse one pushed message of the given kind.
pub fn parse_message(
    kind: ConversationKind,
    payload: serde_json::Value,
) -> Result<ChatMessage, EventError> {
    let wire: WireMessage =
        serde_json::from_value(payload).map_err(|e| EventError::Shape(e.to_string()))?;
    wire.into_message(kind, None)
}

/// Parse a fetched history for `selection`. Channel histories may omit
/// `channelId` on each item; the selection fills it in. Malformed items are
/// skipped.
pub fn parse_history(selection: &Selection, items: Vec<serde_json::Value>) -> Vec<ChatMessage> {
    let fallback = match selection.kind {
        ConversationKind::Channel => Some(selection.target_id.as_str()),
        ConversationKind::Direct => None,
    };
    items
        .into_iter()
        .filter_map(|item| {
            let parsed = serde_json::from_value::<WireMessage>(item)
                .map_err(|e| EventError::Shape(e.to_string()))
                .and_then(|w| w.into_message(selection.kind, fallback));
            match parsed {
                Ok(m) => Some(m),
                Err(e) => {
                    tracing::warn!(%e, target = %selection.target_id, "history item dropped");
                    None
                }
            }
        })
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireContact {
    #[serde(flatten)]
    profile: WireProfile,
    last_message_time: Option<WireTimestamp>,
}

impl WireContact {
    pub(crate) fn into_entry(self) -> Option<DirectoryEntry> {
        let last_activity_at = self.last_message_time.as_ref().and_then(WireTimestamp::to_millis);
        let profile = self.profile.into_profile()?;
        Some(DirectoryEntry {
            kind: ConversationKind::Direct,
            target_id: profile.user_id.clone(),
            display_name: profile.display_name(),
            image: profile.image,
            color: profile.color,
            last_activity_at,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireChannel {
    #[serde(rename = "_id", alias = "id")]
    id: Option<String>,
    name: Option<String>,
    updated_at: Option<WireTimestamp>,
}

impl WireChannel {
    pub(crate) fn into_entry(self) -> Option<DirectoryEntry> {
        let target_id = non_empty(self.id)?;
        let display_name = non_empty(self.name).unwrap_or_else(|| target_id.clone());
        Some(DirectoryEntry {
            kind: ConversationKind::Channel,
            target_id,
            display_name,
            image: None,
            color: None,
            last_activity_at: self.updated_at.as_ref().and_then(WireTimestamp::to_millis),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireContactOption {
    label: Option<String>,
    value: Option<String>,
}

impl WireContactOption {
    pub(crate) fn into_option(self) -> Option<ContactOption> {
        let user_id = non_empty(self.value)?;
        let label = non_empty(self.label).unwrap_or_else(|| user_id.clone());
        Some(ContactOption { label, user_id })
    }
}

/// Payload for publishing a text message into `selection`.
pub fn outbound_text(sender_id: &str, selection: &Selection, content: &str) -> serde_json::Value {
    let mut payload = serde_json::json!({
        "sender": sender_id,
        "content": content,
        "messageType": "text",
        "fileUrl": serde_json::Value::Null,
    });
    let key = match selection.kind {
        ConversationKind::Direct => "recipient",
        ConversationKind::Channel => "channelId",
    };
    payload[key] = serde_json::Value::String(selection.target_id.clone());
    payload
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}
