//! HTTP directory seam: history, contact/channel listings, channel creation.
//!
//! Results never reach the stores directly; the actor receives them as
//! internal events and applies them with explicit store calls.

use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::state::{ChatMessage, ContactOption, ConversationKind, Selection};
use crate::wire::{self, WireChannel, WireContact, WireContactOption};

pub const GET_MESSAGES_ROUTE: &str = "/api/messages/get-messages";
pub const GET_CHANNEL_MESSAGES_ROUTE: &str = "/api/channel/get-channel-messages";
pub const GET_DM_CONTACTS_ROUTE: &str = "/api/contacts/get-contacts-for-dm";
pub const GET_USER_CHANNELS_ROUTE: &str = "/api/channel/get-user-channels";
pub const GET_ALL_CONTACTS_ROUTE: &str = "/api/contacts/get-all-contacts";
pub const CREATE_CHANNEL_ROUTE: &str = "/api/channel/create-channel";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// One row of a contact or channel listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub kind: ConversationKind,
    pub target_id: String,
    pub display_name: String,
    pub image: Option<String>,
    pub color: Option<u32>,
    pub last_activity_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("server returned status {status}")]
    Status { status: u16 },
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("network disabled")]
    Offline,
}

pub trait ChatDirectory: Send + Sync + 'static {
    fn fetch_history(
        &self,
        selection: Selection,
    ) -> BoxFuture<'static, Result<Vec<ChatMessage>, DirectoryError>>;

    fn fetch_dm_contacts(&self) -> BoxFuture<'static, Result<Vec<DirectoryEntry>, DirectoryError>>;

    fn fetch_channels(&self) -> BoxFuture<'static, Result<Vec<DirectoryEntry>, DirectoryError>>;

    fn fetch_all_contacts(&self)
        -> BoxFuture<'static, Result<Vec<ContactOption>, DirectoryError>>;

    fn create_channel(
        &self,
        name: String,
        member_ids: Vec<String>,
    ) -> BoxFuture<'static, Result<DirectoryEntry, DirectoryError>>;
}

#[derive(Debug, Deserialize)]
struct MessagesBody {
    #[serde(default)]
    messages: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ContactsBody {
    #[serde(default)]
    contacts: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChannelsBody {
    #[serde(default)]
    channels: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChannelBody {
    channel: WireChannel,
}

/// reqwest-backed directory talking to the chat server's REST routes.
#[derive(Debug, Clone)]
pub struct HttpDirectory {
    base_url: String,
    client: reqwest::Client,
}

impl HttpDirectory {
    pub fn new(base_url: impl Into<String>) -> Result<Self, DirectoryError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DirectoryError::Request(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `route` plus one percent-encoded path segment.
    fn url_with_segment(
        &self,
        route: &str,
        segment: &str,
    ) -> Result<reqwest::Url, DirectoryError> {
        let mut url = reqwest::Url::parse(&self.url(route))
            .map_err(|e| DirectoryError::Request(format!("invalid url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| DirectoryError::Request("base url cannot carry a path".to_string()))?
            .push(segment);
        Ok(url)
    }
}

async fn read_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> Result<T, DirectoryError> {
    let resp = request
        .send()
        .await
        .map_err(|e| DirectoryError::Request(e.to_string()))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(DirectoryError::Status {
            status: status.as_u16(),
        });
    }
    resp.json::<T>()
        .await
        .map_err(|e| DirectoryError::Decode(e.to_string()))
}

fn rows<T: DeserializeOwned, O>(
    values: Vec<serde_json::Value>,
    convert: impl Fn(T) -> Option<O>,
) -> Vec<O> {
    values
        .into_iter()
        .filter_map(|v| serde_json::from_value::<T>(v).ok())
        .filter_map(convert)
        .collect()
}

impl ChatDirectory for HttpDirectory {
    fn fetch_history(
        &self,
        selection: Selection,
    ) -> BoxFuture<'static, Result<Vec<ChatMessage>, DirectoryError>> {
        let request = match selection.kind {
            ConversationKind::Direct => Ok(self
                .client
                .post(self.url(GET_MESSAGES_ROUTE))
                .json(&serde_json::json!({ "id": selection.target_id }))),
            ConversationKind::Channel => self
                .url_with_segment(GET_CHANNEL_MESSAGES_ROUTE, &selection.target_id)
                .map(|url| self.client.get(url)),
        };
        async move {
            let body: MessagesBody = read_json(request?).await?;
            Ok(wire::parse_history(&selection, body.messages))
        }
        .boxed()
    }

    fn fetch_dm_contacts(&self) -> BoxFuture<'static, Result<Vec<DirectoryEntry>, DirectoryError>> {
        let request = self.client.get(self.url(GET_DM_CONTACTS_ROUTE));
        async move {
            let body: ContactsBody = read_json(request).await?;
            Ok(rows(body.contacts, WireContact::into_entry))
        }
        .boxed()
    }

    fn fetch_channels(&self) -> BoxFuture<'static, Result<Vec<DirectoryEntry>, DirectoryError>> {
        let request = self.client.get(self.url(GET_USER_CHANNELS_ROUTE));
        async move {
            let body: ChannelsBody = read_json(request).await?;
            Ok(rows(body.channels, WireChannel::into_entry))
        }
        .boxed()
    }

    fn fetch_all_contacts(
        &self,
    ) -> BoxFuture<'static, Result<Vec<ContactOption>, DirectoryError>> {
        let request = self.client.get(self.url(GET_ALL_CONTACTS_ROUTE));
        async move {
            let body: ContactsBody = read_json(request).await?;
            Ok(rows(body.contacts, WireContactOption::into_option))
        }
        .boxed()
    }

    fn create_channel(
        &self,
        name: String,
        member_ids: Vec<String>,
    ) -> BoxFuture<'static, Result<DirectoryEntry, DirectoryError>> {
        let request = self
            .client
            .post(self.url(CREATE_CHANNEL_ROUTE))
            .json(&serde_json::json!({ "name": name, "members": member_ids }));
        async move {
            let body: ChannelBody = read_json(request).await?;
            body.channel
                .into_entry()
                .ok_or_else(|| DirectoryError::Decode("channel without id".to_string()))
        }
        .boxed()
    }
}

/// Directory used when the network is disabled: empty listings, no creation.
#[derive(Debug, Clone, Default)]
pub struct OfflineDirectory;

impl ChatDirectory for OfflineDirectory {
    fn fetch_history(
        &self,
        _selection: Selection,
    ) -> BoxFuture<'static, Result<Vec<ChatMessage>, DirectoryError>> {
        async { Ok(vec![]) }.boxed()
    }

    fn fetch_dm_contacts(&self) -> BoxFuture<'static, Result<Vec<DirectoryEntry>, DirectoryError>> {
        async { Ok(vec![]) }.boxed()
    }

    fn fetch_channels(&self) -> BoxFuture<'static, Result<Vec<DirectoryEntry>, DirectoryError>> {
        async { Ok(vec![]) }.boxed()
    }

    fn fetch_all_contacts(
        &self,
    ) -> BoxFuture<'static, Result<Vec<ContactOption>, DirectoryError>> {
        async { Ok(vec![]) }.boxed()
    }

    fn create_channel(
        &self,
        _name: String,
        _member_ids: Vec<String>,
    ) -> BoxFuture<'static, Result<DirectoryEntry, DirectoryError>> {
        async { Err(DirectoryError::Offline) }.boxed()
    }
}
