//! Duplex channel seam.
//!
//! The core only needs `connect`, `on`, `start`, `emit` and `disconnect`; handshake,
//! encoding and reconnection belong to the implementation behind
//! [`DuplexTransport`]. Two implementations ship with the crate: the WebSocket
//! client in [`ws`] and [`OfflineTransport`] for network-disabled runs.

pub mod ws;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::state::{ConversationKind, Identity};

/// Lifecycle notifications a transport raises through the same `on` registry.
pub const CONNECT_EVENT: &str = "connect";
pub const DISCONNECT_EVENT: &str = "disconnect";
pub const CONNECT_ERROR_EVENT: &str = "connect_error";

/// Query parameter carrying the identity on the channel URL.
pub const USER_ID_QUERY_KEY: &str = "userId";

/// Inbound message events consumed by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InboundKind {
    DirectMessage,
    ChannelMessage,
}

impl InboundKind {
    pub const ALL: [InboundKind; 2] = [InboundKind::DirectMessage, InboundKind::ChannelMessage];

    /// Event name as the server emits it (spelling included).
    pub fn event_name(self) -> &'static str {
        match self {
            InboundKind::DirectMessage => "recieveMessage",
            InboundKind::ChannelMessage => "recieve-channel-message",
        }
    }

    pub fn conversation_kind(self) -> ConversationKind {
        match self {
            InboundKind::DirectMessage => ConversationKind::Direct,
            InboundKind::ChannelMessage => ConversationKind::Channel,
        }
    }
}

/// Event name used to publish a message into a conversation of `kind`.
pub fn outbound_event_name(kind: ConversationKind) -> &'static str {
    match kind {
        ConversationKind::Direct => "sendMessage",
        ConversationKind::Channel => "send-channel-message",
    }
}

/// Per-connection parameters. Built fresh for every session so nothing from a
/// previous identity can leak into the next connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectParams {
    pub server_url: String,
    pub query: Vec<(String, String)>,
    pub with_credentials: bool,
}

impl ConnectParams {
    pub fn for_identity(server_url: &str, identity: &Identity) -> Self {
        Self {
            server_url: server_url.to_string(),
            query: vec![(USER_ID_QUERY_KEY.to_string(), identity.user_id.clone())],
            with_credentials: true,
        }
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find_map(|(k, v)| (k == key).then_some(v.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("invalid server url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("channel closed")]
    Closed,
    #[error("encode failed: {0}")]
    Encode(String),
}

pub type EventCallback = Box<dyn Fn(serde_json::Value) + Send + Sync + 'static>;

pub trait DuplexTransport: Send + Sync + 'static {
    /// Prepare a channel. Nothing is delivered until [`DuplexHandle::start`];
    /// the handle is live until `disconnect` (or drop).
    fn connect(
        &self,
        runtime: &tokio::runtime::Runtime,
        params: &ConnectParams,
    ) -> Result<Box<dyn DuplexHandle>, TransportError>;
}

pub trait DuplexHandle: Send + 'static {
    fn on(&mut self, event: &str, callback: EventCallback);

    /// Begin the handshake. Called once, after every `on` registration, so
    /// lifecycle notifications and early frames always find their listeners.
    fn start(&mut self) {}

    fn emit(&self, event: &str, payload: serde_json::Value) -> Result<(), TransportError>;

    /// Detach every listener, then close. Must be idempotent.
    fn disconnect(&mut self);
}

/// Wire frame: `{"event": <name>, "data": <payload>}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Shared listener registry for transport implementations.
///
/// `dispatch` holds the read lock while callbacks run and `clear` takes the
/// write lock, so once `clear` returns no callback is running or will run.
#[derive(Clone, Default)]
pub struct Listeners {
    inner: Arc<RwLock<HashMap<String, Vec<EventCallback>>>>,
}

impl Listeners {
    pub fn register(&self, event: &str, callback: EventCallback) {
        let mut map = match self.inner.write() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        };
        map.entry(event.to_string()).or_default().push(callback);
    }

    /// Invoke every callback registered for `event`. Returns whether any ran.
    pub fn dispatch(&self, event: &str, payload: serde_json::Value) -> bool {
        let map = match self.inner.read() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        };
        let Some(callbacks) = map.get(event) else {
            return false;
        };
        for cb in callbacks {
            cb(payload.clone());
        }
        !callbacks.is_empty()
    }

    pub fn clear(&self) {
        let mut map = match self.inner.write() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        };
        map.clear();
    }

    pub fn is_empty(&self) -> bool {
        match self.inner.read() {
            Ok(g) => g.is_empty(),
            Err(poison) => poison.into_inner().is_empty(),
        }
    }
}

/// Transport used when the network is disabled: connections open, stay
/// silent, and swallow outbound frames.
#[derive(Debug, Clone, Default)]
pub struct OfflineTransport;

impl DuplexTransport for OfflineTransport {
    fn connect(
        &self,
        _runtime: &tokio::runtime::Runtime,
        params: &ConnectParams,
    ) -> Result<Box<dyn DuplexHandle>, TransportError> {
        tracing::debug!(server_url = %params.server_url, "offline transport connect");
        Ok(Box::new(OfflineHandle { closed: false }))
    }
}

struct OfflineHandle {
    closed: bool,
}

impl DuplexHandle for OfflineHandle {
    fn on(&mut self, _event: &str, _callback: EventCallback) {}

    fn emit(&self, event: &str, _payload: serde_json::Value) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        tracing::debug!(event, "offline transport dropped outbound frame");
        Ok(())
    }

    fn disconnect(&mut self) {
        self.closed = true;
    }
}
