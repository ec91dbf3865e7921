use std::time::{SystemTime, UNIX_EPOCH};

#[derive(uniffi::Enum, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConversationKind {
    Direct,
    Channel,
}

/// The conversation currently open in the viewport.
#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Selection {
    pub kind: ConversationKind,
    pub target_id: String,
}

impl Selection {
    pub fn direct(target_id: impl Into<String>) -> Self {
        Self {
            kind: ConversationKind::Direct,
            target_id: target_id.into(),
        }
    }

    pub fn channel(target_id: impl Into<String>) -> Self {
        Self {
            kind: ConversationKind::Channel,
            target_id: target_id.into(),
        }
    }
}

/// Authenticated user as handed over by the host's auth layer.
#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: None,
            email: None,
        }
    }
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq, Default)]
pub struct ContactProfile {
    pub user_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
    pub color: Option<u32>,
}

impl ContactProfile {
    pub fn bare(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    /// "First Last", falling back to email and then the raw id.
    pub fn display_name(&self) -> String {
        let full = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !full.is_empty() {
            return full;
        }
        match self.email.as_deref().map(str::trim) {
            Some(email) if !email.is_empty() => email.to_string(),
            _ => self.user_id.clone(),
        }
    }

    /// Whether this profile carries anything beyond the id.
    pub fn has_metadata(&self) -> bool {
        self.first_name.is_some()
            || self.last_name.is_some()
            || self.email.is_some()
            || self.image.is_some()
            || self.color.is_some()
    }
}

/// Which conversation a message belongs to. Exactly one of recipient/channel.
#[derive(uniffi::Enum, Clone, Debug, PartialEq, Eq)]
pub enum MessageScope {
    Direct {
        recipient_id: String,
        recipient: Option<ContactProfile>,
    },
    Channel {
        channel_id: String,
    },
}

#[derive(uniffi::Enum, Clone, Debug, PartialEq, Eq)]
pub enum MessageBody {
    Text { content: String },
    File { file_url: String },
}

impl MessageBody {
    /// Short text for roster rows.
    pub fn preview(&self) -> String {
        match self {
            MessageBody::Text { content } => content.clone(),
            MessageBody::File { file_url } => {
                let name = file_url.rsplit('/').next().unwrap_or(file_url);
                format!("[file] {name}")
            }
        }
    }
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: String,
    pub sender_id: String,
    pub sender: Option<ContactProfile>,
    pub scope: MessageScope,
    pub body: MessageBody,
    pub timestamp_ms: i64,
}

impl ChatMessage {
    pub fn kind(&self) -> ConversationKind {
        match self.scope {
            MessageScope::Direct { .. } => ConversationKind::Direct,
            MessageScope::Channel { .. } => ConversationKind::Channel,
        }
    }

    pub fn recipient_id(&self) -> Option<&str> {
        match &self.scope {
            MessageScope::Direct { recipient_id, .. } => Some(recipient_id),
            MessageScope::Channel { .. } => None,
        }
    }

    pub fn channel_id(&self) -> Option<&str> {
        match &self.scope {
            MessageScope::Channel { channel_id } => Some(channel_id),
            MessageScope::Direct { .. } => None,
        }
    }
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct RosterEntry {
    pub kind: ConversationKind,
    pub target_id: String,
    pub display_name: String,
    pub image: Option<String>,
    pub color: Option<u32>,
    pub last_activity: Option<ChatMessage>,
    pub last_activity_at: Option<i64>,
    pub unread_count: u32,
}

impl RosterEntry {
    pub fn last_preview(&self) -> Option<String> {
        self.last_activity.as_ref().map(|m| m.body.preview())
    }
}

/// Option row for member pickers (`label`/`value` as the server returns them).
#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct ContactOption {
    pub label: String,
    pub user_id: String,
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct ConversationView {
    pub selection: Selection,
    pub messages: Vec<ChatMessage>,
    pub loading_history: bool,
}

#[derive(uniffi::Enum, Clone, Debug, PartialEq, Eq)]
pub enum AuthState {
    LoggedOut,
    LoggedIn {
        user_id: String,
        display_name: Option<String>,
    },
}

/// Transport-reported status of the session's duplex channel.
#[derive(uniffi::Enum, Clone, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed { reason: String },
}

/// "In flight" flags for async directory requests the UI should reflect.
#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct BusyState {
    pub syncing_roster: bool,
    pub fetching_contacts: bool,
    pub creating_channel: bool,
}

impl BusyState {
    pub fn idle() -> Self {
        Self {
            syncing_roster: false,
            fetching_contacts: false,
            creating_channel: false,
        }
    }
}

#[derive(uniffi::Record, Clone, Debug)]
pub struct AppState {
    pub rev: u64,
    pub auth: AuthState,
    pub connection: ConnectionState,
    pub selection: Option<Selection>,
    pub conversation: Option<ConversationView>,
    pub roster: Vec<RosterEntry>,
    pub all_contacts: Vec<ContactOption>,
    pub busy: BusyState,
    pub toast: Option<String>,
}

impl AppState {
    pub fn empty() -> Self {
        Self {
            rev: 0,
            auth: AuthState::LoggedOut,
            connection: ConnectionState::Disconnected,
            selection: None,
            conversation: None,
            roster: vec![],
            all_contacts: vec![],
            busy: BusyState::idle(),
            toast: None,
        }
    }

    pub fn roster_entry(&self, kind: ConversationKind, target_id: &str) -> Option<&RosterEntry> {
        self.roster
            .iter()
            .find(|e| e.kind == kind && e.target_id == target_id)
    }
}

pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
