use crate::directory::{DirectoryEntry, DirectoryError};
use crate::state::{
    AppState, AuthState, BusyState, ChatMessage, ConnectionState, ContactOption,
    ConversationKind, ConversationView, RosterEntry, Selection,
};
use crate::transport::InboundKind;
use crate::AppAction;

#[derive(uniffi::Enum, Clone, Debug)]
pub enum AppUpdate {
    FullState(AppState),
    AuthChanged {
        rev: u64,
        auth: AuthState,
    },
    ConnectionChanged {
        rev: u64,
        connection: ConnectionState,
    },
    SelectionChanged {
        rev: u64,
        selection: Option<Selection>,
    },
    ConversationChanged {
        rev: u64,
        conversation: Option<ConversationView>,
    },
    RosterChanged {
        rev: u64,
        roster: Vec<RosterEntry>,
    },
    ContactsChanged {
        rev: u64,
        all_contacts: Vec<ContactOption>,
    },
    BusyChanged {
        rev: u64,
        busy: BusyState,
    },
    ToastChanged {
        rev: u64,
        toast: Option<String>,
    },
}

impl AppUpdate {
    pub fn rev(&self) -> u64 {
        match self {
            AppUpdate::FullState(s) => s.rev,
            AppUpdate::AuthChanged { rev, .. } => *rev,
            AppUpdate::ConnectionChanged { rev, .. } => *rev,
            AppUpdate::SelectionChanged { rev, .. } => *rev,
            AppUpdate::ConversationChanged { rev, .. } => *rev,
            AppUpdate::RosterChanged { rev, .. } => *rev,
            AppUpdate::ContactsChanged { rev, .. } => *rev,
            AppUpdate::BusyChanged { rev, .. } => *rev,
            AppUpdate::ToastChanged { rev, .. } => *rev,
        }
    }
}

#[derive(Debug)]
pub enum CoreMsg {
    Action(AppAction),
    Internal(Box<InternalEvent>),
    /// Tear down the session and stop the actor loop.
    Shutdown,
}

/// Messages produced off the actor thread. Every variant carries the session
/// token it was produced under; the actor drops anything from a dead session.
#[derive(Debug)]
pub enum InternalEvent {
    // Duplex channel receive path
    ChannelEvent {
        token: u64,
        kind: InboundKind,
        payload: serde_json::Value,
    },
    ConnectionStatus {
        token: u64,
        status: ConnectionState,
    },

    // Directory results
    HistoryFetched {
        token: u64,
        selection: Selection,
        // Conversation epoch the fetch was issued in.
        epoch: u64,
        result: Result<Vec<ChatMessage>, DirectoryError>,
    },
    DirectoryListed {
        token: u64,
        kind: ConversationKind,
        result: Result<Vec<DirectoryEntry>, DirectoryError>,
    },
    AllContactsFetched {
        token: u64,
        result: Result<Vec<ContactOption>, DirectoryError>,
    },
    ChannelCreated {
        token: u64,
        result: Result<DirectoryEntry, DirectoryError>,
    },
}

impl InternalEvent {
    pub fn token(&self) -> u64 {
        match self {
            InternalEvent::ChannelEvent { token, .. }
            | InternalEvent::ConnectionStatus { token, .. }
            | InternalEvent::HistoryFetched { token, .. }
            | InternalEvent::DirectoryListed { token, .. }
            | InternalEvent::AllContactsFetched { token, .. }
            | InternalEvent::ChannelCreated { token, .. } => *token,
        }
    }
}
