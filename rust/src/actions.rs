use crate::state::{Identity, Selection};

#[derive(uniffi::Enum, Debug, Clone)]
pub enum AppAction {
    // Auth
    SignIn {
        identity: Identity,
    },
    SignOut,

    // Navigation
    SelectConversation {
        selection: Selection,
    },
    ClearSelection,

    // Chat
    SendMessage {
        content: String,
    },
    CreateChannel {
        name: String,
        member_ids: Vec<String>,
    },
    RefreshRoster,
    FetchAllContacts,

    // UI
    ClearToast,
}

impl AppAction {
    /// Log-safe action tag (never includes message content).
    pub fn tag(&self) -> &'static str {
        match self {
            // Auth
            AppAction::SignIn { .. } => "SignIn",
            AppAction::SignOut => "SignOut",

            // Navigation
            AppAction::SelectConversation { .. } => "SelectConversation",
            AppAction::ClearSelection => "ClearSelection",

            // Chat
            AppAction::SendMessage { .. } => "SendMessage",
            AppAction::CreateChannel { .. } => "CreateChannel",
            AppAction::RefreshRoster => "RefreshRoster",
            AppAction::FetchAllContacts => "FetchAllContacts",

            // UI
            AppAction::ClearToast => "ClearToast",
        }
    }
}
