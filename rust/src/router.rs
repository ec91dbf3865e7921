//! Per-event routing decision.
//!
//! `route` is pure: it reads the selection as of handling time and says which
//! stores the message touches. The actor then performs the two mutations as
//! separate calls (conversation only when in scope, roster always).

use crate::state::{ChatMessage, ContactProfile, ConversationKind, MessageScope, Selection};

/// Identity of a roster row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RosterKey {
    pub kind: ConversationKind,
    pub target_id: String,
}

impl RosterKey {
    pub fn new(kind: ConversationKind, target_id: impl Into<String>) -> Self {
        Self {
            kind,
            target_id: target_id.into(),
        }
    }

    pub fn for_selection(selection: &Selection) -> Self {
        Self::new(selection.kind, selection.target_id.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    pub append_to_conversation: bool,
    pub roster_key: RosterKey,
    /// Populated profile of the other party of a direct message, if the
    /// payload carried one.
    pub counterpart: Option<ContactProfile>,
    /// Out of scope and not sent by the local user.
    pub counts_as_unread: bool,
}

/// Whether `msg` belongs to the conversation currently open.
///
/// Direct messages match when either party is the selected target; this is
/// what places the local user's own echoes in the thread they were sent to.
pub fn scope_matches(selection: Option<&Selection>, msg: &ChatMessage) -> bool {
    let Some(selection) = selection else {
        return false;
    };
    match &msg.scope {
        MessageScope::Direct { recipient_id, .. } => {
            selection.kind == ConversationKind::Direct
                && (selection.target_id == msg.sender_id || &selection.target_id == recipient_id)
        }
        MessageScope::Channel { channel_id } => {
            selection.kind == ConversationKind::Channel && &selection.target_id == channel_id
        }
    }
}

/// Roster row a message updates: the other party of a direct message, or the
/// channel.
pub fn roster_key(local_user_id: &str, msg: &ChatMessage) -> RosterKey {
    match &msg.scope {
        MessageScope::Direct { recipient_id, .. } => {
            let counterpart = if msg.sender_id == local_user_id {
                recipient_id
            } else {
                &msg.sender_id
            };
            RosterKey::new(ConversationKind::Direct, counterpart.clone())
        }
        MessageScope::Channel { channel_id } => {
            RosterKey::new(ConversationKind::Channel, channel_id.clone())
        }
    }
}

fn counterpart_profile(local_user_id: &str, msg: &ChatMessage) -> Option<ContactProfile> {
    match &msg.scope {
        MessageScope::Direct { recipient, .. } if msg.sender_id == local_user_id => {
            recipient.clone()
        }
        MessageScope::Direct { .. } => msg.sender.clone(),
        MessageScope::Channel { .. } => None,
    }
}

pub fn route(
    local_user_id: &str,
    selection: Option<&Selection>,
    msg: &ChatMessage,
) -> RouteDecision {
    let append_to_conversation = scope_matches(selection, msg);
    RouteDecision {
        append_to_conversation,
        roster_key: roster_key(local_user_id, msg),
        counterpart: counterpart_profile(local_user_id, msg),
        counts_as_unread: !append_to_conversation && msg.sender_id != local_user_id,
    }
}
