use std::collections::HashSet;

use crate::router::scope_matches;
use crate::state::{ChatMessage, ConversationView, Selection};

/// Messages of the open conversation, in arrival order.
///
/// The store is bound to one selection at a time; `reset_for` rebinds it and
/// drops everything, so the sequence never mixes conversations. Every rebind
/// starts a new epoch, even when the same target is opened again.
#[derive(Debug, Default)]
pub struct ConversationStore {
    selection: Option<Selection>,
    epoch: u64,
    messages: Vec<ChatMessage>,
    loading_history: bool,
}

impl ConversationStore {
    pub fn reset_for(&mut self, selection: Option<Selection>) {
        self.selection = selection;
        self.epoch = self.epoch.wrapping_add(1);
        self.messages.clear();
        self.loading_history = false;
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading_history = loading && self.selection.is_some();
    }

    /// Append a live message. Refused (returns false) when it belongs to a
    /// different conversation or its id is already present.
    pub fn append(&mut self, msg: ChatMessage) -> bool {
        if !scope_matches(self.selection.as_ref(), &msg) {
            return false;
        }
        if self.messages.iter().any(|m| m.id == msg.id) {
            return false;
        }
        self.messages.push(msg);
        true
    }

    /// Install history fetched during `epoch`. Live messages that arrived
    /// while the fetch was in flight and are not part of the history stay at
    /// the tail. Returns false when the store has been rebound since.
    pub fn replace(&mut self, epoch: u64, history: Vec<ChatMessage>) -> bool {
        if self.selection.is_none() || epoch != self.epoch {
            return false;
        }
        let fetched: HashSet<&str> = history.iter().map(|m| m.id.as_str()).collect();
        let live_tail: Vec<ChatMessage> = self
            .messages
            .iter()
            .filter(|m| !fetched.contains(m.id.as_str()))
            .cloned()
            .collect();

        let mut seen = HashSet::new();
        self.messages = history
            .into_iter()
            .filter(|m| seen.insert(m.id.clone()))
            .chain(live_tail)
            .collect();
        self.loading_history = false;
        true
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn view(&self) -> Option<ConversationView> {
        let selection = self.selection.clone()?;
        Some(ConversationView {
            selection,
            messages: self.messages.clone(),
            loading_history: self.loading_history,
        })
    }
}
