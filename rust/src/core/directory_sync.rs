// Directory requests run on the actor's runtime and come back as internal
// events carrying the session token they were issued under.

use futures_util::future::BoxFuture;

use super::AppCore;
use crate::directory::{DirectoryEntry, DirectoryError};
use crate::state::{ChatMessage, ContactOption, ConversationKind, Selection};
use crate::updates::{CoreMsg, InternalEvent};

impl AppCore {
    fn spawn_directory<T: Send + 'static>(
        &self,
        request: BoxFuture<'static, T>,
        into_event: impl FnOnce(T) -> InternalEvent + Send + 'static,
    ) {
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            let result = request.await;
            let _ = tx.send(CoreMsg::Internal(Box::new(into_event(result))));
        });
    }

    pub(super) fn refresh_roster(&mut self) {
        let Some(token) = self.live_token() else {
            tracing::debug!("refresh_roster without session");
            return;
        };
        // Overlapping refreshes add up; busy clears when the last one lands.
        self.pending_listings = self.pending_listings.saturating_add(2);
        self.set_busy(|b| b.syncing_roster = true);

        self.spawn_directory(self.directory.fetch_dm_contacts(), move |result| {
            InternalEvent::DirectoryListed {
                token,
                kind: ConversationKind::Direct,
                result,
            }
        });
        self.spawn_directory(self.directory.fetch_channels(), move |result| {
            InternalEvent::DirectoryListed {
                token,
                kind: ConversationKind::Channel,
                result,
            }
        });
    }

    pub(super) fn fetch_history(&mut self, selection: Selection) {
        let Some(token) = self.live_token() else {
            return;
        };
        let epoch = self.conversation.epoch();
        let request = self.directory.fetch_history(selection.clone());
        self.spawn_directory(request, move |result| InternalEvent::HistoryFetched {
            token,
            selection,
            epoch,
            result,
        });
    }

    pub(super) fn fetch_all_contacts(&mut self) {
        let Some(token) = self.live_token() else {
            self.toast("Sign in to load contacts");
            return;
        };
        if self.state.busy.fetching_contacts {
            return;
        }
        self.set_busy(|b| b.fetching_contacts = true);
        self.spawn_directory(self.directory.fetch_all_contacts(), move |result| {
            InternalEvent::AllContactsFetched { token, result }
        });
    }

    pub(super) fn create_channel(&mut self, name: String, member_ids: Vec<String>) {
        let Some(token) = self.live_token() else {
            self.toast("Sign in to create a channel");
            return;
        };
        let name = name.trim().to_string();
        if name.is_empty() {
            self.toast("Channel name is required");
            return;
        }
        let member_ids: Vec<String> = member_ids
            .into_iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        if member_ids.is_empty() {
            self.toast("Select at least one member");
            return;
        }
        if self.state.busy.creating_channel {
            return;
        }
        self.set_busy(|b| b.creating_channel = true);
        tracing::info!(name = %name, members = member_ids.len(), "create_channel");
        self.spawn_directory(self.directory.create_channel(name, member_ids), move |result| {
            InternalEvent::ChannelCreated { token, result }
        });
    }

    pub(super) fn handle_history_fetched(
        &mut self,
        selection: Selection,
        epoch: u64,
        result: Result<Vec<ChatMessage>, DirectoryError>,
    ) {
        if self.conversation.epoch() != epoch {
            tracing::debug!(target = %selection.target_id, epoch, "history for stale selection discarded");
            return;
        }
        match result {
            Ok(history) => {
                tracing::debug!(target = %selection.target_id, count = history.len(), "history fetched");
                self.conversation.replace(epoch, history);
            }
            Err(e) => {
                tracing::warn!(%e, target = %selection.target_id, "history fetch failed");
                self.conversation.set_loading(false);
                self.toast(format!("Could not load messages: {e}"));
            }
        }
        self.emit_conversation();
    }

    pub(super) fn handle_directory_listed(
        &mut self,
        kind: ConversationKind,
        result: Result<Vec<DirectoryEntry>, DirectoryError>,
    ) {
        self.pending_listings = self.pending_listings.saturating_sub(1);
        match result {
            Ok(listing) => {
                tracing::debug!(kind = ?kind, count = listing.len(), "directory listed");
                // Listings of the wrong kind would alias distinct rows.
                let listing = listing.into_iter().filter(|e| e.kind == kind).collect();
                self.roster.merge_directory(listing);
                self.emit_roster();
            }
            Err(e) => {
                tracing::warn!(%e, kind = ?kind, "directory listing failed");
                self.toast(format!("Could not load conversations: {e}"));
            }
        }
        if self.pending_listings == 0 {
            self.set_busy(|b| b.syncing_roster = false);
        }
    }

    pub(super) fn handle_all_contacts_fetched(
        &mut self,
        result: Result<Vec<ContactOption>, DirectoryError>,
    ) {
        self.set_busy(|b| b.fetching_contacts = false);
        match result {
            Ok(contacts) => {
                self.state.all_contacts = contacts;
                self.emit_contacts();
            }
            Err(e) => {
                tracing::warn!(%e, "contact listing failed");
                self.toast(format!("Could not load contacts: {e}"));
            }
        }
    }

    pub(super) fn handle_channel_created(&mut self, result: Result<DirectoryEntry, DirectoryError>) {
        self.set_busy(|b| b.creating_channel = false);
        match result {
            Ok(entry) => {
                tracing::info!(channel_id = %entry.target_id, "channel created");
                self.roster.insert_channel(entry);
                self.emit_roster();
            }
            Err(e) => {
                tracing::warn!(%e, "create channel failed");
                self.toast(format!("Could not create channel: {e}"));
            }
        }
    }
}
