mod config;
mod directory_sync;
mod inbound;
mod session;

use std::sync::{Arc, RwLock};

use flume::Sender;

use crate::actions::AppAction;
use crate::directory::{ChatDirectory, HttpDirectory, OfflineDirectory};
use crate::router::RosterKey;
use crate::state::{AppState, AuthState, BusyState, ConnectionState, Selection};
use crate::store::{ConversationStore, RosterStore};
use crate::transport::ws::WsTransport;
use crate::transport::{DuplexTransport, OfflineTransport};
use crate::updates::{AppUpdate, CoreMsg, InternalEvent};

pub(crate) use config::{default_app_config_json, load_app_config, AppConfig};
use session::Session;

/// The two network seams the actor drives.
pub struct Collaborators {
    pub transport: Arc<dyn DuplexTransport>,
    pub directory: Arc<dyn ChatDirectory>,
}

impl Collaborators {
    pub(crate) fn from_config(config: &AppConfig) -> Self {
        if !config.network_enabled() {
            tracing::info!("network disabled; using offline collaborators");
            return Self::offline();
        }
        let server_url = config.server_url();
        let directory: Arc<dyn ChatDirectory> = match HttpDirectory::new(server_url.clone()) {
            Ok(d) => Arc::new(d),
            Err(e) => {
                tracing::error!(%e, server_url = %server_url, "http directory unavailable");
                Arc::new(OfflineDirectory)
            }
        };
        Self {
            transport: Arc::new(WsTransport),
            directory,
        }
    }

    pub(crate) fn offline() -> Self {
        Self {
            transport: Arc::new(OfflineTransport),
            directory: Arc::new(OfflineDirectory),
        }
    }
}

pub(crate) struct AppCore {
    pub state: AppState,
    rev: u64,

    update_sender: Sender<AppUpdate>,
    core_sender: Sender<CoreMsg>,
    shared_state: Arc<RwLock<AppState>>,

    config: AppConfig,
    runtime: tokio::runtime::Runtime,
    transport: Arc<dyn DuplexTransport>,
    directory: Arc<dyn ChatDirectory>,

    session: Option<Session>,
    // Last token handed out; the live session (if any) owns it.
    session_token: u64,

    conversation: ConversationStore,
    roster: RosterStore,
    // Directory listings still in flight across every roster refresh.
    pending_listings: u32,
}

impl AppCore {
    pub fn new(
        update_sender: Sender<AppUpdate>,
        core_sender: Sender<CoreMsg>,
        shared_state: Arc<RwLock<AppState>>,
        config: AppConfig,
        collaborators: Collaborators,
    ) -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_time()
            .enable_io()
            .build()
            .expect("tokio runtime");

        let this = Self {
            state: AppState::empty(),
            rev: 0,
            update_sender,
            core_sender,
            shared_state,
            config,
            runtime,
            transport: collaborators.transport,
            directory: collaborators.directory,
            session: None,
            session_token: 0,
            conversation: ConversationStore::default(),
            roster: RosterStore::default(),
            pending_listings: 0,
        };

        // FfiApp::state() has a snapshot before the first action lands.
        let snapshot = this.state.clone();
        this.commit_state_snapshot(&snapshot);
        this
    }

    fn next_rev(&mut self) -> u64 {
        self.rev += 1;
        self.state.rev = self.rev;
        self.rev
    }

    fn commit_state_snapshot(&self, snapshot: &AppState) {
        match self.shared_state.write() {
            Ok(mut g) => *g = snapshot.clone(),
            Err(poison) => *poison.into_inner() = snapshot.clone(),
        }
    }

    /// Bump the rev, publish the snapshot, then send the update built from it.
    fn emit(&mut self, make: impl FnOnce(u64, &AppState) -> AppUpdate) {
        let rev = self.next_rev();
        let snapshot = self.state.clone();
        self.commit_state_snapshot(&snapshot);
        let _ = self.update_sender.send(make(rev, &snapshot));
    }

    fn emit_state(&mut self) {
        self.emit(|_, s| AppUpdate::FullState(s.clone()));
    }

    fn emit_auth(&mut self) {
        self.emit(|rev, s| AppUpdate::AuthChanged {
            rev,
            auth: s.auth.clone(),
        });
    }

    fn emit_selection(&mut self) {
        self.emit(|rev, s| AppUpdate::SelectionChanged {
            rev,
            selection: s.selection.clone(),
        });
    }

    fn emit_conversation(&mut self) {
        self.state.conversation = self.conversation.view();
        self.emit(|rev, s| AppUpdate::ConversationChanged {
            rev,
            conversation: s.conversation.clone(),
        });
    }

    fn emit_roster(&mut self) {
        self.state.roster = self.roster.list_all();
        self.emit(|rev, s| AppUpdate::RosterChanged {
            rev,
            roster: s.roster.clone(),
        });
    }

    fn emit_contacts(&mut self) {
        self.emit(|rev, s| AppUpdate::ContactsChanged {
            rev,
            all_contacts: s.all_contacts.clone(),
        });
    }

    fn emit_busy(&mut self) {
        self.emit(|rev, s| AppUpdate::BusyChanged {
            rev,
            busy: s.busy.clone(),
        });
    }

    fn emit_toast(&mut self) {
        self.emit(|rev, s| AppUpdate::ToastChanged {
            rev,
            toast: s.toast.clone(),
        });
    }

    fn toast(&mut self, msg: impl Into<String>) {
        // Stays in state until the UI clears it, so a resync still shows it.
        self.state.toast = Some(msg.into());
        self.emit_toast();
    }

    fn set_connection(&mut self, connection: ConnectionState) {
        if self.state.connection == connection {
            return;
        }
        self.state.connection = connection;
        self.emit(|rev, s| AppUpdate::ConnectionChanged {
            rev,
            connection: s.connection.clone(),
        });
    }

    fn set_busy(&mut self, f: impl FnOnce(&mut BusyState)) {
        let mut next = self.state.busy.clone();
        f(&mut next);
        if next != self.state.busy {
            self.state.busy = next;
            self.emit_busy();
        }
    }

    fn local_user_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.identity.user_id.as_str())
    }

    fn live_token(&self) -> Option<u64> {
        self.session.as_ref().map(|s| s.token)
    }

    /// Drop every piece of per-identity state.
    fn clear_identity_state(&mut self) {
        self.roster.clear();
        self.conversation.reset_for(None);
        self.pending_listings = 0;
        self.state.selection = None;
        self.state.conversation = None;
        self.state.roster = vec![];
        self.state.all_contacts = vec![];
        self.state.busy = BusyState::idle();
        self.state.connection = ConnectionState::Disconnected;
    }

    /// Returns false when the actor loop should stop.
    pub fn handle_message(&mut self, msg: CoreMsg) -> bool {
        match msg {
            CoreMsg::Action(action) => {
                // Never log `?action`: it carries message content.
                tracing::info!(action = action.tag(), "dispatch");
                self.handle_action(action);
            }
            CoreMsg::Internal(internal) => self.handle_internal(*internal),
            CoreMsg::Shutdown => {
                tracing::info!("shutdown");
                self.stop_session();
                return false;
            }
        }
        true
    }

    fn handle_internal(&mut self, event: InternalEvent) {
        if self.live_token() != Some(event.token()) {
            tracing::debug!(token = event.token(), live = ?self.live_token(), "stale session message dropped");
            return;
        }
        match event {
            InternalEvent::ChannelEvent { kind, payload, .. } => {
                self.handle_channel_event(kind, payload)
            }
            InternalEvent::ConnectionStatus { status, .. } => self.handle_connection_status(status),
            InternalEvent::HistoryFetched {
                selection,
                epoch,
                result,
                ..
            } => self.handle_history_fetched(selection, epoch, result),
            InternalEvent::DirectoryListed { kind, result, .. } => {
                self.handle_directory_listed(kind, result)
            }
            InternalEvent::AllContactsFetched { result, .. } => {
                self.handle_all_contacts_fetched(result)
            }
            InternalEvent::ChannelCreated { result, .. } => self.handle_channel_created(result),
        }
    }

    fn handle_action(&mut self, action: AppAction) {
        match action {
            AppAction::SignIn { identity } => {
                if identity.user_id.trim().is_empty() {
                    self.toast("Cannot sign in without a user id");
                    return;
                }
                if self.local_user_id() == Some(identity.user_id.as_str()) {
                    tracing::debug!(user_id = %identity.user_id, "already signed in");
                    return;
                }
                if let Err(e) = self.start_session(identity) {
                    tracing::error!(err = %format!("{e:#}"), "start_session failed");
                    self.set_connection(ConnectionState::Failed {
                        reason: format!("{e:#}"),
                    });
                    self.toast(format!("Connection failed: {e:#}"));
                }
            }
            AppAction::SignOut => {
                if self.session.is_none() && self.state.auth == AuthState::LoggedOut {
                    return;
                }
                self.stop_session();
                self.clear_identity_state();
                self.state.auth = AuthState::LoggedOut;
                self.emit_state();
            }
            AppAction::SelectConversation { selection } => self.select(Some(selection)),
            AppAction::ClearSelection => self.select(None),
            AppAction::SendMessage { content } => self.send_message(content),
            AppAction::CreateChannel { name, member_ids } => self.create_channel(name, member_ids),
            AppAction::RefreshRoster => self.refresh_roster(),
            AppAction::FetchAllContacts => self.fetch_all_contacts(),
            AppAction::ClearToast => {
                if self.state.toast.is_some() {
                    self.state.toast = None;
                    self.emit_toast();
                }
            }
        }
    }

    fn select(&mut self, selection: Option<Selection>) {
        if selection.is_some() && self.session.is_none() {
            self.toast("Sign in to open a conversation");
            return;
        }
        if self.state.selection == selection {
            return;
        }
        self.state.selection = selection.clone();
        self.conversation.reset_for(selection.clone());
        self.emit_selection();

        if let Some(sel) = selection.as_ref() {
            if self.roster.mark_read(&RosterKey::for_selection(sel)) {
                self.emit_roster();
            }
            if self.fetch_history_on_select() {
                self.conversation.set_loading(true);
                self.fetch_history(sel.clone());
            }
        }
        self.emit_conversation();
    }

    fn send_message(&mut self, content: String) {
        if content.trim().is_empty() {
            return;
        }
        let Some(selection) = self.state.selection.clone() else {
            self.toast("Open a conversation first");
            return;
        };
        let Some(session) = self.session.as_ref() else {
            self.toast("Not connected");
            return;
        };
        // No local append: the server echo is routed like any other event.
        if let Err(e) = session.send_text(&selection, &content) {
            tracing::warn!(%e, "send failed");
            self.toast(format!("Send failed: {e}"));
        }
    }
}
