// Session lifecycle: one duplex channel per signed-in identity.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use flume::Sender;

use super::AppCore;
use crate::state::{AuthState, ConnectionState, Identity, Selection};
use crate::transport::{
    outbound_event_name, ConnectParams, DuplexHandle, EventCallback, InboundKind,
    TransportError, CONNECT_ERROR_EVENT, CONNECT_EVENT, DISCONNECT_EVENT,
};
use crate::updates::{CoreMsg, InternalEvent};
use crate::wire;

/// Everything tied to one signed-in identity. Dropping it is the teardown:
/// callbacks go quiet first, then the channel closes.
pub(super) struct Session {
    pub(super) identity: Identity,
    pub(super) token: u64,
    alive: Arc<AtomicBool>,
    handle: Box<dyn DuplexHandle>,
}

impl Session {
    pub(super) fn send_text(
        &self,
        selection: &Selection,
        content: &str,
    ) -> Result<(), TransportError> {
        let payload = wire::outbound_text(&self.identity.user_id, selection, content);
        self.handle
            .emit(outbound_event_name(selection.kind), payload)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        self.handle.disconnect();
        tracing::info!(user_id = %self.identity.user_id, token = self.token, "session released");
    }
}

/// Callback that forwards into the actor queue while the session is alive.
fn forward(
    alive: &Arc<AtomicBool>,
    tx: &Sender<CoreMsg>,
    make: impl Fn(serde_json::Value) -> InternalEvent + Send + Sync + 'static,
) -> EventCallback {
    let alive = alive.clone();
    let tx = tx.clone();
    Box::new(move |payload| {
        if !alive.load(Ordering::SeqCst) {
            return;
        }
        let _ = tx.send(CoreMsg::Internal(Box::new(make(payload))));
    })
}

fn connect_error_reason(payload: &serde_json::Value) -> String {
    payload
        .get("message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| payload.to_string())
}

impl AppCore {
    pub(super) fn start_session(&mut self, identity: Identity) -> anyhow::Result<()> {
        // Leaving the previous identity is a full teardown before anything new opens.
        if self.session.is_some() {
            self.stop_session();
            self.clear_identity_state();
            self.emit_state();
        }

        tracing::info!(user_id = %identity.user_id, "start_session");
        self.state.auth = AuthState::LoggedIn {
            user_id: identity.user_id.clone(),
            display_name: identity.display_name.clone(),
        };
        self.emit_auth();
        self.set_connection(ConnectionState::Connecting);

        self.session_token = self.session_token.wrapping_add(1);
        let token = self.session_token;
        let params = ConnectParams::for_identity(&self.config.server_url(), &identity);
        let mut handle = self
            .transport
            .connect(&self.runtime, &params)
            .context("connect duplex channel")?;

        let alive = Arc::new(AtomicBool::new(true));
        let tx = &self.core_sender;
        for kind in InboundKind::ALL {
            handle.on(
                kind.event_name(),
                forward(&alive, tx, move |payload| InternalEvent::ChannelEvent {
                    token,
                    kind,
                    payload,
                }),
            );
        }
        handle.on(
            CONNECT_EVENT,
            forward(&alive, tx, move |_| InternalEvent::ConnectionStatus {
                token,
                status: ConnectionState::Connected,
            }),
        );
        handle.on(
            DISCONNECT_EVENT,
            forward(&alive, tx, move |_| InternalEvent::ConnectionStatus {
                token,
                status: ConnectionState::Disconnected,
            }),
        );
        handle.on(
            CONNECT_ERROR_EVENT,
            forward(&alive, tx, move |payload| InternalEvent::ConnectionStatus {
                token,
                status: ConnectionState::Failed {
                    reason: connect_error_reason(&payload),
                },
            }),
        );
        handle.start();

        self.session = Some(Session {
            identity,
            token,
            alive,
            handle,
        });

        if self.sync_roster_on_connect() {
            self.refresh_roster();
        }
        Ok(())
    }

    pub(super) fn stop_session(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::info!(user_id = %session.identity.user_id, "stop_session");
            drop(session);
        }
    }

    pub(super) fn handle_connection_status(&mut self, status: ConnectionState) {
        match &status {
            ConnectionState::Connected => {
                tracing::info!(user_id = ?self.local_user_id(), "channel connected")
            }
            ConnectionState::Failed { reason } => {
                tracing::warn!(reason = %reason, "channel connect failed")
            }
            _ => tracing::info!(status = ?status, "channel status"),
        }
        self.set_connection(status);
    }
}
