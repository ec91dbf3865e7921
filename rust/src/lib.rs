mod actions;
mod core;
pub mod directory;
mod logging;
pub mod router;
mod state;
pub mod store;
pub mod transport;
mod updates;
pub mod wire;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;

use flume::{Receiver, Sender};

pub use crate::core::Collaborators;
pub use actions::AppAction;
pub use state::*;
pub use updates::*;

use crate::directory::ChatDirectory;
use crate::transport::DuplexTransport;

/// Return the default `chatsync_config.json` payload used when no config file exists.
#[uniffi::export]
pub fn default_config_json() -> String {
    core::default_app_config_json()
}

uniffi::setup_scaffolding!();

#[uniffi::export(callback_interface)]
pub trait AppReconciler: Send + Sync + 'static {
    fn reconcile(&self, update: AppUpdate);
}

#[derive(uniffi::Object)]
pub struct FfiApp {
    core_tx: Sender<CoreMsg>,
    update_rx: Receiver<AppUpdate>,
    listening: AtomicBool,
    shared_state: Arc<RwLock<AppState>>,
}

#[uniffi::export]
impl FfiApp {
    #[uniffi::constructor]
    pub fn new(data_dir: String) -> Arc<Self> {
        Self::start(data_dir, None)
    }

    pub fn state(&self) -> AppState {
        match self.shared_state.read() {
            Ok(g) => g.clone(),
            Err(poison) => poison.into_inner().clone(),
        }
    }

    pub fn dispatch(&self, action: AppAction) {
        // Contract: never block caller.
        let _ = self.core_tx.send(CoreMsg::Action(action));
    }

    pub fn listen_for_updates(&self, reconciler: Box<dyn AppReconciler>) {
        if self
            .listening
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // Avoid multiple listeners that would split messages.
            return;
        }

        let rx = self.update_rx.clone();
        thread::spawn(move || {
            while let Ok(update) = rx.recv() {
                reconciler.reconcile(update);
            }
        });
    }

    /// Tear down the session and stop the actor. Later dispatches are ignored.
    pub fn shutdown(&self) {
        let _ = self.core_tx.send(CoreMsg::Shutdown);
    }
}

impl FfiApp {
    /// Build an app around caller-supplied network seams instead of the
    /// config-selected ones.
    pub fn with_collaborators(
        data_dir: String,
        transport: Arc<dyn DuplexTransport>,
        directory: Arc<dyn ChatDirectory>,
    ) -> Arc<Self> {
        Self::start(
            data_dir,
            Some(Collaborators {
                transport,
                directory,
            }),
        )
    }

    fn start(data_dir: String, collaborators: Option<Collaborators>) -> Arc<Self> {
        let config = core::load_app_config(&data_dir);
        logging::init_logging(&data_dir, config.log_to_file());
        tracing::info!(data_dir = %data_dir, server_url = %config.server_url(), "FfiApp starting");

        let (update_tx, update_rx) = flume::unbounded();
        let (core_tx, core_rx) = flume::unbounded::<CoreMsg>();
        let shared_state = Arc::new(RwLock::new(AppState::empty()));

        // Actor loop thread (single threaded "app actor").
        let core_tx_for_core = core_tx.clone();
        let shared_for_core = shared_state.clone();
        thread::spawn(move || {
            let collaborators =
                collaborators.unwrap_or_else(|| Collaborators::from_config(&config));
            let mut core = crate::core::AppCore::new(
                update_tx,
                core_tx_for_core,
                shared_for_core,
                config,
                collaborators,
            );
            while let Ok(msg) = core_rx.recv() {
                if !core.handle_message(msg) {
                    break;
                }
            }
            tracing::debug!("actor loop exited");
        });

        Arc::new(Self {
            core_tx,
            update_rx,
            listening: AtomicBool::new(false),
            shared_state,
        })
    }
}

impl Drop for FfiApp {
    fn drop(&mut self) {
        // The actor holds a sender to itself, so the loop only ends on Shutdown.
        let _ = self.core_tx.send(CoreMsg::Shutdown);
    }
}
