#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chatsync_core::directory::{ChatDirectory, DirectoryEntry, DirectoryError};
use chatsync_core::transport::{
    ConnectParams, DuplexHandle, DuplexTransport, EventCallback, Listeners, TransportError,
};
use chatsync_core::{ChatMessage, ContactOption, ConversationKind, Selection};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::Semaphore;

/// One connection opened through [`FakeTransport`].
#[derive(Clone)]
pub struct FakeConnection {
    pub params: ConnectParams,
    listeners: Listeners,
    // Copies of every registered callback that survive `disconnect`, standing
    // in for a dispatch the transport had already started.
    raw: Arc<Mutex<Vec<(String, Arc<EventCallback>)>>>,
    emitted: Arc<Mutex<Vec<(String, serde_json::Value)>>>,
    disconnected: Arc<AtomicBool>,
    // Event names registered at the moment `start` ran.
    started_with: Arc<Mutex<Option<Vec<String>>>>,
}

impl FakeConnection {
    /// Deliver through the live listener registry. Returns false once the
    /// core has disconnected.
    pub fn deliver(&self, event: &str, payload: serde_json::Value) -> bool {
        self.listeners.dispatch(event, payload)
    }

    /// Invoke the callbacks directly, ignoring disconnect.
    pub fn deliver_raw(&self, event: &str, payload: serde_json::Value) {
        let callbacks: Vec<Arc<EventCallback>> = self
            .raw
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == event)
            .map(|(_, cb)| cb.clone())
            .collect();
        for cb in callbacks {
            cb(payload.clone());
        }
    }

    pub fn emitted(&self) -> Vec<(String, serde_json::Value)> {
        self.emitted.lock().unwrap().clone()
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    pub fn started_with(&self) -> Option<Vec<String>> {
        self.started_with.lock().unwrap().clone()
    }

    pub fn has_listener(&self, event: &str) -> bool {
        self.raw.lock().unwrap().iter().any(|(name, _)| name == event)
    }
}

struct FakeHandle {
    conn: FakeConnection,
}

impl DuplexHandle for FakeHandle {
    fn on(&mut self, event: &str, callback: EventCallback) {
        let cb = Arc::new(callback);
        let forward = cb.clone();
        self.conn
            .listeners
            .register(event, Box::new(move |payload| forward(payload)));
        self.conn.raw.lock().unwrap().push((event.to_string(), cb));
    }

    fn start(&mut self) {
        let names = self
            .conn
            .raw
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect();
        *self.conn.started_with.lock().unwrap() = Some(names);
    }

    fn emit(&self, event: &str, payload: serde_json::Value) -> Result<(), TransportError> {
        if self.conn.is_disconnected() {
            return Err(TransportError::Closed);
        }
        self.conn
            .emitted
            .lock()
            .unwrap()
            .push((event.to_string(), payload));
        Ok(())
    }

    fn disconnect(&mut self) {
        self.conn.listeners.clear();
        self.conn.disconnected.store(true, Ordering::SeqCst);
    }
}

#[derive(Clone, Default)]
pub struct FakeTransport {
    connections: Arc<Mutex<Vec<FakeConnection>>>,
    fail_next: Arc<Mutex<Option<TransportError>>>,
}

impl FakeTransport {
    pub fn connections(&self) -> Vec<FakeConnection> {
        self.connections.lock().unwrap().clone()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().unwrap().len()
    }

    pub fn last(&self) -> FakeConnection {
        self.connections
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no connection opened")
    }

    pub fn fail_next(&self, err: TransportError) {
        *self.fail_next.lock().unwrap() = Some(err);
    }
}

impl DuplexTransport for FakeTransport {
    fn connect(
        &self,
        _runtime: &tokio::runtime::Runtime,
        params: &ConnectParams,
    ) -> Result<Box<dyn DuplexHandle>, TransportError> {
        if let Some(err) = self.fail_next.lock().unwrap().take() {
            return Err(err);
        }
        let conn = FakeConnection {
            params: params.clone(),
            listeners: Listeners::default(),
            raw: Arc::new(Mutex::new(vec![])),
            emitted: Arc::new(Mutex::new(vec![])),
            disconnected: Arc::new(AtomicBool::new(false)),
            started_with: Arc::new(Mutex::new(None)),
        };
        self.connections.lock().unwrap().push(conn.clone());
        Ok(Box::new(FakeHandle { conn }))
    }
}

#[derive(Default)]
struct DirectoryScript {
    history: HashMap<String, Vec<ChatMessage>>,
    history_delay: HashMap<String, Duration>,
    dm_contacts: Vec<DirectoryEntry>,
    channels: Vec<DirectoryEntry>,
    all_contacts: Vec<ContactOption>,
    create_result: Option<Result<DirectoryEntry, DirectoryError>>,
    // When set, each roster listing waits for one permit.
    listing_gate: Option<Arc<Semaphore>>,
    calls: Vec<String>,
}

/// Scripted directory; every call is recorded by name.
#[derive(Clone, Default)]
pub struct FakeDirectory {
    script: Arc<Mutex<DirectoryScript>>,
}

impl FakeDirectory {
    pub fn set_history(&self, target_id: &str, messages: Vec<ChatMessage>) {
        self.script
            .lock()
            .unwrap()
            .history
            .insert(target_id.to_string(), messages);
    }

    pub fn delay_history(&self, target_id: &str, delay: Duration) {
        self.script
            .lock()
            .unwrap()
            .history_delay
            .insert(target_id.to_string(), delay);
    }

    pub fn set_dm_contacts(&self, entries: Vec<DirectoryEntry>) {
        self.script.lock().unwrap().dm_contacts = entries;
    }

    pub fn set_channels(&self, entries: Vec<DirectoryEntry>) {
        self.script.lock().unwrap().channels = entries;
    }

    pub fn set_all_contacts(&self, contacts: Vec<ContactOption>) {
        self.script.lock().unwrap().all_contacts = contacts;
    }

    pub fn set_create_result(&self, result: Result<DirectoryEntry, DirectoryError>) {
        self.script.lock().unwrap().create_result = Some(result);
    }

    /// Hold every roster listing until released.
    pub fn hold_listings(&self) {
        self.script.lock().unwrap().listing_gate = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let `n` held listings complete, oldest first.
    pub fn release_listings(&self, n: usize) {
        if let Some(gate) = self.script.lock().unwrap().listing_gate.as_ref() {
            gate.add_permits(n);
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.script.lock().unwrap().calls.clone()
    }

    fn record(&self, call: String) {
        self.script.lock().unwrap().calls.push(call);
    }
}

impl ChatDirectory for FakeDirectory {
    fn fetch_history(
        &self,
        selection: Selection,
    ) -> BoxFuture<'static, Result<Vec<ChatMessage>, DirectoryError>> {
        self.record(format!("history:{}", selection.target_id));
        let (messages, delay) = {
            let script = self.script.lock().unwrap();
            (
                script
                    .history
                    .get(&selection.target_id)
                    .cloned()
                    .unwrap_or_default(),
                script.history_delay.get(&selection.target_id).copied(),
            )
        };
        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Ok(messages)
        }
        .boxed()
    }

    fn fetch_dm_contacts(&self) -> BoxFuture<'static, Result<Vec<DirectoryEntry>, DirectoryError>> {
        self.record("dm_contacts".into());
        let (entries, gate) = {
            let script = self.script.lock().unwrap();
            (script.dm_contacts.clone(), script.listing_gate.clone())
        };
        async move {
            pass_gate(gate).await;
            Ok(entries)
        }
        .boxed()
    }

    fn fetch_channels(&self) -> BoxFuture<'static, Result<Vec<DirectoryEntry>, DirectoryError>> {
        self.record("channels".into());
        let (entries, gate) = {
            let script = self.script.lock().unwrap();
            (script.channels.clone(), script.listing_gate.clone())
        };
        async move {
            pass_gate(gate).await;
            Ok(entries)
        }
        .boxed()
    }

    fn fetch_all_contacts(
        &self,
    ) -> BoxFuture<'static, Result<Vec<ContactOption>, DirectoryError>> {
        self.record("all_contacts".into());
        let contacts = self.script.lock().unwrap().all_contacts.clone();
        async move { Ok(contacts) }.boxed()
    }

    fn create_channel(
        &self,
        name: String,
        member_ids: Vec<String>,
    ) -> BoxFuture<'static, Result<DirectoryEntry, DirectoryError>> {
        self.record(format!("create:{name}:{}", member_ids.join(",")));
        let result = self
            .script
            .lock()
            .unwrap()
            .create_result
            .take()
            .unwrap_or(Err(DirectoryError::Offline));
        async move { result }.boxed()
    }
}

async fn pass_gate(gate: Option<Arc<Semaphore>>) {
    if let Some(gate) = gate {
        if let Ok(permit) = gate.acquire().await {
            permit.forget();
        }
    }
}

pub fn channel_entry(id: &str, name: &str) -> DirectoryEntry {
    DirectoryEntry {
        kind: ConversationKind::Channel,
        target_id: id.to_string(),
        display_name: name.to_string(),
        image: None,
        color: None,
        last_activity_at: None,
    }
}

pub fn contact_entry(id: &str, name: &str) -> DirectoryEntry {
    DirectoryEntry {
        kind: ConversationKind::Direct,
        target_id: id.to_string(),
        display_name: name.to_string(),
        image: None,
        color: None,
        last_activity_at: None,
    }
}
