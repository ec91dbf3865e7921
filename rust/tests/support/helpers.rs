#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chatsync_core::{AppReconciler, AppUpdate, ChatMessage, ConversationKind};

pub fn wait_until(what: &str, timeout: Duration, f: impl FnMut() -> bool) {
    wait_until_with_poll(what, timeout, Duration::from_millis(20), f);
}

pub fn wait_until_with_poll(
    what: &str,
    timeout: Duration,
    poll: Duration,
    mut f: impl FnMut() -> bool,
) {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if f() {
            return;
        }
        std::thread::sleep(poll);
    }
    panic!("{what}: condition not met within {timeout:?}");
}

/// Write `chatsync_config.json`. Tests inject their own collaborators, so
/// the network stays off regardless.
pub fn write_config(data_dir: &str, extra: serde_json::Value) {
    let path = std::path::Path::new(data_dir).join("chatsync_config.json");
    let mut v = serde_json::json!({ "disable_network": true });
    if let (Some(base), Some(extra)) = (v.as_object_mut(), extra.as_object()) {
        for (k, val) in extra {
            base.insert(k.clone(), val.clone());
        }
    }
    std::fs::write(path, serde_json::to_vec(&v).unwrap()).unwrap();
}

pub fn dm_payload(id: &str, sender: &str, recipient: &str, content: &str) -> serde_json::Value {
    serde_json::json!({
        "_id": id,
        "sender": { "_id": sender },
        "recipient": { "_id": recipient },
        "messageType": "text",
        "content": content,
        "timestamp": "2024-05-01T10:00:00.000Z",
    })
}

pub fn channel_payload(id: &str, sender: &str, channel: &str, content: &str) -> serde_json::Value {
    serde_json::json!({
        "_id": id,
        "sender": { "_id": sender },
        "channelId": channel,
        "messageType": "text",
        "content": content,
        "timestamp": 1_714_557_600_000i64,
    })
}

pub fn history_message(kind: ConversationKind, payload: serde_json::Value) -> ChatMessage {
    chatsync_core::wire::parse_message(kind, payload).unwrap()
}

#[derive(Clone)]
pub struct Collector(pub Arc<Mutex<Vec<AppUpdate>>>);

impl Collector {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(Vec::new())))
    }

    pub fn revs(&self) -> Vec<u64> {
        self.0.lock().unwrap().iter().map(AppUpdate::rev).collect()
    }

    pub fn roster_updates(&self) -> usize {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|u| matches!(u, AppUpdate::RosterChanged { .. }))
            .count()
    }

    pub fn last_toast(&self) -> Option<String> {
        self.0.lock().unwrap().iter().rev().find_map(|u| match u {
            AppUpdate::ToastChanged { toast, .. } => toast.clone(),
            AppUpdate::FullState(s) => s.toast.clone(),
            _ => None,
        })
    }
}

impl AppReconciler for Collector {
    fn reconcile(&self, update: AppUpdate) {
        self.0.lock().unwrap().push(update);
    }
}
