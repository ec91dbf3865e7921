use std::path::Path;

use serde::{Deserialize, Serialize};

use super::AppCore;

pub(crate) const CONFIG_FILE_NAME: &str = "chatsync_config.json";
const DEFAULT_SERVER_URL: &str = "http://localhost:8747";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub(crate) server_url: Option<String>,
    pub(crate) disable_network: Option<bool>,
    pub(crate) fetch_history_on_select: Option<bool>,
    pub(crate) sync_roster_on_connect: Option<bool>,
    pub(crate) log_to_file: Option<bool>,
}

impl AppConfig {
    pub(crate) fn server_url(&self) -> String {
        self.server_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SERVER_URL)
            .to_string()
    }

    pub(crate) fn network_enabled(&self) -> bool {
        // Keeps Rust tests deterministic and offline.
        if let Some(disable) = self.disable_network {
            return !disable;
        }
        std::env::var("CHATSYNC_DISABLE_NETWORK").ok().as_deref() != Some("1")
    }

    pub(crate) fn log_to_file(&self) -> bool {
        self.log_to_file.unwrap_or(false)
    }
}

pub(crate) fn load_app_config(data_dir: &str) -> AppConfig {
    let path = Path::new(data_dir).join(CONFIG_FILE_NAME);
    let Ok(bytes) = std::fs::read(&path) else {
        return AppConfig::default();
    };
    match serde_json::from_slice::<AppConfig>(&bytes) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!(path = %path.display(), %e, "unreadable config, using defaults");
            AppConfig::default()
        }
    }
}

pub(crate) fn default_app_config_json() -> String {
    let cfg = AppConfig {
        server_url: Some(DEFAULT_SERVER_URL.to_string()),
        disable_network: Some(false),
        fetch_history_on_select: Some(true),
        sync_roster_on_connect: Some(true),
        log_to_file: Some(false),
    };
    serde_json::to_string_pretty(&cfg).unwrap_or_else(|_| "{}".to_string())
}

impl AppCore {
    pub(super) fn fetch_history_on_select(&self) -> bool {
        self.config.fetch_history_on_select.unwrap_or(true)
    }

    pub(super) fn sync_roster_on_connect(&self) -> bool {
        self.config.sync_roster_on_connect.unwrap_or(true)
    }
}
