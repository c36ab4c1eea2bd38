use std::path::PathBuf;
use std::time::Duration as StdDuration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::presence::DEFAULT_ACTIVE_THRESHOLD_SECS;

/// Default interval between storage polls of the durable backend.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Which store backend a client is composed with.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BackendKind {
    /// Single instance, nothing leaves the process.
    Memory,
    /// Durable storage on this machine, polled for changes.
    #[default]
    Local,
    /// Shared document store with pushed change notifications.
    Remote,
}

/// Settings of the synchronization layer, read from `pbl.toml`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_active_threshold_secs")]
    pub active_threshold_secs: i64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Overrides the platform data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_active_threshold_secs() -> i64 {
    DEFAULT_ACTIVE_THRESHOLD_SECS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            active_threshold_secs: DEFAULT_ACTIVE_THRESHOLD_SECS,
            log_level: default_log_level(),
            data_dir: None,
        }
    }
}

impl SyncSettings {
    pub fn poll_interval(&self) -> StdDuration {
        StdDuration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn active_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.active_threshold_secs)
    }
}
