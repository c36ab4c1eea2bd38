use std::time::Duration;

use async_trait::async_trait;
use pbl_core::config::DEFAULT_POLL_INTERVAL_MS;
use pbl_core::error::Result;
use pbl_core::session::{SessionConfig, SessionListener, SessionStore};
use pbl_core::subscription::{Registration, Subscription};
use tracing::{debug, warn};

use super::{blocking, spawn_watcher};
use crate::registry::Registry;
use crate::storage::LocalStorage;

/// Storage key of the session config.
pub const SESSION_CONFIG_KEY: &str = "pbl_session_config";

/// `SessionStore` persisted in [`LocalStorage`] and polled for changes.
pub struct PolledSessionStore {
    storage: LocalStorage,
    poll_interval: Duration,
    listeners: Registry<SessionConfig>,
}

impl PolledSessionStore {
    pub fn new(storage: LocalStorage) -> Self {
        Self::with_poll_interval(storage, Duration::from_millis(DEFAULT_POLL_INTERVAL_MS))
    }

    pub fn with_poll_interval(storage: LocalStorage, poll_interval: Duration) -> Self {
        Self {
            storage,
            poll_interval,
            listeners: Registry::new(),
        }
    }

    /// Reads the stored config, falling back to the default when the key is
    /// missing or unreadable.
    fn load(storage: &LocalStorage) -> SessionConfig {
        match storage.load::<SessionConfig>(SESSION_CONFIG_KEY) {
            Ok(Some(config)) => config.normalized(),
            Ok(None) => SessionConfig::default(),
            Err(e) => {
                warn!(error = %e, "Unreadable session config, using default");
                SessionConfig::default()
            }
        }
    }
}

#[async_trait]
impl SessionStore for PolledSessionStore {
    async fn read(&self) -> SessionConfig {
        match blocking(&self.storage, |storage| Ok(Self::load(storage))).await {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Session config read failed, using default");
                SessionConfig::default()
            }
        }
    }

    async fn write(&self, config: SessionConfig) -> Result<()> {
        debug!(
            group_name = %config.group_name,
            total_teams = config.total_teams,
            active = config.is_session_active,
            "Writing session config"
        );
        let stored = config.clone();
        blocking(&self.storage, move |storage| {
            storage.save(SESSION_CONFIG_KEY, &stored)
        })
        .await?;
        self.listeners.broadcast(&config);
        Ok(())
    }

    async fn subscribe(&self, listener: SessionListener) -> Subscription {
        let (registration, subscription) = Registration::new(listener);
        registration.deliver(self.read().await);
        self.listeners.add(registration.clone());
        spawn_watcher(
            self.storage.clone(),
            SESSION_CONFIG_KEY,
            self.poll_interval,
            registration,
            Self::load,
        );
        subscription
    }
}
