//! Session activation side effect.

use std::sync::Arc;

use async_trait::async_trait;
use pbl_core::error::Result;
use pbl_core::presence::PresenceStore;
use pbl_core::session::{SessionConfig, SessionListener, SessionStore};
use pbl_core::subscription::Subscription;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Wraps a `SessionStore` so that opening a session wipes the roster.
///
/// When a write moves `is_session_active` from false to true, every
/// presence record is deleted after the write succeeds. Rewriting an
/// already active config, editing it, or deactivating it leaves the roster
/// alone. A failed clear is logged and does not fail the write: the new
/// session is open, it just starts with stale presence entries.
pub struct ActivatingSessionStore<S> {
    inner: S,
    presence: Arc<dyn PresenceStore>,
    /// Serializes read-then-write so two concurrent opens see one edge.
    write_lock: Mutex<()>,
}

impl<S: SessionStore> ActivatingSessionStore<S> {
    pub fn new(inner: S, presence: Arc<dyn PresenceStore>) -> Self {
        Self {
            inner,
            presence,
            write_lock: Mutex::new(()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: SessionStore> SessionStore for ActivatingSessionStore<S> {
    async fn read(&self) -> SessionConfig {
        self.inner.read().await
    }

    async fn write(&self, config: SessionConfig) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let previous = self.inner.read().await;
        let activates = config.activates_from(Some(&previous));
        let group_name = config.group_name.clone();

        self.inner.write(config).await?;

        if activates {
            match self.presence.clear_all().await {
                Ok(()) => info!(group_name = %group_name, "Session opened, roster cleared"),
                Err(e) => warn!(
                    group_name = %group_name,
                    error = %e,
                    "Session opened but clearing the roster failed"
                ),
            }
        }
        Ok(())
    }

    async fn subscribe(&self, listener: SessionListener) -> Subscription {
        self.inner.subscribe(listener).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryPresenceStore, InMemorySessionStore};
    use crate::remote::{MemoryDocumentStore, RemotePresenceStore, RemoteSessionStore};
    use pbl_core::step::Step;

    async fn seeded_presence() -> Arc<InMemoryPresenceStore> {
        let presence = Arc::new(InMemoryPresenceStore::new());
        presence
            .upsert("v1", "Kim", 1, "1조", Step::Situation)
            .await
            .unwrap();
        presence
    }

    #[tokio::test]
    async fn test_activation_clears_roster() {
        let presence = seeded_presence().await;
        let store = ActivatingSessionStore::new(InMemorySessionStore::new(), presence.clone());

        store
            .write(SessionConfig::active("Acme", 4).unwrap())
            .await
            .unwrap();
        assert!(presence.list_all().await.is_empty());
        assert!(store.read().await.is_session_active);
    }

    #[tokio::test]
    async fn test_rewriting_active_session_keeps_roster() {
        let presence = Arc::new(InMemoryPresenceStore::new());
        let store = ActivatingSessionStore::new(InMemorySessionStore::new(), presence.clone());
        store
            .write(SessionConfig::active("Acme", 4).unwrap())
            .await
            .unwrap();

        presence
            .upsert("v1", "Kim", 1, "1조", Step::Situation)
            .await
            .unwrap();
        store
            .write(SessionConfig::active("Acme", 6).unwrap())
            .await
            .unwrap();
        assert_eq!(presence.list_all().await.len(), 1);

        let mut closed = store.read().await;
        closed.is_session_active = false;
        store.write(closed).await.unwrap();
        assert_eq!(presence.list_all().await.len(), 1);
    }

    #[tokio::test]
    async fn test_inactive_write_keeps_roster() {
        let presence = seeded_presence().await;
        let store = ActivatingSessionStore::new(InMemorySessionStore::new(), presence.clone());

        store.write(SessionConfig::default()).await.unwrap();
        assert_eq!(presence.list_all().await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_clear_does_not_fail_write() {
        let documents = Arc::new(MemoryDocumentStore::new());
        let presence = Arc::new(RemotePresenceStore::new(documents.clone()));
        presence
            .upsert("v1", "Kim", 1, "1조", Step::Situation)
            .await
            .unwrap();

        // Session config lives elsewhere; only presence is unreachable.
        let store = ActivatingSessionStore::new(InMemorySessionStore::new(), presence.clone());
        documents.set_offline(true);
        store
            .write(SessionConfig::active("Acme", 2).unwrap())
            .await
            .unwrap();
        assert!(store.read().await.is_session_active);

        documents.set_offline(false);
        assert_eq!(presence.list_all().await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_write_skips_clear() {
        let documents = Arc::new(MemoryDocumentStore::new());
        let presence = seeded_presence().await;
        let store = ActivatingSessionStore::new(
            RemoteSessionStore::new(documents.clone()),
            presence.clone(),
        );

        documents.set_offline(true);
        assert!(
            store
                .write(SessionConfig::active("Acme", 2).unwrap())
                .await
                .is_err()
        );
        assert_eq!(presence.list_all().await.len(), 1);
    }
}
