use std::sync::Arc;

use async_trait::async_trait;
use pbl_core::document::DocumentStore;
use pbl_core::error::Result;
use pbl_core::session::{SessionConfig, SessionListener, SessionStore};
use pbl_core::subscription::{Registration, Subscription};
use serde_json::Value;
use tracing::{debug, warn};

use super::spawn_listener;

pub const SESSIONS_COLLECTION: &str = "sessions";
/// Id of the single session document.
pub const CURRENT_SESSION_ID: &str = "current";

fn parse(document: Option<&Value>) -> SessionConfig {
    let Some(document) = document else {
        return SessionConfig::default();
    };
    match serde_json::from_value::<SessionConfig>(document.clone()) {
        Ok(config) => config.normalized(),
        Err(e) => {
            warn!(error = %e, "Malformed session document, using default");
            SessionConfig::default()
        }
    }
}

async fn fetch(documents: &dyn DocumentStore) -> SessionConfig {
    match documents.get(SESSIONS_COLLECTION, CURRENT_SESSION_ID).await {
        Ok(document) => parse(document.as_ref()),
        Err(e) => {
            warn!(error = %e, "Session document unreachable, using default");
            SessionConfig::default()
        }
    }
}

/// `SessionStore` kept in the `sessions/current` document of a
/// [`DocumentStore`].
pub struct RemoteSessionStore {
    documents: Arc<dyn DocumentStore>,
}

impl RemoteSessionStore {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }
}

#[async_trait]
impl SessionStore for RemoteSessionStore {
    async fn read(&self) -> SessionConfig {
        fetch(self.documents.as_ref()).await
    }

    async fn write(&self, config: SessionConfig) -> Result<()> {
        debug!(
            group_name = %config.group_name,
            total_teams = config.total_teams,
            active = config.is_session_active,
            "Writing session document"
        );
        let document = serde_json::to_value(&config)?;
        self.documents
            .set(SESSIONS_COLLECTION, CURRENT_SESSION_ID, document)
            .await
    }

    async fn subscribe(&self, listener: SessionListener) -> Subscription {
        // Watch before reading so no change can slip between the two.
        let snapshots = self.documents.watch(SESSIONS_COLLECTION);
        let (registration, subscription) = Registration::new(listener);
        registration.deliver(self.read().await);

        let documents = self.documents.clone();
        spawn_listener(
            snapshots,
            registration,
            |snapshot| parse(snapshot.document(CURRENT_SESSION_ID)),
            move || {
                let documents = documents.clone();
                async move { fetch(documents.as_ref()).await }
            },
        );
        subscription
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::test_support::eventually;
    use crate::remote::MemoryDocumentStore;
    use serde_json::json;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_two_clients_share_the_document() {
        let shared = Arc::new(MemoryDocumentStore::new());
        let admin = RemoteSessionStore::new(shared.clone());
        let learner = RemoteSessionStore::new(shared.clone());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _subscription = learner
            .subscribe(Arc::new(move |config| sink.lock().unwrap().push(config)))
            .await;

        let active = SessionConfig::active("Acme", 4).unwrap();
        admin.write(active.clone()).await.unwrap();
        admin.write(active.clone()).await.unwrap();

        assert!(eventually(|| seen.lock().unwrap().last() == Some(&active)).await);
        assert_eq!(seen.lock().unwrap().len(), 2);
        assert_eq!(learner.read().await, active);
    }

    #[tokio::test]
    async fn test_malformed_document_reads_default() {
        let shared = Arc::new(MemoryDocumentStore::new());
        shared
            .set(SESSIONS_COLLECTION, CURRENT_SESSION_ID, json!({"totalTeams": "many"}))
            .await
            .unwrap();
        let store = RemoteSessionStore::new(shared);
        assert_eq!(store.read().await, SessionConfig::default());
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        let shared = Arc::new(MemoryDocumentStore::new());
        let store = RemoteSessionStore::new(shared.clone());
        store
            .write(SessionConfig::active("Acme", 2).unwrap())
            .await
            .unwrap();

        shared.set_offline(true);
        assert_eq!(store.read().await, SessionConfig::default());
        let err = store
            .write(SessionConfig::active("Acme", 3).unwrap())
            .await
            .unwrap_err();
        assert!(err.is_write_failure());
    }
}
