use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use pbl_core::document::{CollectionSnapshot, DocumentStore};
use pbl_core::error::Result;
use pbl_core::presence::{LearnerRecord, PresenceListener, PresenceStore, sort_roster};
use pbl_core::step::Step;
use pbl_core::subscription::{Registration, Subscription};
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::spawn_listener;

/// Collection holding one document per visitor id.
pub const LEARNERS_COLLECTION: &str = "learners";

fn parse_record(id: &str, document: &Value) -> Option<LearnerRecord> {
    match serde_json::from_value(document.clone()) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(visitor_id = %id, error = %e, "Skipping malformed learner document");
            None
        }
    }
}

fn roster<'a>(documents: impl IntoIterator<Item = &'a (String, Value)>) -> Vec<LearnerRecord> {
    let mut roster: Vec<_> = documents
        .into_iter()
        .filter_map(|(id, document)| parse_record(id, document))
        .collect();
    sort_roster(&mut roster);
    roster
}

async fn fetch(documents: &dyn DocumentStore) -> Vec<LearnerRecord> {
    match documents.list(LEARNERS_COLLECTION).await {
        Ok(listed) => roster(&listed),
        Err(e) => {
            warn!(error = %e, "Learner collection unreachable");
            Vec::new()
        }
    }
}

/// `PresenceStore` keeping one document per learner in the `learners`
/// collection of a [`DocumentStore`].
pub struct RemotePresenceStore {
    documents: Arc<dyn DocumentStore>,
}

impl RemotePresenceStore {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }
}

#[async_trait]
impl PresenceStore for RemotePresenceStore {
    async fn upsert(
        &self,
        visitor_id: &str,
        name: &str,
        team_id: u32,
        team_name: &str,
        current_step: Step,
    ) -> Result<()> {
        debug!(visitor_id = %visitor_id, team_id, step = %current_step, "Upserting learner");
        // Only the owning device writes this document, so the read cannot race.
        let existing = self
            .documents
            .get(LEARNERS_COLLECTION, visitor_id)
            .await?
            .and_then(|document| parse_record(visitor_id, &document));
        let record = LearnerRecord::upserted(
            existing.as_ref(),
            visitor_id,
            name,
            team_id,
            team_name,
            current_step,
            Utc::now(),
        );
        self.documents
            .set(LEARNERS_COLLECTION, visitor_id, serde_json::to_value(&record)?)
            .await
    }

    async fn update_step(&self, visitor_id: &str, current_step: Step) -> Result<()> {
        let fields = json!({
            "currentStep": current_step,
            "lastActiveAt": Utc::now(),
        });
        self.documents
            .merge(LEARNERS_COLLECTION, visitor_id, fields)
            .await
    }

    async fn subscribe_all(&self, listener: PresenceListener) -> Subscription {
        let snapshots = self.documents.watch(LEARNERS_COLLECTION);
        let (registration, subscription) = Registration::new(listener);
        registration.deliver(self.list_all().await);

        let documents = self.documents.clone();
        spawn_listener(
            snapshots,
            registration,
            |snapshot: &CollectionSnapshot| roster(&snapshot.documents),
            move || {
                let documents = documents.clone();
                async move { fetch(documents.as_ref()).await }
            },
        );
        subscription
    }

    async fn clear_all(&self) -> Result<()> {
        debug!("Clearing learner collection");
        self.documents.clear(LEARNERS_COLLECTION).await
    }

    async fn list_all(&self) -> Vec<LearnerRecord> {
        fetch(self.documents.as_ref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::test_support::eventually;
    use crate::remote::MemoryDocumentStore;
    use std::sync::Mutex;

    fn shared_pair() -> (Arc<MemoryDocumentStore>, RemotePresenceStore, RemotePresenceStore) {
        let shared = Arc::new(MemoryDocumentStore::new());
        let first = RemotePresenceStore::new(shared.clone());
        let second = RemotePresenceStore::new(shared.clone());
        (shared, first, second)
    }

    #[tokio::test]
    async fn test_update_step_merges_without_touching_identity() {
        let (_shared, learner, admin) = shared_pair();
        learner.upsert("v1", "Kim", 2, "2조", Step::Situation).await.unwrap();
        let joined = admin.list_all().await[0].joined_at;

        learner.update_step("v1", Step::AnalysisWhy).await.unwrap();
        let record = admin.list_all().await[0].clone();
        assert_eq!(record.current_step, Step::AnalysisWhy);
        assert_eq!(record.name, "Kim");
        assert_eq!(record.joined_at, joined);

        let err = learner.update_step("ghost", Step::Report).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_malformed_documents_are_skipped() {
        let (shared, learner, admin) = shared_pair();
        learner.upsert("v1", "Kim", 2, "2조", Step::Situation).await.unwrap();
        shared
            .set(LEARNERS_COLLECTION, "junk", json!({"name": 5}))
            .await
            .unwrap();

        let roster = admin.list_all().await;
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].visitor_id, "v1");
    }

    #[tokio::test]
    async fn test_subscribers_follow_pushes_until_dropped() {
        let (_shared, learner, admin) = shared_pair();
        let latest = Arc::new(Mutex::new(Vec::<LearnerRecord>::new()));
        let sink = latest.clone();
        let subscription = admin
            .subscribe_all(Arc::new(move |roster| *sink.lock().unwrap() = roster))
            .await;

        learner.upsert("v2", "Lee", 3, "3조", Step::Situation).await.unwrap();
        learner.upsert("v1", "Kim", 1, "1조", Step::Situation).await.unwrap();
        assert!(
            eventually(|| {
                let roster = latest.lock().unwrap();
                roster.len() == 2 && roster[0].team_id == 1
            })
            .await
        );

        drop(subscription);
        tokio::task::yield_now().await;
        learner.clear_all().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(latest.lock().unwrap().len(), 2);
        assert!(admin.list_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_offline_writes_fail_and_reads_are_empty() {
        let (shared, learner, _admin) = shared_pair();
        learner.upsert("v1", "Kim", 1, "1조", Step::Situation).await.unwrap();
        shared.set_offline(true);

        assert!(learner.update_step("v1", Step::Report).await.is_err());
        assert!(learner.clear_all().await.is_err());
        assert!(learner.list_all().await.is_empty());
    }
}
