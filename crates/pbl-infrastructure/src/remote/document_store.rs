use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use pbl_core::document::{CollectionSnapshot, DocumentStore};
use pbl_core::error::{PblError, Result};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::trace;

use crate::registry::lock;

const SNAPSHOT_CAPACITY: usize = 64;

#[derive(Default)]
struct Collections {
    documents: HashMap<String, BTreeMap<String, Value>>,
    watchers: HashMap<String, broadcast::Sender<CollectionSnapshot>>,
    sequence: u64,
}

impl Collections {
    /// Bumps the sequence and pushes the new contents of `collection`.
    fn publish(&mut self, collection: &str) {
        self.sequence += 1;
        let Some(sender) = self.watchers.get(collection) else {
            return;
        };
        let documents = self
            .documents
            .get(collection)
            .map(|docs| docs.iter().map(|(id, doc)| (id.clone(), doc.clone())).collect())
            .unwrap_or_default();
        let snapshot = CollectionSnapshot {
            collection: collection.to_string(),
            sequence: self.sequence,
            documents,
        };
        trace!(collection = %collection, sequence = self.sequence, "Publishing snapshot");
        // Nobody watching is fine.
        let _ = sender.send(snapshot);
    }
}

/// A [`DocumentStore`] living in process memory.
///
/// Stands in for a hosted document database: every store handle built on
/// one shared instance behaves like a separate client of the same project.
/// Snapshots are published while the write still holds the lock, so
/// watchers see changes in the order they were accepted.
///
/// [`MemoryDocumentStore::set_offline`] makes every read and write fail with
/// a storage error until switched back, to exercise unreachable-backend
/// paths.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: Mutex<Collections>,
    offline: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    fn ensure_online(&self) -> Result<()> {
        if self.is_offline() {
            return Err(PblError::storage("Document store is unreachable"));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        self.ensure_online()?;
        let collections = lock(&self.collections);
        Ok(collections
            .documents
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn set(&self, collection: &str, id: &str, document: Value) -> Result<()> {
        self.ensure_online()?;
        let mut collections = lock(&self.collections);
        let docs = collections.documents.entry(collection.to_string()).or_default();
        if docs.get(id) == Some(&document) {
            return Ok(());
        }
        docs.insert(id.to_string(), document);
        collections.publish(collection);
        Ok(())
    }

    async fn merge(&self, collection: &str, id: &str, fields: Value) -> Result<()> {
        self.ensure_online()?;
        let Value::Object(fields) = fields else {
            return Err(PblError::validation("Merge fields must be a JSON object"));
        };
        let mut collections = lock(&self.collections);
        let document = collections
            .documents
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| PblError::not_found("Document", format!("{}/{}", collection, id)))?;
        let Value::Object(existing) = document else {
            return Err(PblError::internal(format!(
                "Document {}/{} is not an object",
                collection, id
            )));
        };
        for (field, value) in fields {
            existing.insert(field, value);
        }
        collections.publish(collection);
        Ok(())
    }

    async fn list(&self, collection: &str) -> Result<Vec<(String, Value)>> {
        self.ensure_online()?;
        let collections = lock(&self.collections);
        Ok(collections
            .documents
            .get(collection)
            .map(|docs| docs.iter().map(|(id, doc)| (id.clone(), doc.clone())).collect())
            .unwrap_or_default())
    }

    async fn clear(&self, collection: &str) -> Result<()> {
        self.ensure_online()?;
        let mut collections = lock(&self.collections);
        let had_documents = collections
            .documents
            .remove(collection)
            .is_some_and(|docs| !docs.is_empty());
        if had_documents {
            collections.publish(collection);
        }
        Ok(())
    }

    fn watch(&self, collection: &str) -> broadcast::Receiver<CollectionSnapshot> {
        lock(&self.collections)
            .watchers
            .entry(collection.to_string())
            .or_insert_with(|| broadcast::channel(SNAPSHOT_CAPACITY).0)
            .subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_and_watch() {
        let store = MemoryDocumentStore::new();
        let mut watcher = store.watch("sessions");

        store.set("sessions", "current", json!({"a": 1})).await.unwrap();
        assert_eq!(
            store.get("sessions", "current").await.unwrap(),
            Some(json!({"a": 1}))
        );

        let snapshot = watcher.try_recv().unwrap();
        assert_eq!(snapshot.document("current"), Some(&json!({"a": 1})));

        // Same document again publishes nothing.
        store.set("sessions", "current", json!({"a": 1})).await.unwrap();
        assert!(watcher.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_merge_overwrites_named_fields_only() {
        let store = MemoryDocumentStore::new();
        store
            .set("learners", "v1", json!({"name": "Kim", "step": "INTRO"}))
            .await
            .unwrap();
        store
            .merge("learners", "v1", json!({"step": "REPORT"}))
            .await
            .unwrap();

        assert_eq!(
            store.get("learners", "v1").await.unwrap(),
            Some(json!({"name": "Kim", "step": "REPORT"}))
        );
        let err = store
            .merge("learners", "missing", json!({"step": "REPORT"}))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_sequence_increases_across_collections() {
        let store = MemoryDocumentStore::new();
        let mut learners = store.watch("learners");
        store.set("sessions", "current", json!({})).await.unwrap();
        store.set("learners", "v1", json!({})).await.unwrap();
        store.clear("learners").await.unwrap();

        let first = learners.try_recv().unwrap();
        let second = learners.try_recv().unwrap();
        assert!(second.sequence > first.sequence);
        assert!(second.documents.is_empty());
    }

    #[tokio::test]
    async fn test_offline_rejects_operations() {
        let store = MemoryDocumentStore::new();
        store.set_offline(true);
        let err = store.set("sessions", "current", json!({})).await.unwrap_err();
        assert!(err.is_write_failure());
        assert!(store.list("learners").await.is_err());

        store.set_offline(false);
        store.set("sessions", "current", json!({})).await.unwrap();
    }
}
