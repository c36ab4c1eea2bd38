//! Publish/subscribe document store abstraction.
//!
//! The remote backends only need a store that can hold JSON documents in
//! named collections, replace or merge a document, wipe a collection and
//! push a fresh snapshot of a collection to every watcher after each change.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::Result;

/// Full contents of one collection after a change, in backend order.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSnapshot {
    pub collection: String,
    /// Monotonic per store; a higher sequence is a later accepted write.
    pub sequence: u64,
    pub documents: Vec<(String, Value)>,
}

impl CollectionSnapshot {
    /// Looks up a document by id.
    pub fn document(&self, id: &str) -> Option<&Value> {
        self.documents
            .iter()
            .find(|(doc_id, _)| doc_id == id)
            .map(|(_, doc)| doc)
    }
}

/// A shared JSON document store with pushed change notifications.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads one document.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>>;

    /// Replaces one document entirely, creating it if missing.
    async fn set(&self, collection: &str, id: &str, document: Value) -> Result<()>;

    /// Overwrites the given top-level fields of an existing document.
    ///
    /// Fails with `PblError::NotFound` when the document does not exist.
    async fn merge(&self, collection: &str, id: &str, fields: Value) -> Result<()>;

    /// Reads every document of a collection.
    async fn list(&self, collection: &str) -> Result<Vec<(String, Value)>>;

    /// Deletes every document of a collection.
    async fn clear(&self, collection: &str) -> Result<()>;

    /// Receives a snapshot of `collection` after each change to it.
    fn watch(&self, collection: &str) -> broadcast::Receiver<CollectionSnapshot>;
}
