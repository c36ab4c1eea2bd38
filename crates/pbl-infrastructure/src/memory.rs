//! In-memory store backends.
//!
//! Values live only inside the process. Writes reach every subscriber of the
//! same store instance synchronously, before `write` returns. Useful for a
//! single console and for tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use pbl_core::error::{PblError, Result};
use pbl_core::identity::DeviceStorage;
use pbl_core::presence::{LearnerRecord, PresenceListener, PresenceStore, sort_roster};
use pbl_core::session::{SessionConfig, SessionListener, SessionStore};
use pbl_core::step::Step;
use pbl_core::subscription::{Registration, Subscription};
use tracing::debug;

use crate::registry::{Registry, lock};

/// `SessionStore` holding the config in process memory.
pub struct InMemorySessionStore {
    config: Mutex<SessionConfig>,
    listeners: Registry<SessionConfig>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    /// Creates a store that starts from `config` instead of the default.
    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            config: Mutex::new(config),
            listeners: Registry::new(),
        }
    }

    /// Number of subscriptions still delivering.
    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn read(&self) -> SessionConfig {
        lock(&self.config).clone()
    }

    async fn write(&self, config: SessionConfig) -> Result<()> {
        debug!(
            group_name = %config.group_name,
            total_teams = config.total_teams,
            active = config.is_session_active,
            "Writing session config"
        );
        *lock(&self.config) = config.clone();
        self.listeners.broadcast(&config);
        Ok(())
    }

    async fn subscribe(&self, listener: SessionListener) -> Subscription {
        let (registration, subscription) = Registration::new(listener);
        let current = lock(&self.config).clone();
        registration.deliver(current);
        self.listeners.add(registration);
        subscription
    }
}

/// `PresenceStore` holding the roster in process memory.
pub struct InMemoryPresenceStore {
    records: Mutex<BTreeMap<String, LearnerRecord>>,
    listeners: Registry<Vec<LearnerRecord>>,
}

impl InMemoryPresenceStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
            listeners: Registry::new(),
        }
    }

    /// Number of subscriptions still delivering.
    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }

    fn roster(records: &BTreeMap<String, LearnerRecord>) -> Vec<LearnerRecord> {
        let mut roster: Vec<_> = records.values().cloned().collect();
        sort_roster(&mut roster);
        roster
    }

    /// Applies `f` to the record map and notifies subscribers of the result.
    fn mutate<R>(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, LearnerRecord>) -> Result<R>,
    ) -> Result<R> {
        let (result, roster) = {
            let mut records = lock(&self.records);
            let result = f(&mut records)?;
            (result, Self::roster(&records))
        };
        self.listeners.broadcast(&roster);
        Ok(result)
    }
}

impl Default for InMemoryPresenceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PresenceStore for InMemoryPresenceStore {
    async fn upsert(
        &self,
        visitor_id: &str,
        name: &str,
        team_id: u32,
        team_name: &str,
        current_step: Step,
    ) -> Result<()> {
        self.mutate(|records| {
            let record = LearnerRecord::upserted(
                records.get(visitor_id),
                visitor_id,
                name,
                team_id,
                team_name,
                current_step,
                Utc::now(),
            );
            records.insert(visitor_id.to_string(), record);
            Ok(())
        })
    }

    async fn update_step(&self, visitor_id: &str, current_step: Step) -> Result<()> {
        self.mutate(|records| {
            let record = records
                .get_mut(visitor_id)
                .ok_or_else(|| PblError::not_found("LearnerRecord", visitor_id))?;
            record.advance(current_step, Utc::now());
            Ok(())
        })
    }

    async fn subscribe_all(&self, listener: PresenceListener) -> Subscription {
        let (registration, subscription) = Registration::new(listener);
        let current = Self::roster(&lock(&self.records));
        registration.deliver(current);
        self.listeners.add(registration);
        subscription
    }

    async fn clear_all(&self) -> Result<()> {
        self.mutate(|records| {
            records.clear();
            Ok(())
        })
    }

    async fn list_all(&self) -> Vec<LearnerRecord> {
        Self::roster(&lock(&self.records))
    }
}

/// `DeviceStorage` that forgets everything when dropped.
#[derive(Debug, Default)]
pub struct MemoryDeviceStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryDeviceStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeviceStorage for MemoryDeviceStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.items).get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.items).insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pbl_core::identity::get_or_create_visitor_id;
    use std::sync::Arc;

    fn collecting<T: Send + 'static>() -> (Arc<Mutex<Vec<T>>>, Arc<dyn Fn(T) + Send + Sync>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, Arc::new(move |value: T| sink.lock().unwrap().push(value)))
    }

    #[tokio::test]
    async fn test_subscribe_delivers_current_then_changes() {
        let store = InMemorySessionStore::new();
        let (seen, listener) = collecting::<SessionConfig>();
        let _subscription = store.subscribe(listener).await;

        let active = SessionConfig::active("Acme", 4).unwrap();
        store.write(active.clone()).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], SessionConfig::default());
        assert_eq!(seen[1], active);
    }

    #[tokio::test]
    async fn test_identical_write_is_not_redelivered() {
        let store = InMemorySessionStore::new();
        let (seen, listener) = collecting::<SessionConfig>();
        let _subscription = store.subscribe(listener).await;

        let active = SessionConfig::active("Acme", 4).unwrap();
        store.write(active.clone()).await.unwrap();
        store.write(active.clone()).await.unwrap();

        assert_eq!(seen.lock().unwrap().len(), 2);
        assert_eq!(store.read().await, active);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let store = InMemorySessionStore::new();
        let (seen, listener) = collecting::<SessionConfig>();
        let subscription = store.subscribe(listener).await;
        assert_eq!(store.subscriber_count(), 1);

        subscription.unsubscribe();
        store
            .write(SessionConfig::active("Acme", 2).unwrap())
            .await
            .unwrap();

        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_upsert_keeps_joined_at() {
        let store = InMemoryPresenceStore::new();
        store.upsert("v1", "Kim", 2, "2조", Step::Situation).await.unwrap();
        let first = store.list_all().await[0].clone();

        store.upsert("v1", "Kim", 3, "3조", Step::AnalysisWhy).await.unwrap();
        let second = store.list_all().await[0].clone();

        assert_eq!(second.joined_at, first.joined_at);
        assert_eq!(second.team_id, 3);
        assert_eq!(second.current_step, Step::AnalysisWhy);
        assert!(second.last_active_at >= first.last_active_at);
    }

    #[tokio::test]
    async fn test_update_step_requires_record() {
        let store = InMemoryPresenceStore::new();
        let err = store.update_step("ghost", Step::Report).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(store.list_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_roster_is_sorted_and_cleared() {
        let store = InMemoryPresenceStore::new();
        let (seen, listener) = collecting::<Vec<LearnerRecord>>();
        let _subscription = store.subscribe_all(listener).await;

        store.upsert("b", "Lee", 3, "3조", Step::Situation).await.unwrap();
        store.upsert("a", "Kim", 1, "1조", Step::Situation).await.unwrap();
        store.update_step("b", Step::Solution).await.unwrap();

        let roster = store.list_all().await;
        let teams: Vec<u32> = roster.iter().map(|r| r.team_id).collect();
        assert_eq!(teams, vec![1, 3]);
        assert_eq!(roster[1].current_step, Step::Solution);

        store.clear_all().await.unwrap();
        assert!(store.list_all().await.is_empty());

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 5);
        assert!(seen[0].is_empty());
        assert!(seen[4].is_empty());
    }

    #[test]
    fn test_device_storage_keeps_visitor_id() {
        let storage = MemoryDeviceStorage::new();
        let first = get_or_create_visitor_id(&storage);
        assert_eq!(get_or_create_visitor_id(&storage), first);
    }
}
