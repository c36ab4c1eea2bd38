use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use pbl_core::config::DEFAULT_POLL_INTERVAL_MS;
use pbl_core::error::{PblError, Result};
use pbl_core::presence::{LearnerRecord, PresenceListener, PresenceStore, sort_roster};
use pbl_core::step::Step;
use pbl_core::subscription::{Registration, Subscription};
use tracing::{debug, warn};

use super::{blocking, spawn_watcher};
use crate::registry::Registry;
use crate::storage::LocalStorage;

/// Storage key of the learner map, keyed by visitor id.
pub const LEARNERS_KEY: &str = "pbl_learners";

type LearnerMap = BTreeMap<String, LearnerRecord>;

fn roster(records: &LearnerMap) -> Vec<LearnerRecord> {
    let mut roster: Vec<_> = records.values().cloned().collect();
    sort_roster(&mut roster);
    roster
}

/// `PresenceStore` persisted in [`LocalStorage`] and polled for changes.
///
/// Each mutation is a locked read-modify-write of the whole learner map, so
/// concurrent learners on one machine never drop each other's records.
pub struct PolledPresenceStore {
    storage: LocalStorage,
    poll_interval: Duration,
    listeners: Registry<Vec<LearnerRecord>>,
}

impl PolledPresenceStore {
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

    fn load(storage: &LocalStorage) -> Vec<LearnerRecord> {
        match storage.load::<LearnerMap>(LEARNERS_KEY) {
            Ok(Some(records)) => roster(&records),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Unreadable learner roster, treating as empty");
                Vec::new()
            }
        }
    }

    /// Applies `f` to the stored map under the file lock, then notifies
    /// this instance's subscribers with the resulting roster.
    async fn mutate<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut LearnerMap) -> Result<()> + Send + 'static,
    {
        let updated = blocking(&self.storage, move |storage| {
            storage.update(LEARNERS_KEY, LearnerMap::new(), |records| {
                f(records)?;
                Ok(roster(records))
            })
        })
        .await?;
        self.listeners.broadcast(&updated);
        Ok(())
    }
}

#[async_trait]
impl PresenceStore for PolledPresenceStore {
    async fn upsert(
        &self,
        visitor_id: &str,
        name: &str,
        team_id: u32,
        team_name: &str,
        current_step: Step,
    ) -> Result<()> {
        debug!(visitor_id = %visitor_id, team_id, step = %current_step, "Upserting learner");
        let (visitor_id, name, team_name) = (
            visitor_id.to_string(),
            name.to_string(),
            team_name.to_string(),
        );
        self.mutate(move |records| {
            let record = LearnerRecord::upserted(
                records.get(&visitor_id),
                &visitor_id,
                &name,
                team_id,
                &team_name,
                current_step,
                Utc::now(),
            );
            records.insert(visitor_id, record);
            Ok(())
        })
        .await
    }

    async fn update_step(&self, visitor_id: &str, current_step: Step) -> Result<()> {
        let visitor_id = visitor_id.to_string();
        self.mutate(move |records| {
            let record = records
                .get_mut(&visitor_id)
                .ok_or_else(|| PblError::not_found("LearnerRecord", visitor_id.clone()))?;
            record.advance(current_step, Utc::now());
            Ok(())
        })
        .await
    }

    async fn subscribe_all(&self, listener: PresenceListener) -> Subscription {
        let (registration, subscription) = Registration::new(listener);
        registration.deliver(self.list_all().await);
        self.listeners.add(registration.clone());
        spawn_watcher(
            self.storage.clone(),
            LEARNERS_KEY,
            self.poll_interval,
            registration,
            Self::load,
        );
        subscription
    }

    async fn clear_all(&self) -> Result<()> {
        debug!("Clearing learner roster");
        self.mutate(|records| {
            records.clear();
            Ok(())
        })
        .await
    }

    async fn list_all(&self) -> Vec<LearnerRecord> {
        match blocking(&self.storage, |storage| Ok(Self::load(storage))).await {
            Ok(roster) => roster,
            Err(e) => {
                warn!(error = %e, "Learner roster read failed");
                Vec::new()
            }
        }
    }
}
