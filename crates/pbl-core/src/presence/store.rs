//! Presence store trait.

use async_trait::async_trait;

use super::model::LearnerRecord;
use crate::error::Result;
use crate::step::Step;
use crate::subscription::{Listener, Subscription};

/// Callback receiving the full roster, sorted by team id.
pub type PresenceListener = Listener<Vec<LearnerRecord>>;

/// An abstract store for the collection of learner presence records.
///
/// Each learner device writes only the record keyed by its own visitor id.
/// The only cross-record write is `clear_all`, issued when an admin opens a
/// new session.
///
/// Presence is best-effort telemetry: callers log failures from these
/// methods and carry on rather than blocking navigation on them.
#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// Creates or fully overwrites the record for `visitor_id`.
    ///
    /// `joined_at` is kept when the record already exists; `last_active_at`
    /// is always refreshed.
    async fn upsert(
        &self,
        visitor_id: &str,
        name: &str,
        team_id: u32,
        team_name: &str,
        current_step: Step,
    ) -> Result<()>;

    /// Updates only `current_step` and `last_active_at` of an existing record.
    ///
    /// The merge happens inside the backend, so two quick calls from the same
    /// client apply in arrival order without a client-side read.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: record updated
    /// - `Err(PblError::NotFound)`: no record exists for `visitor_id`
    /// - `Err(_)`: the backend could not be reached
    async fn update_step(&self, visitor_id: &str, current_step: Step) -> Result<()>;

    /// Registers `listener` for the current roster and every later change.
    async fn subscribe_all(&self, listener: PresenceListener) -> Subscription;

    /// Deletes every record.
    async fn clear_all(&self) -> Result<()>;

    /// Returns the current roster sorted by team id.
    ///
    /// Read failures yield an empty roster.
    async fn list_all(&self) -> Vec<LearnerRecord>;
}
