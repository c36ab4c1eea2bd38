//! Presence domain module.
//!
//! A presence record is the synchronized progress beacon of one learner
//! device. It carries identity, team and current step, and nothing of the
//! learner's private answers.

mod model;
mod store;

pub use model::{
    DEFAULT_ACTIVE_THRESHOLD_SECS, LearnerRecord, default_active_threshold, sort_roster,
};
pub use store::{PresenceListener, PresenceStore};
