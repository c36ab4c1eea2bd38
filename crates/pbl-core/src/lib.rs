//! Domain layer for the PBL session synchronization workspace.
//!
//! Holds the shared data model (session config, presence records, steps,
//! local simulation state), the store traits every backend implements, the
//! visitor identity helper and the dashboard aggregator.

pub mod config;
pub mod dashboard;
pub mod document;
pub mod error;
pub mod identity;
pub mod presence;
pub mod session;
pub mod simulation;
pub mod step;
pub mod subscription;

// Re-export common types
pub use error::{PblError, Result};
pub use presence::{LearnerRecord, PresenceStore};
pub use session::{SessionConfig, SessionStore};
pub use step::Step;
pub use subscription::{Listener, Subscription};
