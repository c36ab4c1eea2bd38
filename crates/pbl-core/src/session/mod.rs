//! Session domain module.
//!
//! # Module Structure
//!
//! - `model`: the singleton `SessionConfig` and its team bounds
//! - `store`: the `SessionStore` trait implemented by every backend

mod model;
mod store;

pub use model::{DEFAULT_TOTAL_TEAMS, MAX_TEAMS, MIN_TEAMS, SessionConfig, team_name};
pub use store::{SessionListener, SessionStore};
