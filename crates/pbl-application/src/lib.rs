//! Application layer for PBL sync.
//!
//! This crate provides the session controller that coordinates the shared
//! session and presence stores with the learner's local simulation state.

mod beacon;
pub mod controller;
pub mod screen;

pub use controller::{ExitOutcome, SessionController};
pub use screen::{AdminScreen, DashboardView, LearnerScreen, SetupDraft, ViewMode};
