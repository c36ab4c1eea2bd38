//! Composition root of the console binaries.

mod bootstrap;

pub use bootstrap::{AppContext, Stores};
