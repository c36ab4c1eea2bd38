//! Session store trait.

use async_trait::async_trait;

use super::model::SessionConfig;
use crate::error::Result;
use crate::subscription::{Listener, Subscription};

/// Callback receiving each new `SessionConfig`.
pub type SessionListener = Listener<SessionConfig>;

/// An abstract store for the singleton `SessionConfig`.
///
/// Implementations differ only in how far and how fast a write propagates:
/// an in-memory store reaches subscribers of the same instance, a durable
/// polled store reaches every instance sharing the same storage, and a
/// remote store reaches every instance connected to the same document
/// store. Callers pick a backend at composition time.
///
/// # Implementation Notes
///
/// - `read` never fails. Unreachable storage and malformed payloads both
///   fall back to `SessionConfig::default()` and are logged.
/// - `write` replaces the whole value. Writing the same value again is
///   harmless and must not produce a second notification.
/// - `subscribe` invokes the listener with the current value before it
///   returns and then once per distinct change, including changes made by
///   this instance.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns the current config, or the default on any failure.
    async fn read(&self) -> SessionConfig;

    /// Persists `config`, overwriting the previous value entirely.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: the backend accepted the write
    /// - `Err(_)`: the backend could not be reached or rejected the write
    async fn write(&self, config: SessionConfig) -> Result<()>;

    /// Registers `listener` for the current value and every later change.
    ///
    /// Delivery stops when the returned handle is dropped or unsubscribed.
    async fn subscribe(&self, listener: SessionListener) -> Subscription;
}
