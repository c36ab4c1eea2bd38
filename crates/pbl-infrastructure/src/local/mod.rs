//! Durable store backends over [`LocalStorage`].
//!
//! Every instance opened on the same storage directory sees the same
//! session config and roster. Changes reach subscribers three ways:
//!
//! - writes through this store instance are delivered before `write` returns
//! - writes through another clone of the same `LocalStorage` handle arrive
//!   as storage events
//! - writes from anywhere else are picked up by a periodic poll
//!
//! All three funnel through one deduplicating delivery per subscriber.

mod presence;
mod session;

pub use presence::{PolledPresenceStore, LEARNERS_KEY};
pub use session::{PolledSessionStore, SESSION_CONFIG_KEY};

use std::sync::Arc;
use std::time::Duration;

use pbl_core::error::{PblError, Result};
use pbl_core::subscription::Registration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task;
use tokio::time::{self, MissedTickBehavior};
use tracing::trace;

use crate::storage::LocalStorage;

/// Runs blocking storage I/O off the async worker threads.
async fn blocking<T, F>(storage: &LocalStorage, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&LocalStorage) -> Result<T> + Send + 'static,
{
    let storage = storage.clone();
    task::spawn_blocking(move || f(&storage))
        .await
        .map_err(|e| PblError::io(format!("Failed to spawn blocking task: {}", e)))?
}

/// Keeps `registration` up to date with the value stored under `key` until
/// its subscription is cancelled.
///
/// `load` must not fail; it maps unreadable storage to a fallback value.
fn spawn_watcher<T, L>(
    storage: LocalStorage,
    key: &'static str,
    poll_interval: Duration,
    registration: Arc<Registration<T>>,
    load: L,
) where
    T: Clone + PartialEq + Send + Sync + 'static,
    L: Fn(&LocalStorage) -> T + Send + Sync + 'static,
{
    let mut events = storage.subscribe_events();
    let token = registration.cancellation();
    let load = Arc::new(load);

    tokio::spawn(async move {
        let mut ticker = time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the caller already delivered.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
                event = events.recv() => match event {
                    Ok(event) if event.key != key => continue,
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    // The task owns a handle, so the sender outlives the receiver.
                    Err(RecvError::Closed) => break,
                },
            }

            let load = load.clone();
            let value = match blocking(&storage, move |storage| Ok((*load)(storage))).await {
                Ok(value) => value,
                Err(_) => continue,
            };
            registration.deliver(value);
        }

        trace!(key = %key, "Storage watcher stopped");
    });
}
