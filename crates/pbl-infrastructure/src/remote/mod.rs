//! Store backends over a shared [`DocumentStore`].
//!
//! Changes are pushed: each subscriber owns a snapshot receiver on the
//! relevant collection and a task that turns snapshots into deliveries.
//! Writes made by this instance reach its own subscribers through the same
//! push, which keeps deliveries in the order the document store accepted
//! them.

mod document_store;
mod presence;
mod session;

pub use document_store::MemoryDocumentStore;
pub use presence::{LEARNERS_COLLECTION, RemotePresenceStore};
pub use session::{CURRENT_SESSION_ID, RemoteSessionStore, SESSIONS_COLLECTION};

use std::future::Future;
use std::sync::Arc;

use pbl_core::document::CollectionSnapshot;
use pbl_core::subscription::Registration;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, trace};

/// Feeds `registration` from pushed snapshots until its subscription is
/// cancelled or the document store goes away.
///
/// `from_snapshot` maps a snapshot to the delivered value. After the
/// receiver lags behind, `refetch` re-reads the collection instead, since
/// the skipped snapshots are gone.
fn spawn_listener<T, S, R, Fut>(
    mut snapshots: broadcast::Receiver<CollectionSnapshot>,
    registration: Arc<Registration<T>>,
    from_snapshot: S,
    refetch: R,
) where
    T: Clone + PartialEq + Send + Sync + 'static,
    S: Fn(&CollectionSnapshot) -> T + Send + 'static,
    R: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
{
    let token = registration.cancellation();
    tokio::spawn(async move {
        loop {
            let value = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                received = snapshots.recv() => match received {
                    Ok(snapshot) => from_snapshot(&snapshot),
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Snapshot receiver lagged, refetching");
                        refetch().await
                    }
                    Err(RecvError::Closed) => break,
                },
            };
            registration.deliver(value);
        }
        trace!("Snapshot listener stopped");
    });
}
