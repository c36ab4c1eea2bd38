//! Device-scoped visitor identity.
//!
//! A visitor id is generated once per device, stored in that device's
//! durable storage and then returned unchanged forever. It is the only key
//! linking a device to its presence record.

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;

/// Storage key under which the visitor id is kept.
pub const VISITOR_ID_KEY: &str = "pbl_visitor_id";

/// Minimal string key-value storage local to one device.
///
/// Mirrors what a browser's local storage offers. Taking it as an explicit
/// dependency lets tests substitute an in-memory fake.
pub trait DeviceStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    fn set_item(&self, key: &str, value: &str) -> Result<()>;
}

/// Returns the stored visitor id, generating and persisting one on first use.
///
/// If the storage cannot be read, a temporary id is returned and nothing is
/// written, so an id that is stored but unreadable right now is never
/// replaced. If only the write fails, the generated id is still returned;
/// it will not survive a restart.
pub fn get_or_create_visitor_id(storage: &dyn DeviceStorage) -> String {
    match storage.get_item(VISITOR_ID_KEY) {
        Ok(Some(existing)) if !existing.trim().is_empty() => return existing,
        Ok(_) => {}
        Err(e) => {
            let visitor_id = generate_visitor_id();
            warn!(
                error = %e,
                visitor_id = %visitor_id,
                "Failed to read visitor id, using a temporary one"
            );
            return visitor_id;
        }
    }

    let visitor_id = generate_visitor_id();
    if let Err(e) = storage.set_item(VISITOR_ID_KEY, &visitor_id) {
        warn!(error = %e, visitor_id = %visitor_id, "Failed to persist visitor id");
    } else {
        debug!(visitor_id = %visitor_id, "Generated new visitor id");
    }
    visitor_id
}

/// Builds a new id from a millisecond timestamp and a random component.
pub fn generate_visitor_id() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("visitor_{}_{}", Utc::now().timestamp_millis(), &random[..12])
}
