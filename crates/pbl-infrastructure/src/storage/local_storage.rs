//! Directory-backed key-value storage with change notifications.

use std::path::{Path, PathBuf};

use pbl_core::error::{PblError, Result};
use pbl_core::identity::DeviceStorage;
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::broadcast;
use tracing::trace;

use super::atomic_file::AtomicFile;

const EVENT_CAPACITY: usize = 64;

/// Notification that a key was written through some handle of a storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
}

/// Durable key-value storage local to one machine.
///
/// Each key is a JSON file in the storage directory, written atomically
/// under an exclusive file lock. Clones of a handle share one notification
/// channel: a write through any clone is announced to every other clone at
/// once, the way a browser raises a storage event in sibling tabs. Handles
/// opened independently on the same directory (other processes) are not
/// notified and have to poll.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    dir: PathBuf,
    events: broadcast::Sender<StorageEvent>,
}

impl LocalStorage {
    /// Opens the storage rooted at `dir`. The directory is created lazily on
    /// the first write.
    pub fn open(dir: PathBuf) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { dir, events }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file<T>(&self, key: &str) -> AtomicFile<T>
    where
        T: Serialize + DeserializeOwned,
    {
        AtomicFile::json(self.dir.join(format!("{}.json", key)))
    }

    /// Reads and deserializes the value stored under `key`.
    pub fn load<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
    {
        Ok(self.file::<T>(key).load()?)
    }

    /// Replaces the value stored under `key` and announces the change.
    pub fn save<T>(&self, key: &str, value: &T) -> Result<()>
    where
        T: Serialize + DeserializeOwned,
    {
        let serialized = serde_json::to_value(value)?;
        self.file::<serde_json::Value>(key)
            .update_or_reset(serde_json::Value::Null, |current| {
                *current = serialized;
                Ok::<_, PblError>(())
            })?;
        self.notify(key);
        Ok(())
    }

    /// Read-modify-write of `key` under the file lock.
    ///
    /// A missing, empty or unparsable file starts from `default_value`.
    /// When `f` fails nothing is written and no change is announced.
    pub fn update<T, R, F>(&self, key: &str, default_value: T, f: F) -> Result<R>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut T) -> Result<R>,
    {
        let result = self.file::<T>(key).update_or_reset(default_value, f)?;
        self.notify(key);
        Ok(result)
    }

    /// Receives a [`StorageEvent`] for every write made through any clone of
    /// this handle.
    pub fn subscribe_events(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }

    fn notify(&self, key: &str) {
        trace!(key = %key, "Storage key changed");
        // No receivers is fine: nobody is watching yet.
        let _ = self.events.send(StorageEvent {
            key: key.to_string(),
        });
    }
}

impl DeviceStorage for LocalStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.load::<String>(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.save(key, &value.to_string())
    }
}
