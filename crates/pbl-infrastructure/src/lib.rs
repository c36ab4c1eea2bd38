pub mod activation;
pub mod config_service;
pub mod local;
pub mod memory;
pub mod paths;
mod registry;
pub mod remote;
pub mod storage;

pub use crate::activation::ActivatingSessionStore;
pub use crate::config_service::ConfigService;
pub use crate::local::{PolledPresenceStore, PolledSessionStore};
pub use crate::memory::{InMemoryPresenceStore, InMemorySessionStore, MemoryDeviceStorage};
pub use crate::paths::PblPaths;
pub use crate::remote::{MemoryDocumentStore, RemotePresenceStore, RemoteSessionStore};
pub use crate::storage::LocalStorage;
