//! Storage layer for atomic file operations and local key-value storage.

mod atomic_file;
mod local_storage;

pub use atomic_file::{AtomicFile, AtomicFileError, FileFormat};
pub use local_storage::{LocalStorage, StorageEvent};
