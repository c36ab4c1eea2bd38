//! Bookkeeping of live subscriptions shared by the store backends.

use std::sync::{Arc, Mutex, MutexGuard};

use pbl_core::subscription::Registration;

/// Locks `mutex`, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Subscribers of one resource held by a single store instance.
///
/// Cancelled registrations are pruned whenever the list is touched.
pub(crate) struct Registry<T> {
    entries: Mutex<Vec<Arc<Registration<T>>>>,
}

impl<T: Clone + PartialEq> Registry<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn add(&self, registration: Arc<Registration<T>>) {
        let mut entries = lock(&self.entries);
        entries.retain(|entry| !entry.is_cancelled());
        entries.push(registration);
    }

    /// Delivers `value` to every live registration.
    ///
    /// The list lock is released before any listener runs.
    pub(crate) fn broadcast(&self, value: &T) {
        let live: Vec<_> = {
            let mut entries = lock(&self.entries);
            entries.retain(|entry| !entry.is_cancelled());
            entries.clone()
        };
        for registration in live {
            registration.deliver(value.clone());
        }
    }

    pub(crate) fn len(&self) -> usize {
        let mut entries = lock(&self.entries);
        entries.retain(|entry| !entry.is_cancelled());
        entries.len()
    }
}
