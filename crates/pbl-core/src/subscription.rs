//! Subscription handles and change delivery shared by every store backend.

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

/// Callback invoked with each new value of a subscribed resource.
pub type Listener<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Handle returned by every `subscribe` call.
///
/// Dropping the handle or calling [`Subscription::unsubscribe`] cancels the
/// underlying token. Backends stop delivery and release their poll timers
/// or stream receivers as soon as the token is cancelled, so a handle must
/// be kept alive for as long as updates are wanted.
#[derive(Debug)]
pub struct Subscription {
    token: CancellationToken,
}

impl Subscription {
    /// Wraps a token the backend watches for cancellation.
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Stops delivery and releases backend resources.
    pub fn unsubscribe(self) {
        // Drop does the work.
    }

    /// Whether the subscription is still delivering.
    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Delivers values to a listener, skipping any value equal to the last one
/// delivered.
///
/// Every backend funnels its change sources (own writes, poll ticks,
/// storage notifications, pushed snapshots) through one of these per
/// subscriber, so a value that arrives twice only reaches the listener once.
pub struct Deduplicated<T> {
    last: Mutex<Option<T>>,
    listener: Listener<T>,
}

impl<T: Clone + PartialEq> Deduplicated<T> {
    pub fn new(listener: Listener<T>) -> Self {
        Self {
            last: Mutex::new(None),
            listener,
        }
    }

    /// Hands `value` to the listener unless it equals the previous delivery.
    ///
    /// Returns whether the listener was invoked.
    pub fn deliver(&self, value: T) -> bool {
        {
            let mut last = match self.last.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if last.as_ref() == Some(&value) {
                return false;
            }
            *last = Some(value.clone());
        }
        (self.listener)(value);
        true
    }
}

/// A registered listener together with its cancellation token.
///
/// Used by backends that deliver synchronously from the writer's call
/// stack rather than from a background task.
pub struct Registration<T> {
    token: CancellationToken,
    delivery: Deduplicated<T>,
}

impl<T: Clone + PartialEq> Registration<T> {
    /// Creates a registration and the subscription handle that controls it.
    pub fn new(listener: Listener<T>) -> (Arc<Self>, Subscription) {
        let token = CancellationToken::new();
        let registration = Arc::new(Self {
            token: token.clone(),
            delivery: Deduplicated::new(listener),
        });
        (registration, Subscription::new(token))
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A clone of the token, for background tasks that must stop with the
    /// subscription.
    pub fn cancellation(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn deliver(&self, value: T) -> bool {
        if self.is_cancelled() {
            return false;
        }
        self.delivery.deliver(value)
    }
}
