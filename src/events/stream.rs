//! Subscriber side of the event bus.
//!
//! A stream owns its receiving channel and removes its sender from the bus
//! when dropped or unsubscribed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Weak;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::error::EventError;

use super::bus::Subscribers;
use super::{DomainEvent, SubscriptionId};

/// A subscription to domain events.
///
/// Dropping the stream unsubscribes it.
#[derive(Debug)]
pub struct EventStream {
    subscription_id: SubscriptionId,
    rx: Receiver<DomainEvent>,
    subscribers: Weak<Subscribers>,
    unregistered: AtomicBool,
}

impl EventStream {
    pub(crate) fn new(subscription_id: SubscriptionId, rx: Receiver<DomainEvent>, subscribers: Weak<Subscribers>) -> Self {
        Self {
            subscription_id,
            rx,
            subscribers,
            unregistered: AtomicBool::new(false),
        }
    }

    /// The subscription id backing this stream.
    #[must_use]
    pub const fn subscription_id(&self) -> SubscriptionId {
        self.subscription_id
    }

    /// Stop receiving new events. Idempotent; already buffered events can
    /// still be drained.
    pub fn unsubscribe(&self) {
        if self.unregistered.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers.lock().remove(&self.subscription_id);
        }
    }

    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<DomainEvent, EventError> {
        self.rx.recv().map_err(|_| EventError::Disconnected)
    }

    /// Receive the next event with a timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<DomainEvent, EventError> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => EventError::Timeout {
                duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            },
            RecvTimeoutError::Disconnected => EventError::Disconnected,
        })
    }

    /// Next buffered event, if any.
    #[must_use]
    pub fn try_recv(&self) -> Option<DomainEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
