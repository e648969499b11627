//! Fan-out of domain events to subscribers.
//!
//! Each subscription owns a bounded crossbeam channel. `publish` uses
//! `try_send` so a slow or vanished subscriber never stalls a delta handler;
//! undeliverable events are counted instead.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::stream::EventStream;
use super::{DomainEvent, DomainEventPayload, SubscriptionId};

pub(crate) type Subscribers = Mutex<HashMap<SubscriptionId, Sender<DomainEvent>>>;

/// Outbound event bus.
#[derive(Debug)]
pub struct EventBus {
    capacity: usize,
    subscribers: Arc<Subscribers>,
    published: AtomicU64,
    dropped: AtomicU64,
}

impl EventBus {
    /// Create a bus whose subscribers buffer up to `capacity` events each.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            subscribers: Arc::new(Mutex::new(HashMap::new())),
            published: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Open a new subscription.
    #[must_use]
    pub fn subscribe(&self) -> EventStream {
        let subscription_id = SubscriptionId::new();
        let (tx, rx) = bounded::<DomainEvent>(self.capacity);
        self.subscribers.lock().insert(subscription_id, tx);
        debug!(subscription = %subscription_id, "event subscriber registered");
        EventStream::new(subscription_id, rx, Arc::downgrade(&self.subscribers))
    }

    /// Stamp and deliver a payload to every subscriber.
    ///
    /// Returns the number of subscribers that accepted the event.
    pub fn publish(&self, payload: DomainEventPayload) -> usize {
        let event = DomainEvent::new(payload);
        self.published.fetch_add(1, Ordering::Relaxed);

        let mut delivered = 0;
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|subscription_id, tx| match tx.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    subscription = %subscription_id,
                    event = event.payload.name(),
                    "event dropped: subscriber buffer full"
                );
                true
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(subscription = %subscription_id, "event subscriber gone, removing");
                false
            }
        });
        delivered
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Events published so far.
    #[must_use]
    pub fn published_events(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Deliveries skipped because a subscriber was full or gone.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Close every subscription; open streams become disconnected once drained.
    pub fn close(&self) {
        self.subscribers.lock().clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
