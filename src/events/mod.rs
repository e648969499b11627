//! Outbound domain events.
//!
//! Accepted deltas are re-emitted as normalized [`DomainEvent`]s for
//! downstream consumers. Delivery goes through the [`EventBus`]: every
//! subscriber owns a bounded buffer and publishing never blocks.

mod bus;
mod stream;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::CategoryReferenceId;
use crate::metric::MetricMap;
use crate::segment::SegmentDefinitionId;

pub use bus::EventBus;
pub use stream::EventStream;

/// Unique identifier for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Create a new random subscription id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Segment membership change, as carried by `segment.added` and
/// `segment.removed` deltas and passed through unchanged downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentChange {
    /// Reference whose membership changed.
    pub category_reference_id: CategoryReferenceId,
    /// Segment joined or left.
    pub segment_definition_id: SegmentDefinitionId,
    /// Upstream time of the change.
    pub timestamp: DateTime<Utc>,
}

/// Payload of an outbound event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DomainEventPayload {
    /// A tracked reference joined a segment.
    SegmentCreated(SegmentChange),

    /// A tracked reference left a segment.
    SegmentRemoved(SegmentChange),

    /// Metrics of a tracked reference changed; `metrics` holds only the
    /// changed keys with their authoritative values.
    #[serde(rename_all = "camelCase")]
    ReferenceMetricsUpdated {
        /// Reference whose metrics changed.
        id: CategoryReferenceId,
        /// Reference id without the category prefix.
        reference_id: String,
        /// Category of the reference.
        category: String,
        /// Changed keys and their new values.
        metrics: MetricMap,
    },
}

impl DomainEventPayload {
    /// Wire name of the event.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SegmentCreated(_) => "segmentCreated",
            Self::SegmentRemoved(_) => "segmentRemoved",
            Self::ReferenceMetricsUpdated { .. } => "referenceMetricsUpdated",
        }
    }

    /// Reference the event is about.
    #[must_use]
    pub const fn reference(&self) -> &CategoryReferenceId {
        match self {
            Self::SegmentCreated(change) | Self::SegmentRemoved(change) => &change.category_reference_id,
            Self::ReferenceMetricsUpdated { id, .. } => id,
        }
    }
}

/// Event delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    /// Unique id of this delivery.
    pub event_id: Uuid,
    /// When the cache published it.
    pub emitted_at: DateTime<Utc>,
    /// What happened.
    pub payload: DomainEventPayload,
}

impl DomainEvent {
    /// Stamp a payload with a fresh id and the current time.
    #[must_use]
    pub fn new(payload: DomainEventPayload) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            emitted_at: Utc::now(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_names_and_reference() {
        let change = SegmentChange {
            category_reference_id: CategoryReferenceId::new("ACCOUNT", "1"),
            segment_definition_id: SegmentDefinitionId::new("vip"),
            timestamp: Utc::now(),
        };
        let created = DomainEventPayload::SegmentCreated(change.clone());
        assert_eq!(created.name(), "segmentCreated");
        assert_eq!(created.reference().as_str(), "ACCOUNT:1");
        assert_eq!(DomainEventPayload::SegmentRemoved(change).name(), "segmentRemoved");
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = DomainEvent::new(DomainEventPayload::ReferenceMetricsUpdated {
            id: CategoryReferenceId::new("ACCOUNT", "1"),
            reference_id: "1".to_string(),
            category: "ACCOUNT".to_string(),
            metrics: MetricMap::new(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["payload"]["type"], "referenceMetricsUpdated");
        assert_eq!(json["payload"]["referenceId"], "1");
        assert!(json["eventId"].is_string());
    }
}
