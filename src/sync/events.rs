//! Inbound push events.
//!
//! Wire shapes of the delta events published by the reference service, tagged
//! by their `event` name, and the outcome of applying one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::SegmentChange;
use crate::identity::CategoryReferenceId;
use crate::metric::MetricKey;
use crate::segment::{SegmentDefinitionId, SegmentDefinitionPayload};

/// Create/update delta for a segment definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentDefinitionDelta {
    /// Definition fields as published.
    #[serde(flatten)]
    pub definition: SegmentDefinitionPayload,
    /// Ordering key for last-write-wins.
    pub timestamp: DateTime<Utc>,
}

/// Removal delta for a segment definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentDefinitionRemoval {
    /// Definition to drop.
    pub id: SegmentDefinitionId,
    /// Ordering key for last-write-wins.
    pub timestamp: DateTime<Utc>,
}

/// Metrics-updated delta: names the changed keys only. Values are always
/// re-fetched from the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsDelta {
    /// Reference whose metrics changed.
    pub id: CategoryReferenceId,
    /// Reference id without the category prefix.
    pub reference_id: String,
    /// Category of the reference.
    pub category: String,
    /// Changed metric keys.
    #[serde(alias = "metricKeys", alias = "fullKeys")]
    pub keys: Vec<MetricKey>,
    /// Upstream time of the change.
    pub timestamp: DateTime<Utc>,
}

/// Inbound push events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum DeltaEvent {
    /// A segment definition was created.
    #[serde(rename = "segment_definition.created")]
    SegmentDefinitionCreated(SegmentDefinitionDelta),

    /// A segment definition was updated.
    #[serde(rename = "segment_definition.updated")]
    SegmentDefinitionUpdated(SegmentDefinitionDelta),

    /// A segment definition was deleted.
    #[serde(rename = "segment_definition.removed")]
    SegmentDefinitionRemoved(SegmentDefinitionRemoval),

    /// A reference joined a segment.
    #[serde(rename = "segment.added")]
    SegmentAdded(SegmentChange),

    /// A reference left a segment.
    #[serde(rename = "segment.removed")]
    SegmentRemoved(SegmentChange),

    /// Some metrics of a reference changed.
    #[serde(rename = "reference_metrics.updated")]
    ReferenceMetricsUpdated(MetricsDelta),
}

impl DeltaEvent {
    /// Every wire name, in declaration order.
    pub const NAMES: [&'static str; 6] = [
        "segment_definition.created",
        "segment_definition.updated",
        "segment_definition.removed",
        "segment.added",
        "segment.removed",
        "reference_metrics.updated",
    ];

    /// Wire name of the event.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SegmentDefinitionCreated(_) => Self::NAMES[0],
            Self::SegmentDefinitionUpdated(_) => Self::NAMES[1],
            Self::SegmentDefinitionRemoved(_) => Self::NAMES[2],
            Self::SegmentAdded(_) => Self::NAMES[3],
            Self::SegmentRemoved(_) => Self::NAMES[4],
            Self::ReferenceMetricsUpdated(_) => Self::NAMES[5],
        }
    }

    /// Event timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::SegmentDefinitionCreated(d) | Self::SegmentDefinitionUpdated(d) => d.timestamp,
            Self::SegmentDefinitionRemoved(r) => r.timestamp,
            Self::SegmentAdded(c) | Self::SegmentRemoved(c) => c.timestamp,
            Self::ReferenceMetricsUpdated(m) => m.timestamp,
        }
    }
}

/// What a delta did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaOutcome {
    /// The delta was applied.
    Applied,
    /// The delta is older than the stored state and was discarded.
    Stale,
    /// The delta targets something this cache does not track.
    Untracked,
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::segment::{AccessPolicy, SegmentType};

    #[test]
    fn test_decode_definition_update() {
        let event: DeltaEvent = serde_json::from_value(json!({
            "event": "segment_definition.updated",
            "id": "vip",
            "type": "Auto",
            "category": "ACCOUNT",
            "policy": { "accessPolicies": ["WRITE"] },
            "visible": true,
            "timestamp": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        let DeltaEvent::SegmentDefinitionUpdated(delta) = &event else {
            panic!("unexpected variant {event:?}");
        };
        assert_eq!(delta.definition.segment_type, SegmentType::Auto);
        assert_eq!(delta.definition.policy.access_policies, vec![AccessPolicy::new("WRITE")]);
        assert_eq!(event.name(), "segment_definition.updated");
    }

    #[test]
    fn test_decode_segment_and_metrics_deltas() {
        let added: DeltaEvent = serde_json::from_value(json!({
            "event": "segment.added",
            "categoryReferenceId": "ACCOUNT:1",
            "segmentDefinitionId": "vip",
            "timestamp": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert!(matches!(added, DeltaEvent::SegmentAdded(ref c) if c.category_reference_id.as_str() == "ACCOUNT:1"));

        let metrics: DeltaEvent = serde_json::from_value(json!({
            "event": "reference_metrics.updated",
            "id": "ACCOUNT:1",
            "referenceId": "1",
            "category": "ACCOUNT",
            "metricKeys": ["GOLD"],
            "timestamp": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        let DeltaEvent::ReferenceMetricsUpdated(delta) = metrics else {
            panic!("unexpected variant");
        };
        assert_eq!(delta.keys, vec![MetricKey::new("GOLD")]);
    }

    #[test]
    fn test_unknown_event_name_is_rejected() {
        let result = serde_json::from_value::<DeltaEvent>(json!({ "event": "segment.renamed" }));
        assert!(result.is_err());
    }
}
