//! Segment definitions, access policies and membership assignments.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{CategoryReferenceId, ReferenceParam};

/// Identifier of a segment definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentDefinitionId(String);

impl SegmentDefinitionId {
    /// Wraps an upstream id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SegmentDefinitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SegmentDefinitionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SegmentDefinitionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Opaque permission tag granted through segment membership.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessPolicy(String);

impl AccessPolicy {
    /// Wraps a policy tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Returns the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccessPolicy {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl From<String> for AccessPolicy {
    fn from(tag: String) -> Self {
        Self(tag)
    }
}

/// How references enter a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentType {
    /// Memberships are assigned by an operator.
    Manual,
    /// Memberships are computed upstream from rules.
    Auto,
}

/// Policy block of a segment definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentPolicy {
    /// Access policies granted to every member.
    #[serde(default)]
    pub access_policies: Vec<AccessPolicy>,
}

impl SegmentPolicy {
    /// Creates a policy block from tags.
    #[must_use]
    pub fn with_access<I, P>(policies: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<AccessPolicy>,
    {
        Self {
            access_policies: policies.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true if the block grants `policy`.
    #[must_use]
    pub fn grants(&self, policy: &AccessPolicy) -> bool {
        self.access_policies.contains(policy)
    }
}

/// A segmentation/policy rule set that references may belong to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentDefinition {
    /// Unique definition id.
    pub id: SegmentDefinitionId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// How membership is decided upstream.
    #[serde(rename = "type")]
    pub segment_type: SegmentType,
    /// Category of references this segment applies to.
    pub category: String,
    /// Access policies granted to members.
    #[serde(default)]
    pub policy: SegmentPolicy,
    /// Presentation data, passed through untouched.
    #[serde(default)]
    pub style: serde_json::Value,
    /// Whether clients may show the segment.
    #[serde(default)]
    pub visible: bool,
    /// When the definition was created.
    pub created_date: DateTime<Utc>,
    /// Last-write-wins ordering key for delta updates.
    pub last_modified_date: DateTime<Utc>,
}

impl SegmentDefinition {
    /// Builds a definition from a delta payload stamped with `timestamp` for
    /// both creation and modification.
    #[must_use]
    pub fn from_payload(payload: SegmentDefinitionPayload, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: payload.id,
            name: payload.name,
            segment_type: payload.segment_type,
            category: payload.category,
            policy: payload.policy,
            style: payload.style,
            visible: payload.visible,
            created_date: timestamp,
            last_modified_date: timestamp,
        }
    }

    /// Returns true if this definition grants `policy`.
    #[must_use]
    pub fn grants(&self, policy: &AccessPolicy) -> bool {
        self.policy.grants(policy)
    }
}

/// Segment definition fields carried by create/update deltas.
///
/// Dates are not part of the payload; they come from the event timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentDefinitionPayload {
    /// Definition id.
    pub id: SegmentDefinitionId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// How membership is decided upstream.
    #[serde(rename = "type")]
    pub segment_type: SegmentType,
    /// Category the segment applies to.
    pub category: String,
    /// Access policies granted to members.
    #[serde(default)]
    pub policy: SegmentPolicy,
    /// Presentation data.
    #[serde(default)]
    pub style: serde_json::Value,
    /// Whether clients may show the segment.
    #[serde(default)]
    pub visible: bool,
}

impl SegmentDefinitionPayload {
    /// Creates a manual, visible definition payload without style data.
    #[must_use]
    pub fn new(id: impl Into<SegmentDefinitionId>, category: impl Into<String>, policy: SegmentPolicy) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            segment_type: SegmentType::Manual,
            category: category.into(),
            policy,
            style: serde_json::Value::Null,
            visible: true,
        }
    }
}

/// Membership row returned by the category-wide segment query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentAssignment {
    /// Category of the member reference.
    pub category: String,
    /// Member reference id, without category.
    pub reference_id: String,
    /// Segment the reference belongs to.
    pub segment_definition_id: SegmentDefinitionId,
}

impl SegmentAssignment {
    /// Creates an assignment row.
    #[must_use]
    pub fn new(
        category: impl Into<String>,
        reference_id: impl Into<String>,
        segment_definition_id: impl Into<SegmentDefinitionId>,
    ) -> Self {
        Self {
            category: category.into(),
            reference_id: reference_id.into(),
            segment_definition_id: segment_definition_id.into(),
        }
    }

    /// Key of the member reference.
    #[must_use]
    pub fn key(&self) -> CategoryReferenceId {
        ReferenceParam::new(&self.category, &self.reference_id).key()
    }
}

/// Membership row returned by the per-reference segment query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceSegment {
    /// Segment the reference belongs to.
    pub segment_definition_id: SegmentDefinitionId,
}

impl ReferenceSegment {
    /// Creates a row.
    #[must_use]
    pub fn new(segment_definition_id: impl Into<SegmentDefinitionId>) -> Self {
        Self {
            segment_definition_id: segment_definition_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_from_payload_stamps_both_dates() {
        let ts = Utc::now();
        let payload = SegmentDefinitionPayload::new("vip", "ACCOUNT", SegmentPolicy::with_access(["WRITE"]));
        let def = SegmentDefinition::from_payload(payload, ts);
        assert_eq!(def.created_date, ts);
        assert_eq!(def.last_modified_date, ts);
        assert!(def.grants(&AccessPolicy::new("WRITE")));
        assert!(!def.grants(&AccessPolicy::new("READ")));
    }

    #[test]
    fn test_definition_wire_format() {
        let json = serde_json::json!({
            "id": "seg-1",
            "type": "Auto",
            "category": "VEHICLE",
            "policy": { "accessPolicies": ["DRIVE"] },
            "visible": true,
            "createdDate": "2024-01-01T00:00:00Z",
            "lastModifiedDate": "2024-02-01T00:00:00Z"
        });
        let def: SegmentDefinition = serde_json::from_value(json).unwrap();
        assert_eq!(def.segment_type, SegmentType::Auto);
        assert_eq!(def.policy.access_policies, vec![AccessPolicy::new("DRIVE")]);
        assert!(def.style.is_null());
    }

    #[test]
    fn test_assignment_key() {
        let row = SegmentAssignment::new("VEHICLE", "12", "seg-1");
        assert_eq!(row.key().as_str(), "VEHICLE:12");
    }
}
