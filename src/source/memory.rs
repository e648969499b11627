//! In-memory upstream source.
//!
//! Serves a [`SourceSnapshot`] through the [`ReferenceSource`] contract,
//! paginating like the real API and counting calls per operation. Intended
//! for tests, benchmarks and JSON fixtures.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::identity::CategoryReferenceId;
use crate::metric::{Metric, MetricKey};
use crate::reference::Reference;
use crate::segment::{ReferenceSegment, SegmentAssignment, SegmentDefinition, SegmentDefinitionId};

use super::{MetricFilter, MetricQuery, Page, ReferenceQuery, ReferenceSource, SegmentQuery};

/// Everything the in-memory source knows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSnapshot {
    /// Reference records, enabled or not.
    #[serde(default)]
    pub references: Vec<Reference>,
    /// Metric rows.
    #[serde(default)]
    pub metrics: Vec<Metric>,
    /// Membership rows.
    #[serde(default)]
    pub segments: Vec<SegmentAssignment>,
    /// Segment definitions.
    #[serde(default)]
    pub segment_definitions: Vec<SegmentDefinition>,
}

/// Number of calls served per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceCalls {
    /// Paged reference fetches.
    pub get_references: usize,
    /// Single reference fetches.
    pub get_reference_by_id: usize,
    /// Per-reference metric fetches.
    pub get_reference_metrics: usize,
    /// Per-reference membership fetches.
    pub get_reference_segments: usize,
    /// Segment definition fetches.
    pub get_segment_definitions: usize,
    /// Paged membership fetches.
    pub get_segments: usize,
    /// Paged metric fetches.
    pub get_metrics: usize,
}

#[derive(Debug, Default)]
struct CallCounters {
    get_references: AtomicUsize,
    get_reference_by_id: AtomicUsize,
    get_reference_metrics: AtomicUsize,
    get_reference_segments: AtomicUsize,
    get_segment_definitions: AtomicUsize,
    get_segments: AtomicUsize,
    get_metrics: AtomicUsize,
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::Relaxed);
}

fn paginate<T: Clone>(items: &[T], page_index: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let page_count = items.len().div_ceil(page_size);
    let start = page_index.saturating_mul(page_size).min(items.len());
    let end = start.saturating_add(page_size).min(items.len());
    Page::new(items[start..end].to_vec(), page_index, page_count)
}

/// Thread-safe in-memory [`ReferenceSource`].
#[derive(Debug, Default)]
pub struct InMemorySource {
    snapshot: RwLock<SourceSnapshot>,
    calls: CallCounters,
}

impl InMemorySource {
    /// Create a source serving `snapshot`.
    #[must_use]
    pub fn new(snapshot: SourceSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
            calls: CallCounters::default(),
        }
    }

    /// Parse a JSON fixture into a source.
    pub fn from_json_str(json: &str) -> Result<Self, SourceError> {
        let snapshot: SourceSnapshot = serde_json::from_str(json).map_err(|e| SourceError::Decode {
            message: e.to_string(),
        })?;
        Ok(Self::new(snapshot))
    }

    /// Calls served so far.
    #[must_use]
    pub fn calls(&self) -> SourceCalls {
        let c = &self.calls;
        SourceCalls {
            get_references: c.get_references.load(Ordering::Relaxed),
            get_reference_by_id: c.get_reference_by_id.load(Ordering::Relaxed),
            get_reference_metrics: c.get_reference_metrics.load(Ordering::Relaxed),
            get_reference_segments: c.get_reference_segments.load(Ordering::Relaxed),
            get_segment_definitions: c.get_segment_definitions.load(Ordering::Relaxed),
            get_segments: c.get_segments.load(Ordering::Relaxed),
            get_metrics: c.get_metrics.load(Ordering::Relaxed),
        }
    }

    /// Insert or replace a reference record.
    pub fn upsert_reference(&self, reference: Reference) {
        let mut snapshot = self.snapshot.write();
        snapshot.references.retain(|r| r.id != reference.id);
        snapshot.references.push(reference);
    }

    /// Insert or replace a metric (matched by reference and key).
    pub fn upsert_metric(&self, metric: Metric) {
        let mut snapshot = self.snapshot.write();
        snapshot
            .metrics
            .retain(|m| !(m.category_reference_id == metric.category_reference_id && m.key == metric.key));
        snapshot.metrics.push(metric);
    }

    /// Remove a metric row.
    pub fn remove_metric(&self, key: &CategoryReferenceId, metric_key: &MetricKey) {
        self.snapshot
            .write()
            .metrics
            .retain(|m| !(&m.category_reference_id == key && &m.key == metric_key));
    }

    /// Add a membership row if it is not present yet.
    pub fn assign_segment(&self, assignment: SegmentAssignment) {
        let mut snapshot = self.snapshot.write();
        if !snapshot.segments.contains(&assignment) {
            snapshot.segments.push(assignment);
        }
    }

    /// Remove a membership row.
    pub fn unassign_segment(&self, key: &CategoryReferenceId, segment_definition_id: &SegmentDefinitionId) {
        self.snapshot
            .write()
            .segments
            .retain(|s| !(&s.key() == key && &s.segment_definition_id == segment_definition_id));
    }

    /// Insert or replace a segment definition.
    pub fn upsert_segment_definition(&self, definition: SegmentDefinition) {
        let mut snapshot = self.snapshot.write();
        snapshot.segment_definitions.retain(|d| d.id != definition.id);
        snapshot.segment_definitions.push(definition);
    }
}

#[async_trait]
impl ReferenceSource for InMemorySource {
    async fn get_references(&self, query: ReferenceQuery) -> Result<Page<Reference>, SourceError> {
        bump(&self.calls.get_references);
        let snapshot = self.snapshot.read();
        let matching: Vec<Reference> = snapshot
            .references
            .iter()
            .filter(|r| r.category == query.category)
            .filter(|r| query.enabled.map_or(true, |enabled| r.enabled == enabled))
            .cloned()
            .collect();
        Ok(paginate(&matching, query.page_index, query.page_size))
    }

    async fn get_reference_by_id(&self, id: &CategoryReferenceId) -> Result<Reference, SourceError> {
        bump(&self.calls.get_reference_by_id);
        self.snapshot
            .read()
            .references
            .iter()
            .find(|r| &r.id == id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound { id: id.clone() })
    }

    async fn get_reference_metrics(
        &self,
        id: &CategoryReferenceId,
        filter: MetricFilter,
    ) -> Result<Vec<Metric>, SourceError> {
        bump(&self.calls.get_reference_metrics);
        Ok(self
            .snapshot
            .read()
            .metrics
            .iter()
            .filter(|m| &m.category_reference_id == id && filter.accepts(&m.key))
            .cloned()
            .collect())
    }

    async fn get_reference_segments(
        &self,
        id: &CategoryReferenceId,
    ) -> Result<Vec<ReferenceSegment>, SourceError> {
        bump(&self.calls.get_reference_segments);
        Ok(self
            .snapshot
            .read()
            .segments
            .iter()
            .filter(|s| &s.key() == id)
            .map(|s| ReferenceSegment::new(s.segment_definition_id.clone()))
            .collect())
    }

    async fn get_segment_definitions(&self) -> Result<Vec<SegmentDefinition>, SourceError> {
        bump(&self.calls.get_segment_definitions);
        Ok(self.snapshot.read().segment_definitions.clone())
    }

    async fn get_segments(&self, query: SegmentQuery) -> Result<Page<SegmentAssignment>, SourceError> {
        bump(&self.calls.get_segments);
        let snapshot = self.snapshot.read();
        let matching: Vec<SegmentAssignment> = snapshot
            .segments
            .iter()
            .filter(|s| s.category == query.category)
            .cloned()
            .collect();
        Ok(paginate(&matching, query.page_index, query.page_size))
    }

    async fn get_metrics(&self, query: MetricQuery) -> Result<Page<Metric>, SourceError> {
        bump(&self.calls.get_metrics);
        let snapshot = self.snapshot.read();
        let matching: Vec<Metric> = snapshot
            .metrics
            .iter()
            .filter(|m| m.category_reference_id.category() == Some(query.category.as_str()))
            .cloned()
            .collect();
        Ok(paginate(&matching, query.page_index, query.page_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vehicles(n: usize) -> SourceSnapshot {
        SourceSnapshot {
            references: (0..n)
                .map(|i| Reference::new("VEHICLE", i.to_string(), format!("car-{i}")))
                .collect(),
            ..SourceSnapshot::default()
        }
    }

    #[test]
    fn test_paginate_bounds() {
        let items: Vec<u32> = (0..5).collect();
        let first = paginate(&items, 0, 2);
        assert_eq!(first.items, vec![0, 1]);
        assert_eq!(first.page_count, 3);
        let last = paginate(&items, 2, 2);
        assert_eq!(last.items, vec![4]);
        let beyond = paginate(&items, 9, 2);
        assert!(beyond.items.is_empty());
        assert_eq!(paginate::<u32>(&[], 0, 10).page_count, 0);
    }

    #[tokio::test]
    async fn test_get_references_filters_enabled() {
        let mut snapshot = vehicles(3);
        snapshot.references[1].enabled = false;
        let source = InMemorySource::new(snapshot);

        let page = source
            .get_references(ReferenceQuery {
                category: "VEHICLE".to_string(),
                enabled: Some(true),
                page_index: 0,
                page_size: 100,
            })
            .await
            .unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(source.calls().get_references, 1);
    }

    #[tokio::test]
    async fn test_get_reference_by_id_not_found() {
        let source = InMemorySource::new(vehicles(1));
        let missing = CategoryReferenceId::new("VEHICLE", "99");
        let err = source.get_reference_by_id(&missing).await.unwrap_err();
        assert_eq!(err, SourceError::NotFound { id: missing });
    }

    #[tokio::test]
    async fn test_metric_filter_by_full_keys() {
        let id = CategoryReferenceId::new("ACCOUNT", "1");
        let source = InMemorySource::new(SourceSnapshot {
            metrics: vec![
                Metric::new(&id, "LEVEL", 3.0),
                Metric::new(&id, "GOLD", 10.0),
                Metric::new("ACCOUNT:2", "LEVEL", 1.0),
            ],
            ..SourceSnapshot::default()
        });

        let all = source.get_reference_metrics(&id, MetricFilter::all()).await.unwrap();
        assert_eq!(all.len(), 2);

        let only_gold = source
            .get_reference_metrics(&id, MetricFilter::keys(vec![MetricKey::new("GOLD")]))
            .await
            .unwrap();
        assert_eq!(only_gold.len(), 1);
        assert_eq!(only_gold[0].key.as_str(), "GOLD");
    }

    #[test]
    fn test_from_json_str_rejects_garbage() {
        assert!(matches!(
            InMemorySource::from_json_str("{ not json"),
            Err(SourceError::Decode { .. })
        ));
    }
}
