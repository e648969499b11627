//! Per-reference cache state.
//!
//! References, metric maps, segment-membership sets and ownership records
//! live behind a single lock so that a commit or an eviction touches all of
//! them at once. No lock is ever held across an upstream call.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;

use crate::identity::CategoryReferenceId;
use crate::metric::{Metric, MetricKey, MetricMap, MetricValue};
use crate::reference::Reference;
use crate::segment::{SegmentAssignment, SegmentDefinitionId};
use crate::session::SessionId;

/// Everything fetched for a single reference by an on-demand load.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSnapshot {
    /// The reference record.
    pub reference: Reference,
    /// Full metric map.
    pub metrics: MetricMap,
    /// Segment definitions the reference belongs to.
    pub segments: HashSet<SegmentDefinitionId>,
}

/// Result of an eviction request.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Eviction {
    /// The reference and all its data were removed.
    Evicted,
    /// Nothing was cached under the key.
    NotCached,
    /// The entry has no ownership record (bulk preloaded) and a session asked.
    Unowned,
    /// The entry belongs to another session.
    OwnedByOther(SessionId),
}

impl Eviction {
    /// Returns true if data was removed.
    #[must_use]
    pub const fn is_evicted(&self) -> bool {
        matches!(self, Self::Evicted)
    }
}

/// Entry counts, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct StoreStats {
    /// Cached reference records.
    pub references: usize,
    /// References with a metric map.
    pub metric_maps: usize,
    /// References with a membership set.
    pub membership_sets: usize,
    /// References owned by a session.
    pub owned: usize,
}

#[derive(Debug, Default)]
struct ReferenceState {
    references: HashMap<CategoryReferenceId, Reference>,
    metrics: HashMap<CategoryReferenceId, MetricMap>,
    segments: HashMap<CategoryReferenceId, HashSet<SegmentDefinitionId>>,
    owners: HashMap<CategoryReferenceId, SessionId>,
}

impl ReferenceState {
    fn remove_all(&mut self, key: &CategoryReferenceId) -> bool {
        let had_reference = self.references.remove(key).is_some();
        let had_metrics = self.metrics.remove(key).is_some();
        let had_segments = self.segments.remove(key).is_some();
        self.owners.remove(key);
        had_reference || had_metrics || had_segments
    }
}

/// Thread-safe store of per-reference cache data.
#[derive(Debug, Default)]
pub struct ReferenceStore {
    state: RwLock<ReferenceState>,
}

impl ReferenceStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Bulk commit
    // ------------------------------------------------------------------

    /// Commit a fully fetched category in one step.
    ///
    /// Every reference in `references` gets a fresh metric map and membership
    /// set built from `metrics` and `assignments`, and loses any ownership
    /// record. Metric maps and membership sets are created only for keys that
    /// have rows. Unowned references of `category` that the source no longer
    /// reports are dropped. Returns how many were dropped.
    pub fn replace_category(
        &self,
        category: &str,
        references: Vec<Reference>,
        metrics: Vec<Metric>,
        assignments: Vec<SegmentAssignment>,
    ) -> usize {
        let mut metric_maps: HashMap<CategoryReferenceId, MetricMap> = HashMap::new();
        for metric in metrics {
            metric_maps
                .entry(metric.category_reference_id)
                .or_default()
                .insert(metric.key, metric.value);
        }
        let mut memberships: HashMap<CategoryReferenceId, HashSet<SegmentDefinitionId>> = HashMap::new();
        for assignment in assignments {
            memberships
                .entry(assignment.key())
                .or_default()
                .insert(assignment.segment_definition_id);
        }
        let fresh: HashSet<CategoryReferenceId> = references.iter().map(|r| r.id.clone()).collect();

        let mut state = self.state.write();
        let stale: Vec<CategoryReferenceId> = state
            .references
            .values()
            .filter(|r| r.category == category && !fresh.contains(&r.id) && !state.owners.contains_key(&r.id))
            .map(|r| r.id.clone())
            .collect();
        for key in &stale {
            state.remove_all(key);
        }

        for reference in references {
            let key = reference.id.clone();
            state.metrics.remove(&key);
            state.segments.remove(&key);
            state.owners.remove(&key);
            state.references.insert(key, reference);
        }
        state.metrics.extend(metric_maps);
        state.segments.extend(memberships);
        stale.len()
    }

    // ------------------------------------------------------------------
    // On-demand commit / eviction
    // ------------------------------------------------------------------

    /// Replace everything cached for a reference and record `owner`.
    ///
    /// Without an owner any previous ownership record is kept.
    pub fn commit(&self, snapshot: ReferenceSnapshot, owner: Option<&SessionId>) {
        let key = snapshot.reference.id.clone();
        let mut state = self.state.write();
        state.metrics.insert(key.clone(), snapshot.metrics);
        state.segments.insert(key.clone(), snapshot.segments);
        if let Some(owner) = owner {
            state.owners.insert(key.clone(), owner.clone());
        }
        state.references.insert(key, snapshot.reference);
    }

    /// Remove a reference with all its data.
    ///
    /// With `session`, the removal only happens when that session owns the
    /// entry; without it the removal is unconditional.
    pub fn evict(&self, key: &CategoryReferenceId, session: Option<&SessionId>) -> Eviction {
        let mut state = self.state.write();
        if let Some(session) = session {
            match state.owners.get(key) {
                Some(owner) if owner == session => {}
                Some(owner) => return Eviction::OwnedByOther(owner.clone()),
                None if state.references.contains_key(key) => return Eviction::Unowned,
                None => return Eviction::NotCached,
            }
        }
        if state.remove_all(key) {
            Eviction::Evicted
        } else {
            Eviction::NotCached
        }
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut state = self.state.write();
        *state = ReferenceState::default();
    }

    // ------------------------------------------------------------------
    // Delta patches
    // ------------------------------------------------------------------

    /// Merge changed metric values into an existing map.
    ///
    /// Returns false (and changes nothing) if the reference has no metric map.
    pub fn patch_metrics(&self, key: &CategoryReferenceId, changed: &MetricMap) -> bool {
        let mut state = self.state.write();
        let Some(map) = state.metrics.get_mut(key) else {
            return false;
        };
        for (metric_key, value) in changed {
            map.insert(metric_key.clone(), value.clone());
        }
        true
    }

    /// Add a membership to an existing set.
    ///
    /// Returns false if the reference has no membership set.
    pub fn add_segment(&self, key: &CategoryReferenceId, id: &SegmentDefinitionId) -> bool {
        let mut state = self.state.write();
        match state.segments.get_mut(key) {
            Some(set) => {
                set.insert(id.clone());
                true
            }
            None => false,
        }
    }

    /// Remove a membership from an existing set.
    ///
    /// Returns false if the reference has no membership set.
    pub fn remove_segment(&self, key: &CategoryReferenceId, id: &SegmentDefinitionId) -> bool {
        let mut state = self.state.write();
        match state.segments.get_mut(key) {
            Some(set) => {
                set.remove(id);
                true
            }
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    /// Cached reference record.
    #[must_use]
    pub fn reference(&self, key: &CategoryReferenceId) -> Option<Reference> {
        self.state.read().references.get(key).cloned()
    }

    /// Cached references of a category.
    #[must_use]
    pub fn references_in(&self, category: &str) -> Vec<Reference> {
        self.state
            .read()
            .references
            .values()
            .filter(|r| r.category == category)
            .cloned()
            .collect()
    }

    /// Copy of the cached metric map.
    #[must_use]
    pub fn metrics(&self, key: &CategoryReferenceId) -> Option<MetricMap> {
        self.state.read().metrics.get(key).cloned()
    }

    /// Single cached metric value.
    #[must_use]
    pub fn metric(&self, key: &CategoryReferenceId, metric_key: &MetricKey) -> Option<MetricValue> {
        self.state.read().metrics.get(key)?.get(metric_key).cloned()
    }

    /// Returns true if a metric map is cached for the reference.
    #[must_use]
    pub fn has_metrics(&self, key: &CategoryReferenceId) -> bool {
        self.state.read().metrics.contains_key(key)
    }

    /// Run `f` against the cached metric map without copying it.
    pub fn with_metrics<R>(&self, key: &CategoryReferenceId, f: impl FnOnce(&MetricMap) -> R) -> Option<R> {
        let state = self.state.read();
        state.metrics.get(key).map(f)
    }

    /// Copy of the cached membership set.
    #[must_use]
    pub fn segments(&self, key: &CategoryReferenceId) -> Option<HashSet<SegmentDefinitionId>> {
        self.state.read().segments.get(key).cloned()
    }

    /// Returns true if the reference is a member of the segment definition.
    #[must_use]
    pub fn has_segment(&self, key: &CategoryReferenceId, id: &SegmentDefinitionId) -> bool {
        self.state
            .read()
            .segments
            .get(key)
            .is_some_and(|set| set.contains(id))
    }

    /// Session that owns the entry, if it was loaded on demand.
    #[must_use]
    pub fn owner(&self, key: &CategoryReferenceId) -> Option<SessionId> {
        self.state.read().owners.get(key).cloned()
    }

    /// Entry counts.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        let state = self.state.read();
        StoreStats {
            references: state.references.len(),
            metric_maps: state.metrics.len(),
            membership_sets: state.segments.len(),
            owned: state.owners.len(),
        }
    }
}
