//! Segment definition registry.
//!
//! Global `SegmentDefinitionId -> SegmentDefinition` map, loaded in bulk at
//! startup and kept current by delta events. Updates are ordered by
//! `last_modified_date` (last write wins); stale updates are discarded.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::segment::{SegmentDefinition, SegmentDefinitionId, SegmentDefinitionPayload};

/// What an update did to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The definition was absent and has been created.
    Created,
    /// The stored definition was replaced.
    Updated,
    /// The update is older than the stored definition and was dropped.
    Stale,
}

/// Thread-safe segment definition registry.
#[derive(Debug, Default)]
pub struct SegmentDefinitionRegistry {
    definitions: RwLock<HashMap<SegmentDefinitionId, SegmentDefinition>>,
}

impl SegmentDefinitionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole registry (startup bulk load).
    pub fn replace_all(&self, definitions: Vec<SegmentDefinition>) {
        let map = definitions.into_iter().map(|d| (d.id.clone(), d)).collect();
        *self.definitions.write() = map;
    }

    /// Insert or replace a definition as-is.
    pub fn upsert(&self, definition: SegmentDefinition) {
        self.definitions.write().insert(definition.id.clone(), definition);
    }

    /// Insert a definition from a create delta, stamping both dates with `timestamp`.
    pub fn create(&self, payload: SegmentDefinitionPayload, timestamp: DateTime<Utc>) {
        self.upsert(SegmentDefinition::from_payload(payload, timestamp));
    }

    /// Apply an update delta.
    ///
    /// Absent definitions are created. Present ones are replaced only when
    /// `timestamp >= last_modified_date`, keeping the original `created_date`.
    pub fn update(&self, payload: SegmentDefinitionPayload, timestamp: DateTime<Utc>) -> UpdateOutcome {
        let mut definitions = self.definitions.write();
        let Some(stored) = definitions.get(&payload.id) else {
            let definition = SegmentDefinition::from_payload(payload, timestamp);
            definitions.insert(definition.id.clone(), definition);
            return UpdateOutcome::Created;
        };

        if timestamp < stored.last_modified_date {
            return UpdateOutcome::Stale;
        }

        let created_date = stored.created_date;
        let mut definition = SegmentDefinition::from_payload(payload, timestamp);
        definition.created_date = created_date;
        definitions.insert(definition.id.clone(), definition);
        UpdateOutcome::Updated
    }

    /// Remove a definition. Returns true if it existed.
    pub fn remove(&self, id: &SegmentDefinitionId) -> bool {
        self.definitions.write().remove(id).is_some()
    }

    /// Look up a definition.
    #[must_use]
    pub fn get(&self, id: &SegmentDefinitionId) -> Option<SegmentDefinition> {
        self.definitions.read().get(id).cloned()
    }

    /// Resolve ids into definitions, skipping ids without a definition.
    #[must_use]
    pub fn resolve<'a, I>(&self, ids: I) -> Vec<SegmentDefinition>
    where
        I: IntoIterator<Item = &'a SegmentDefinitionId>,
    {
        let definitions = self.definitions.read();
        ids.into_iter().filter_map(|id| definitions.get(id).cloned()).collect()
    }

    /// Run `f` against each resolvable definition until it returns true.
    pub fn any<'a, I>(&self, ids: I, mut f: impl FnMut(&SegmentDefinition) -> bool) -> bool
    where
        I: IntoIterator<Item = &'a SegmentDefinitionId>,
    {
        let definitions = self.definitions.read();
        ids.into_iter().filter_map(|id| definitions.get(id)).any(|d| f(d))
    }

    /// Every definition, in no particular order.
    #[must_use]
    pub fn all(&self) -> Vec<SegmentDefinition> {
        self.definitions.read().values().cloned().collect()
    }

    /// Number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.read().len()
    }

    /// Returns true if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.read().is_empty()
    }

    /// Drop every definition.
    pub fn clear(&self) {
        self.definitions.write().clear();
    }
}
