//! Reference records for external entities (accounts, characters, vehicles, ...).

use serde::{Deserialize, Serialize};

use crate::identity::{CategoryReferenceId, ReferenceParam};

/// An external entity known to the upstream source.
///
/// References are never mutated in place: a reload replaces the record
/// wholesale and an eviction removes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    /// Canonical key, `"{category}:{reference_id}"`.
    pub id: CategoryReferenceId,
    /// Reference category.
    pub category: String,
    /// Category-local id.
    pub reference_id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Disabled references are skipped by bulk preloads.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Reference {
    /// Creates an enabled reference with its canonical key derived from the pair.
    #[must_use]
    pub fn new(
        category: impl Into<String>,
        reference_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let category = category.into();
        let reference_id = reference_id.into();
        Self {
            id: CategoryReferenceId::new(&category, &reference_id),
            category,
            reference_id,
            name: name.into(),
            enabled: true,
        }
    }

    /// Marks the reference as disabled.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// The `{category, referenceId}` pair of this reference.
    #[must_use]
    pub fn param(&self) -> ReferenceParam {
        ReferenceParam::new(&self.category, &self.reference_id)
    }
}

impl From<&Reference> for CategoryReferenceId {
    fn from(reference: &Reference) -> Self {
        reference.id.clone()
    }
}
