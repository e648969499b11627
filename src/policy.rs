//! Access-policy aggregation over segment definitions.

use std::collections::BTreeSet;

use crate::registry::SegmentDefinitionRegistry;
use crate::segment::{AccessPolicy, SegmentDefinition, SegmentDefinitionId};

/// Deduplicated union of the access policies granted by `definitions`.
#[must_use]
pub fn union_access_policies<'a, I>(definitions: I) -> Vec<AccessPolicy>
where
    I: IntoIterator<Item = &'a SegmentDefinition>,
{
    definitions
        .into_iter()
        .flat_map(|d| d.policy.access_policies.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Returns true as soon as one of the definitions named by `ids` grants
/// `policy`. Ids without a registered definition are skipped.
#[must_use]
pub fn any_grants<'a, I>(registry: &SegmentDefinitionRegistry, ids: I, policy: &AccessPolicy) -> bool
where
    I: IntoIterator<Item = &'a SegmentDefinitionId>,
{
    registry.any(ids, |definition| definition.grants(policy))
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;

    use crate::segment::{SegmentDefinitionPayload, SegmentPolicy};

    fn definition(id: &str, policies: &[&str]) -> SegmentDefinition {
        SegmentDefinition::from_payload(
            SegmentDefinitionPayload::new(id, "ACCOUNT", SegmentPolicy::with_access(policies.iter().copied())),
            Utc::now(),
        )
    }

    #[test]
    fn test_union_is_deduplicated() {
        let defs = [definition("a", &["A", "B"]), definition("b", &["B", "C"])];
        let union = union_access_policies(&defs);
        assert_eq!(union.len(), 3);
        assert_eq!(union, vec![AccessPolicy::new("A"), AccessPolicy::new("B"), AccessPolicy::new("C")]);
    }

    #[test]
    fn test_union_of_nothing_is_empty() {
        assert!(union_access_policies(&Vec::<SegmentDefinition>::new()).is_empty());
    }

    #[test]
    fn test_any_grants_skips_unknown_ids() {
        let registry = SegmentDefinitionRegistry::new();
        registry.upsert(definition("staff", &["WRITE"]));
        let ids = [SegmentDefinitionId::new("ghost"), SegmentDefinitionId::new("staff")];
        assert!(any_grants(&registry, &ids, &AccessPolicy::new("WRITE")));
        assert!(!any_grants(&registry, &ids, &AccessPolicy::new("ADMIN")));
        assert!(!any_grants(&registry, &ids[..1], &AccessPolicy::new("WRITE")));
    }
}
