//! Delta handlers.

use tracing::{debug, info, trace};

use crate::cache::ReferenceCache;
use crate::error::CacheResult;
use crate::events::{DomainEventPayload, SegmentChange};
use crate::metric::MetricMap;
use crate::registry::UpdateOutcome;
use crate::source::MetricFilter;

use super::events::{DeltaEvent, DeltaOutcome, MetricsDelta, SegmentDefinitionDelta};

impl ReferenceCache {
    /// Apply one push event.
    ///
    /// Fails only if the cache is not initialised or a metric re-fetch fails.
    pub async fn apply_delta(&self, event: DeltaEvent) -> CacheResult<DeltaOutcome> {
        self.ensure_ready()?;
        trace!(event = event.name(), timestamp = %event.timestamp(), "applying delta");

        let outcome = match event {
            DeltaEvent::SegmentDefinitionCreated(delta) => self.definition_created(delta),
            DeltaEvent::SegmentDefinitionUpdated(delta) => self.definition_updated(delta),
            DeltaEvent::SegmentDefinitionRemoved(removal) => {
                if self.registry.remove(&removal.id) {
                    info!(segment_definition = %removal.id, "segment definition removed");
                    DeltaOutcome::Applied
                } else {
                    DeltaOutcome::Untracked
                }
            }
            DeltaEvent::SegmentAdded(change) => self.segment_added(change),
            DeltaEvent::SegmentRemoved(change) => self.segment_removed(change),
            DeltaEvent::ReferenceMetricsUpdated(delta) => self.metrics_updated(delta).await?,
        };
        Ok(outcome)
    }

    fn definition_created(&self, delta: SegmentDefinitionDelta) -> DeltaOutcome {
        debug!(segment_definition = %delta.definition.id, "segment definition created");
        self.registry.create(delta.definition, delta.timestamp);
        DeltaOutcome::Applied
    }

    fn definition_updated(&self, delta: SegmentDefinitionDelta) -> DeltaOutcome {
        let id = delta.definition.id.clone();
        match self.registry.update(delta.definition, delta.timestamp) {
            UpdateOutcome::Created | UpdateOutcome::Updated => {
                debug!(segment_definition = %id, timestamp = %delta.timestamp, "segment definition updated");
                DeltaOutcome::Applied
            }
            UpdateOutcome::Stale => {
                debug!(segment_definition = %id, timestamp = %delta.timestamp, "stale segment definition update discarded");
                DeltaOutcome::Stale
            }
        }
    }

    fn segment_added(&self, change: SegmentChange) -> DeltaOutcome {
        if !self
            .store
            .add_segment(&change.category_reference_id, &change.segment_definition_id)
        {
            debug!(key = %change.category_reference_id, "segment.added for untracked reference dropped");
            return DeltaOutcome::Untracked;
        }
        self.events.publish(DomainEventPayload::SegmentCreated(change));
        DeltaOutcome::Applied
    }

    fn segment_removed(&self, change: SegmentChange) -> DeltaOutcome {
        if !self
            .store
            .remove_segment(&change.category_reference_id, &change.segment_definition_id)
        {
            debug!(key = %change.category_reference_id, "segment.removed for untracked reference dropped");
            return DeltaOutcome::Untracked;
        }
        self.events.publish(DomainEventPayload::SegmentRemoved(change));
        DeltaOutcome::Applied
    }

    async fn metrics_updated(&self, delta: MetricsDelta) -> CacheResult<DeltaOutcome> {
        if !self.store.has_metrics(&delta.id) {
            debug!(key = %delta.id, "reference_metrics.updated for untracked reference dropped");
            return Ok(DeltaOutcome::Untracked);
        }
        if delta.keys.is_empty() {
            return Ok(DeltaOutcome::Applied);
        }

        let fresh = self
            .source
            .get_reference_metrics(&delta.id, MetricFilter::keys(delta.keys))
            .await?;
        let changed: MetricMap = fresh.into_iter().map(|m| (m.key, m.value)).collect();

        // The entry may have been evicted while the fetch was in flight.
        if !self.store.patch_metrics(&delta.id, &changed) {
            debug!(key = %delta.id, "reference evicted during metric refresh, update dropped");
            return Ok(DeltaOutcome::Untracked);
        }

        debug!(key = %delta.id, changed = changed.len(), "metrics patched");
        self.events.publish(DomainEventPayload::ReferenceMetricsUpdated {
            id: delta.id,
            reference_id: delta.reference_id,
            category: delta.category,
            metrics: changed,
        });
        Ok(DeltaOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use crate::cache::ReferenceCache;
    use crate::config::CacheConfig;
    use crate::events::{DomainEventPayload, SegmentChange};
    use crate::identity::CategoryReferenceId;
    use crate::metric::{Metric, MetricKey, MetricValue};
    use crate::reference::Reference;
    use crate::segment::{SegmentAssignment, SegmentDefinitionPayload, SegmentPolicy};
    use crate::source::{InMemorySource, SourceSnapshot};
    use crate::sync::{DeltaEvent, DeltaOutcome, MetricsDelta, SegmentDefinitionDelta, SegmentDefinitionRemoval};

    async fn ready_cache() -> (Arc<InMemorySource>, ReferenceCache) {
        let id = CategoryReferenceId::new("VEHICLE", "1");
        let source = Arc::new(InMemorySource::new(SourceSnapshot {
            references: vec![Reference::new("VEHICLE", "1", "sultan")],
            metrics: vec![Metric::new(&id, "SPEED", 100.0), Metric::new(&id, "FUEL", 0.5)],
            segments: vec![SegmentAssignment::new("VEHICLE", "1", "fast")],
            ..SourceSnapshot::default()
        }));
        let config = CacheConfig {
            preload_categories: vec!["VEHICLE".to_string()],
            ..CacheConfig::default()
        };
        let cache = ReferenceCache::new(source.clone(), config).unwrap();
        cache.init().await.unwrap();
        (source, cache)
    }

    fn definition_delta(policies: &[&str], timestamp: chrono::DateTime<Utc>) -> SegmentDefinitionDelta {
        SegmentDefinitionDelta {
            definition: SegmentDefinitionPayload::new("vip", "VEHICLE", SegmentPolicy::with_access(policies.iter().copied())),
            timestamp,
        }
    }

    #[tokio::test]
    async fn test_definition_lifecycle() {
        let (_, cache) = ready_cache().await;
        let t0 = Utc::now();

        let created = cache
            .apply_delta(DeltaEvent::SegmentDefinitionCreated(definition_delta(&["READ"], t0)))
            .await
            .unwrap();
        assert_eq!(created, DeltaOutcome::Applied);

        let stale = cache
            .apply_delta(DeltaEvent::SegmentDefinitionUpdated(definition_delta(
                &["WRITE"],
                t0 - Duration::seconds(1),
            )))
            .await
            .unwrap();
        assert_eq!(stale, DeltaOutcome::Stale);
        assert!(!cache.get_segment_definition(&"vip".into()).unwrap().policy.grants(&"WRITE".into()));

        let removal = DeltaEvent::SegmentDefinitionRemoved(SegmentDefinitionRemoval {
            id: "vip".into(),
            timestamp: t0,
        });
        assert_eq!(cache.apply_delta(removal.clone()).await.unwrap(), DeltaOutcome::Applied);
        assert_eq!(cache.apply_delta(removal).await.unwrap(), DeltaOutcome::Untracked);
    }

    #[tokio::test]
    async fn test_segment_added_emits_event_for_tracked_reference() {
        let (_, cache) = ready_cache().await;
        let stream = cache.subscribe();
        let change = SegmentChange {
            category_reference_id: "VEHICLE:1".into(),
            segment_definition_id: "red".into(),
            timestamp: Utc::now(),
        };

        let outcome = cache.apply_delta(DeltaEvent::SegmentAdded(change.clone())).await.unwrap();
        assert_eq!(outcome, DeltaOutcome::Applied);
        assert!(cache.has_segment("VEHICLE:1", &"red".into()));
        assert_eq!(stream.try_recv().unwrap().payload, DomainEventPayload::SegmentCreated(change.clone()));

        let outcome = cache.apply_delta(DeltaEvent::SegmentRemoved(change.clone())).await.unwrap();
        assert_eq!(outcome, DeltaOutcome::Applied);
        assert!(!cache.has_segment("VEHICLE:1", &"red".into()));
        assert_eq!(stream.try_recv().unwrap().payload, DomainEventPayload::SegmentRemoved(change));
    }

    #[tokio::test]
    async fn test_metrics_update_refetches_named_keys_only() {
        let (source, cache) = ready_cache().await;
        let stream = cache.subscribe();
        let id = CategoryReferenceId::new("VEHICLE", "1");
        source.upsert_metric(Metric::new(&id, "SPEED", 140.0));
        source.upsert_metric(Metric::new(&id, "FUEL", 0.1));

        let outcome = cache
            .apply_delta(DeltaEvent::ReferenceMetricsUpdated(MetricsDelta {
                id: id.clone(),
                reference_id: "1".to_string(),
                category: "VEHICLE".to_string(),
                keys: vec![MetricKey::new("SPEED")],
                timestamp: Utc::now(),
            }))
            .await
            .unwrap();
        assert_eq!(outcome, DeltaOutcome::Applied);
        assert_eq!(cache.get_metric(&id, "SPEED"), Some(MetricValue::Number(140.0)));
        assert_eq!(cache.get_metric(&id, "FUEL"), Some(MetricValue::Number(0.5)));

        let event = stream.try_recv().unwrap();
        let DomainEventPayload::ReferenceMetricsUpdated { metrics, .. } = event.payload else {
            panic!("unexpected payload");
        };
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics.get("SPEED"), Some(&MetricValue::Number(140.0)));
    }

    #[tokio::test]
    async fn test_metrics_update_for_untracked_reference_is_ignored() {
        let (source, cache) = ready_cache().await;
        let before = source.calls().get_reference_metrics;
        let outcome = cache
            .apply_delta(DeltaEvent::ReferenceMetricsUpdated(MetricsDelta {
                id: "ACCOUNT:7".into(),
                reference_id: "7".to_string(),
                category: "ACCOUNT".to_string(),
                keys: vec![MetricKey::new("GOLD")],
                timestamp: Utc::now(),
            }))
            .await
            .unwrap();
        assert_eq!(outcome, DeltaOutcome::Untracked);
        assert_eq!(source.calls().get_reference_metrics, before);
        assert!(cache.get_metrics("ACCOUNT:7").is_none());
    }
}
