//! The reference cache facade.
//!
//! [`ReferenceCache`] is constructed once, initialised explicitly with
//! [`ReferenceCache::init`], shared by reference (typically in an `Arc`) with
//! every consumer and torn down with [`ReferenceCache::dispose`].
//!
//! Every lookup accepts anything convertible into a [`CategoryReferenceId`]:
//! the raw `"category:id"` string, a [`ReferenceParam`](crate::identity::ReferenceParam)
//! or a `(category, id)` pair.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::events::{EventBus, EventStream};
use crate::identity::{to_key, CategoryReferenceId};
use crate::loader::{BulkLoader, LoadedReference, OnDemandLoader, PreloadSummary};
use crate::metric::{MetricKey, MetricMap, MetricValue};
use crate::policy;
use crate::reference::Reference;
use crate::registry::SegmentDefinitionRegistry;
use crate::rules::{is_truthy, Rule};
use crate::segment::{AccessPolicy, SegmentDefinition, SegmentDefinitionId};
use crate::session::SessionId;
use crate::source::ReferenceSource;
use crate::store::{Eviction, ReferenceStore, StoreStats};

/// Diagnostic snapshot of the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Whether the last `init` succeeded.
    pub ready: bool,
    /// Reference store counters.
    pub store: StoreStats,
    /// Segment definitions currently registered.
    pub segment_definitions: usize,
    /// On-demand loads waiting on the source.
    pub in_flight_loads: usize,
    /// Live event subscriptions.
    pub subscribers: usize,
    /// Events accepted by the bus since startup.
    pub published_events: u64,
    /// Events discarded because a subscriber queue was full.
    pub dropped_events: u64,
}

/// Process-wide reference segmentation and metrics cache.
pub struct ReferenceCache {
    pub(crate) config: CacheConfig,
    pub(crate) source: Arc<dyn ReferenceSource>,
    pub(crate) store: Arc<ReferenceStore>,
    pub(crate) registry: SegmentDefinitionRegistry,
    pub(crate) bulk: BulkLoader,
    pub(crate) on_demand: OnDemandLoader,
    pub(crate) events: EventBus,
    ready: AtomicBool,
}

impl std::fmt::Debug for ReferenceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceCache")
            .field("config", &self.config)
            .field("ready", &self.is_ready())
            .field("store", &self.store.stats())
            .finish_non_exhaustive()
    }
}

impl ReferenceCache {
    /// Build a cache over `source`. The configuration is validated; nothing
    /// is fetched until [`init`](Self::init).
    pub fn new(source: Arc<dyn ReferenceSource>, config: CacheConfig) -> CacheResult<Self> {
        config.validate()?;
        let store = Arc::new(ReferenceStore::new());
        Ok(Self {
            bulk: BulkLoader::new(Arc::clone(&source), Arc::clone(&store), config.page_size),
            on_demand: OnDemandLoader::new(Arc::clone(&source), Arc::clone(&store), config.coalesce_loads),
            events: EventBus::new(config.event_capacity),
            registry: SegmentDefinitionRegistry::new(),
            store,
            source,
            config,
            ready: AtomicBool::new(false),
        })
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Load every segment definition and preload the configured categories.
    ///
    /// Fail-fast: the first failing fetch aborts initialisation, partially
    /// loaded data is discarded and the cache stays not ready.
    pub async fn init(&self) -> CacheResult<Vec<PreloadSummary>> {
        info!(categories = ?self.config.preload_categories, "initialising reference cache");
        match self.load_all().await {
            Ok(summaries) => {
                self.ready.store(true, Ordering::Release);
                info!(
                    segment_definitions = self.registry.len(),
                    references = self.store.stats().references,
                    "reference cache ready"
                );
                Ok(summaries)
            }
            Err(err) => {
                error!(error = %err, "reference cache initialisation failed");
                self.ready.store(false, Ordering::Release);
                self.store.clear();
                self.registry.clear();
                Err(err)
            }
        }
    }

    async fn load_all(&self) -> CacheResult<Vec<PreloadSummary>> {
        let definitions = self.source.get_segment_definitions().await?;
        info!(count = definitions.len(), "segment definitions loaded");
        self.registry.replace_all(definitions);

        let mut summaries = Vec::with_capacity(self.config.preload_categories.len());
        for category in &self.config.preload_categories {
            summaries.push(self.bulk.preload_category(category).await?);
        }
        Ok(summaries)
    }

    /// Bulk-load one more category, replacing what is cached for it. Entries
    /// loaded this way are never owned by a session. On failure nothing from
    /// this run is committed and earlier data for the category stays.
    pub async fn preload_category(&self, category: &str) -> CacheResult<PreloadSummary> {
        Ok(self.bulk.preload_category(category).await?)
    }

    /// Drop every cached entry, definition and in-flight load, and close all
    /// event subscriptions.
    pub fn dispose(&self) {
        self.ready.store(false, Ordering::Release);
        self.on_demand.clear();
        self.store.clear();
        self.registry.clear();
        self.events.close();
        info!("reference cache disposed");
    }

    /// Returns true between a successful `init` and `dispose`.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub(crate) fn ensure_ready(&self) -> CacheResult<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(CacheError::NotReady)
        }
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &CacheConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // On-demand loading
    // ------------------------------------------------------------------

    /// Load a single reference, recording `owner` as its owning session.
    pub async fn load_reference(
        &self,
        reference: impl Into<CategoryReferenceId>,
        owner: Option<&SessionId>,
    ) -> CacheResult<LoadedReference> {
        self.ensure_ready()?;
        let key = to_key(reference);
        Ok(self.on_demand.load(&key, owner).await?)
    }

    /// Evict a reference. With `session`, only if that session owns it.
    pub fn remove_reference(&self, reference: impl Into<CategoryReferenceId>, session: Option<&SessionId>) -> Eviction {
        self.on_demand.remove(&to_key(reference), session)
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    /// Cached reference record.
    #[must_use]
    pub fn get(&self, reference: impl Into<CategoryReferenceId>) -> Option<Reference> {
        self.store.reference(&to_key(reference))
    }

    /// Cached references of a category.
    #[must_use]
    pub fn references_in(&self, category: &str) -> Vec<Reference> {
        self.store.references_in(category)
    }

    /// Cached metric map.
    #[must_use]
    pub fn get_metrics(&self, reference: impl Into<CategoryReferenceId>) -> Option<MetricMap> {
        self.store.metrics(&to_key(reference))
    }

    /// One cached metric value.
    #[must_use]
    pub fn get_metric(&self, reference: impl Into<CategoryReferenceId>, key: impl Into<MetricKey>) -> Option<MetricValue> {
        self.store.metric(&to_key(reference), &key.into())
    }

    /// Segment definitions the reference belongs to, sorted; empty when the
    /// reference is not tracked.
    #[must_use]
    pub fn get_reference_segments(&self, reference: impl Into<CategoryReferenceId>) -> Vec<SegmentDefinitionId> {
        let mut ids: Vec<_> = self
            .store
            .segments(&to_key(reference))
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Session that owns the entry, if it was loaded on demand.
    #[must_use]
    pub fn owner_of(&self, reference: impl Into<CategoryReferenceId>) -> Option<SessionId> {
        self.store.owner(&to_key(reference))
    }

    /// Direct membership test.
    #[must_use]
    pub fn has_segment(&self, reference: impl Into<CategoryReferenceId>, segment_definition_id: &SegmentDefinitionId) -> bool {
        self.store.has_segment(&to_key(reference), segment_definition_id)
    }

    // ------------------------------------------------------------------
    // Segment definitions
    // ------------------------------------------------------------------

    /// Registered definition.
    #[must_use]
    pub fn get_segment_definition(&self, id: &SegmentDefinitionId) -> Option<SegmentDefinition> {
        self.registry.get(id)
    }

    /// Definitions of the segments the reference belongs to. Memberships
    /// without a registered definition are skipped.
    #[must_use]
    pub fn list_segment_definitions_for_reference(&self, reference: impl Into<CategoryReferenceId>) -> Vec<SegmentDefinition> {
        self.store
            .segments(&to_key(reference))
            .map(|ids| self.registry.resolve(&ids))
            .unwrap_or_default()
    }

    /// Every registered definition.
    #[must_use]
    pub fn segment_definitions(&self) -> Vec<SegmentDefinition> {
        self.registry.all()
    }

    /// Insert or replace a definition as-is.
    pub fn upsert_segment_definition(&self, definition: SegmentDefinition) {
        self.registry.upsert(definition);
    }

    /// Remove a definition. Returns true if it existed.
    pub fn remove_segment_definition(&self, id: &SegmentDefinitionId) -> bool {
        self.registry.remove(id)
    }

    // ------------------------------------------------------------------
    // Rules and policies
    // ------------------------------------------------------------------

    /// Evaluate `rule` against the reference's cached metrics.
    ///
    /// `Ok(None)` means the reference has no cached metrics, which is
    /// distinct from the rule evaluating to `false`.
    pub fn apply_metrics_logic(&self, reference: impl Into<CategoryReferenceId>, rule: &Rule) -> CacheResult<Option<Value>> {
        let key = to_key(reference);
        let result = self.store.with_metrics(&key, |metrics| rule.evaluate(metrics)).transpose()?;
        Ok(result)
    }

    /// Truthiness of [`apply_metrics_logic`](Self::apply_metrics_logic).
    pub fn apply_metrics_condition(&self, reference: impl Into<CategoryReferenceId>, rule: &Rule) -> CacheResult<Option<bool>> {
        Ok(self.apply_metrics_logic(reference, rule)?.map(|value| is_truthy(&value)))
    }

    /// Union of the access policies of every segment the reference belongs to.
    #[must_use]
    pub fn get_reference_access_policies(&self, reference: impl Into<CategoryReferenceId>) -> Vec<AccessPolicy> {
        policy::union_access_policies(&self.list_segment_definitions_for_reference(reference))
    }

    /// Returns true if any segment of the reference grants `access`.
    #[must_use]
    pub fn has_access_policy(&self, reference: impl Into<CategoryReferenceId>, access: &AccessPolicy) -> bool {
        self.store
            .segments(&to_key(reference))
            .is_some_and(|ids| policy::any_grants(&self.registry, &ids, access))
    }

    /// Returns true if any of the given definitions grants `access`.
    #[must_use]
    pub fn has_access_policy_in_segment_definitions(&self, access: &AccessPolicy, ids: &[SegmentDefinitionId]) -> bool {
        policy::any_grants(&self.registry, ids, access)
    }

    // ------------------------------------------------------------------
    // Events and diagnostics
    // ------------------------------------------------------------------

    /// Subscribe to outbound domain events.
    #[must_use]
    pub fn subscribe(&self) -> EventStream {
        self.events.subscribe()
    }

    /// Entry counts and event counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            ready: self.is_ready(),
            store: self.store.stats(),
            segment_definitions: self.registry.len(),
            in_flight_loads: self.on_demand.in_flight(),
            subscribers: self.events.subscriber_count(),
            published_events: self.events.published_events(),
            dropped_events: self.events.dropped_events(),
        }
    }
}
