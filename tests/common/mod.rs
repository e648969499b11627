//! Shared test fixtures.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use refcache::segment::{ReferenceSegment, SegmentAssignment, SegmentDefinitionPayload};
use refcache::source::{MetricFilter, MetricQuery, ReferenceQuery, SegmentQuery};
use refcache::{
    CacheConfig, CategoryReferenceId, Metric, Page, Reference, ReferenceCache, ReferenceSource, SegmentDefinition,
    SegmentPolicy, SourceError,
};

/// A source that serves pre-scripted pages and per-reference responses,
/// counts every call and can be told to fail or to hold single-reference
/// fetches until released.
#[derive(Default)]
pub struct ScriptedSource {
    pub reference_pages: Vec<Page<Reference>>,
    pub metric_pages: Vec<Page<Metric>>,
    pub segment_pages: Vec<Page<SegmentAssignment>>,
    pub definitions: Vec<SegmentDefinition>,
    pub references: HashMap<CategoryReferenceId, Reference>,
    pub metrics: Mutex<HashMap<CategoryReferenceId, Vec<Metric>>>,
    pub memberships: HashMap<CategoryReferenceId, Vec<ReferenceSegment>>,
    /// Operation name -> page index (0 for unpaged operations) that fails.
    pub failures: Mutex<HashMap<&'static str, usize>>,
    /// When set, `get_reference_by_id` waits for a permit.
    pub gate: Option<Arc<Semaphore>>,
    pub metric_filters: Mutex<Vec<MetricFilter>>,
    pub call_counts: Mutex<HashMap<&'static str, usize>>,
}

impl ScriptedSource {
    pub fn calls(&self, operation: &str) -> usize {
        self.call_counts.lock().get(operation).copied().unwrap_or(0)
    }

    /// Make `operation` fail from now on when it asks for `page_index`.
    pub fn fail_at(&self, operation: &'static str, page_index: usize) {
        self.failures.lock().insert(operation, page_index);
    }

    /// Script failures up front.
    pub fn failing(self, operation: &'static str, page_index: usize) -> Self {
        self.fail_at(operation, page_index);
        self
    }

    pub fn set_metrics(&self, id: &CategoryReferenceId, metrics: Vec<Metric>) {
        self.metrics.lock().insert(id.clone(), metrics);
    }

    fn record(&self, operation: &'static str, page_index: usize) -> Result<(), SourceError> {
        *self.call_counts.lock().entry(operation).or_default() += 1;
        match self.failures.lock().get(operation) {
            Some(&fail_at) if fail_at == page_index => Err(SourceError::request(operation, "scripted failure")),
            _ => Ok(()),
        }
    }

    fn page<T: Clone>(pages: &[Page<T>], page_index: usize) -> Page<T> {
        pages.get(page_index).cloned().unwrap_or_else(|| {
            let page_count = pages.first().map_or(0, |p| p.page_count);
            Page::new(Vec::new(), page_index, page_count)
        })
    }
}

#[async_trait]
impl ReferenceSource for ScriptedSource {
    async fn get_references(&self, query: ReferenceQuery) -> Result<Page<Reference>, SourceError> {
        self.record("getReferences", query.page_index)?;
        Ok(Self::page(&self.reference_pages, query.page_index))
    }

    async fn get_reference_by_id(&self, id: &CategoryReferenceId) -> Result<Reference, SourceError> {
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        self.record("getReferenceById", 0)?;
        self.references
            .get(id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound { id: id.clone() })
    }

    async fn get_reference_metrics(&self, id: &CategoryReferenceId, filter: MetricFilter) -> Result<Vec<Metric>, SourceError> {
        self.record("getReferenceMetrics", 0)?;
        let metrics = self.metrics.lock().get(id).cloned().unwrap_or_default();
        let selected = metrics.into_iter().filter(|m| filter.accepts(&m.key)).collect();
        self.metric_filters.lock().push(filter);
        Ok(selected)
    }

    async fn get_reference_segments(&self, id: &CategoryReferenceId) -> Result<Vec<ReferenceSegment>, SourceError> {
        self.record("getReferenceSegments", 0)?;
        Ok(self.memberships.get(id).cloned().unwrap_or_default())
    }

    async fn get_segment_definitions(&self) -> Result<Vec<SegmentDefinition>, SourceError> {
        self.record("getSegmentDefinitions", 0)?;
        Ok(self.definitions.clone())
    }

    async fn get_segments(&self, query: SegmentQuery) -> Result<Page<SegmentAssignment>, SourceError> {
        self.record("getSegments", query.page_index)?;
        Ok(Self::page(&self.segment_pages, query.page_index))
    }

    async fn get_metrics(&self, query: MetricQuery) -> Result<Page<Metric>, SourceError> {
        self.record("getMetrics", query.page_index)?;
        Ok(Self::page(&self.metric_pages, query.page_index))
    }
}

/// Fixed point in time used by delta tests.
pub fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + seconds, 0).single().unwrap()
}

pub fn definition(id: &str, policies: &[&str], modified: DateTime<Utc>) -> SegmentDefinition {
    SegmentDefinition::from_payload(
        SegmentDefinitionPayload::new(id, "ACCOUNT", SegmentPolicy::with_access(policies.iter().copied())),
        modified,
    )
}

/// A source holding one on-demand account (`ACCOUNT:1`) with two metrics and
/// one membership.
pub fn account_source() -> ScriptedSource {
    let id = CategoryReferenceId::new("ACCOUNT", "1");
    let source = ScriptedSource {
        references: HashMap::from([(id.clone(), Reference::new("ACCOUNT", "1", "alice"))]),
        memberships: HashMap::from([(id.clone(), vec![ReferenceSegment::new("vip")])]),
        definitions: vec![definition("vip", &["READ", "WRITE"], at(0))],
        ..ScriptedSource::default()
    };
    source.set_metrics(
        &id,
        vec![
            Metric::new(&id, "CREATED_DATE", 1_640_995_200_000.0),
            Metric::new(&id, "GOLD", 10.0),
        ],
    );
    source
}

/// Build and initialise a cache over `source`.
pub async fn ready_cache(source: Arc<ScriptedSource>, config: CacheConfig) -> Arc<ReferenceCache> {
    let cache = Arc::new(ReferenceCache::new(source, config).unwrap());
    cache.init().await.unwrap();
    cache
}
