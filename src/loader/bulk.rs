//! Paginated bulk loader.
//!
//! Preloads a whole category in three sequential phases (enabled references,
//! metrics, segment memberships). Each phase pages through the source until
//! the reported `page_count <= page_index` of the next request. Pages are
//! staged and committed to the store in one step once every phase succeeded;
//! the first failing page aborts the preload with nothing committed.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::SourceError;
use crate::metric::Metric;
use crate::reference::Reference;
use crate::segment::SegmentAssignment;
use crate::source::{MetricQuery, Page, ReferenceQuery, ReferenceSource, SegmentQuery};
use crate::store::ReferenceStore;

/// Counts gathered while preloading one category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreloadSummary {
    /// Category that was loaded.
    pub category: String,
    /// Enabled references committed.
    pub references: usize,
    /// Metric rows committed.
    pub metrics: usize,
    /// Segment assignments committed.
    pub memberships: usize,
    /// Fetch calls issued across all three phases.
    pub pages: usize,
}

/// Loads entire categories into the store.
pub struct BulkLoader {
    source: Arc<dyn ReferenceSource>,
    store: Arc<ReferenceStore>,
    page_size: usize,
}

impl std::fmt::Debug for BulkLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkLoader").field("page_size", &self.page_size).finish_non_exhaustive()
    }
}

/// Page through a query, handing each page's items to `stage`.
///
/// Returns `(pages fetched, items staged)`.
async fn drain_pages<T, F, Fut>(mut fetch: F, mut stage: impl FnMut(Vec<T>)) -> Result<(usize, usize), SourceError>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<Page<T>, SourceError>>,
{
    let mut page_index = 0;
    let mut items = 0;
    loop {
        let page = fetch(page_index).await?;
        items += page.items.len();
        stage(page.items);
        page_index += 1;
        if page.page_count <= page_index {
            return Ok((page_index, items));
        }
    }
}

impl BulkLoader {
    /// Creates a loader. `page_size` is clamped to at least 1.
    #[must_use]
    pub fn new(source: Arc<dyn ReferenceSource>, store: Arc<ReferenceStore>, page_size: usize) -> Self {
        Self {
            source,
            store,
            page_size: page_size.max(1),
        }
    }

    /// Preload every enabled reference of `category` with its metrics and
    /// segment memberships, replacing whatever the store held for them.
    pub async fn preload_category(&self, category: &str) -> Result<PreloadSummary, SourceError> {
        info!(category, page_size = self.page_size, "preloading category");

        let mut staged_references: Vec<Reference> = Vec::new();
        let mut staged_metrics: Vec<Metric> = Vec::new();
        let mut staged_segments: Vec<SegmentAssignment> = Vec::new();

        let (reference_pages, references) = drain_pages(
            |page_index| {
                self.source.get_references(ReferenceQuery {
                    category: category.to_string(),
                    enabled: Some(true),
                    page_index,
                    page_size: self.page_size,
                })
            },
            |items| staged_references.extend(items),
        )
        .await?;
        debug!(category, references, pages = reference_pages, "references loaded");

        let (metric_pages, metrics) = drain_pages(
            |page_index| {
                self.source.get_metrics(MetricQuery {
                    category: category.to_string(),
                    page_index,
                    page_size: self.page_size,
                })
            },
            |items| staged_metrics.extend(items),
        )
        .await?;
        debug!(category, metrics, pages = metric_pages, "metrics loaded");

        let (segment_pages, memberships) = drain_pages(
            |page_index| {
                self.source.get_segments(SegmentQuery {
                    category: category.to_string(),
                    page_index,
                    page_size: self.page_size,
                })
            },
            |items| staged_segments.extend(items),
        )
        .await?;
        debug!(category, memberships, pages = segment_pages, "segment memberships loaded");

        let dropped = self
            .store
            .replace_category(category, staged_references, staged_metrics, staged_segments);
        if dropped > 0 {
            debug!(category, dropped, "references no longer reported upstream dropped");
        }

        let summary = PreloadSummary {
            category: category.to_string(),
            references,
            metrics,
            memberships,
            pages: reference_pages + metric_pages + segment_pages,
        };
        info!(
            category,
            references = summary.references,
            metrics = summary.metrics,
            memberships = summary.memberships,
            pages = summary.pages,
            "category preloaded"
        );
        Ok(summary)
    }
}
