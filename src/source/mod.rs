//! Upstream reference/metric/segment source.
//!
//! The cache never owns the truth: it mirrors whatever this source reports.
//! Backends implement [`ReferenceSource`]; [`InMemorySource`] is the
//! in-process reference implementation used by tests and fixtures.

mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::identity::CategoryReferenceId;
use crate::metric::{Metric, MetricKey};
use crate::reference::Reference;
use crate::segment::{ReferenceSegment, SegmentAssignment, SegmentDefinition};

pub use memory::{InMemorySource, SourceCalls, SourceSnapshot};

/// One page of a paginated upstream query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// 0-based index of this page.
    pub page_index: usize,
    /// Total number of pages reported by the source.
    pub page_count: usize,
}

impl<T> Page<T> {
    /// Creates a page.
    #[must_use]
    pub fn new(items: Vec<T>, page_index: usize, page_count: usize) -> Self {
        Self {
            items,
            page_index,
            page_count,
        }
    }
}

/// Paginated reference query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceQuery {
    /// Category to list.
    pub category: String,
    /// `Some(true)` restricts the query to enabled references.
    pub enabled: Option<bool>,
    /// Zero-based page number.
    pub page_index: usize,
    /// Rows per page.
    pub page_size: usize,
}

/// Paginated category-wide metric query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricQuery {
    /// Category to list.
    pub category: String,
    /// Zero-based page number.
    pub page_index: usize,
    /// Rows per page.
    pub page_size: usize,
}

/// Paginated category-wide segment membership query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentQuery {
    /// Category to list.
    pub category: String,
    /// Zero-based page number.
    pub page_index: usize,
    /// Rows per page.
    pub page_size: usize,
}

/// Filter for per-reference metric fetches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricFilter {
    /// Restrict the result to these full keys; `None` returns every metric.
    pub full_keys: Option<Vec<MetricKey>>,
}

impl MetricFilter {
    /// No filtering.
    #[must_use]
    pub const fn all() -> Self {
        Self { full_keys: None }
    }

    /// Only the given keys.
    #[must_use]
    pub fn keys(keys: Vec<MetricKey>) -> Self {
        Self {
            full_keys: Some(keys),
        }
    }

    /// Returns true if `key` passes the filter.
    #[must_use]
    pub fn accepts(&self, key: &MetricKey) -> bool {
        self.full_keys.as_ref().map_or(true, |keys| keys.contains(key))
    }
}

/// Contract of the upstream Reference/Metric/Segment API.
///
/// Every call is a suspension point; implementations must be safe to call
/// concurrently.
#[async_trait]
pub trait ReferenceSource: Send + Sync {
    /// Page through the references of a category.
    async fn get_references(&self, query: ReferenceQuery) -> Result<Page<Reference>, SourceError>;

    /// Fetch a single reference record.
    async fn get_reference_by_id(&self, id: &CategoryReferenceId) -> Result<Reference, SourceError>;

    /// Fetch the metrics of one reference, optionally restricted to some keys.
    async fn get_reference_metrics(
        &self,
        id: &CategoryReferenceId,
        filter: MetricFilter,
    ) -> Result<Vec<Metric>, SourceError>;

    /// Fetch the segment memberships of one reference.
    async fn get_reference_segments(
        &self,
        id: &CategoryReferenceId,
    ) -> Result<Vec<ReferenceSegment>, SourceError>;

    /// Fetch every segment definition (unpaginated).
    async fn get_segment_definitions(&self) -> Result<Vec<SegmentDefinition>, SourceError>;

    /// Page through the segment memberships of a category.
    async fn get_segments(&self, query: SegmentQuery) -> Result<Page<SegmentAssignment>, SourceError>;

    /// Page through the metrics of a category.
    async fn get_metrics(&self, query: MetricQuery) -> Result<Page<Metric>, SourceError>;
}
