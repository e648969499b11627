//! Bulk and on-demand population of the reference store.

mod bulk;
mod on_demand;

pub use bulk::{BulkLoader, PreloadSummary};
pub use on_demand::{LoadedReference, OnDemandLoader};
