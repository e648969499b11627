//! # refcache - Reference Segmentation & Metrics Cache
//!
//! refcache keeps a process-wide mirror of metadata about external entities
//! (accounts, characters, vehicles, ...) addressed by `"category:id"` keys:
//! their attribute metrics, their segment memberships and the global segment
//! definitions carrying access policies. The mirror is populated by bulk
//! preloads and session-driven on-demand loads, kept current by push deltas,
//! and queried through a small JSON-Logic style rule interpreter and an
//! access-policy aggregator.
//!
//! ## Core Concepts
//!
//! - **CategoryReferenceId**: canonical `"category:id"` key of a reference
//! - **Metric**: a typed attribute value attached to a reference
//! - **SegmentDefinition**: a policy object references may belong to
//! - **Ownership record**: the session whose on-demand load populated an entry
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use refcache::{CacheConfig, InMemorySource, ReferenceCache, Rule, SessionId};
//! use serde_json::json;
//!
//! # async fn run() -> refcache::CacheResult<()> {
//! let source = Arc::new(InMemorySource::default());
//! let cache = ReferenceCache::new(source, CacheConfig::default())?;
//! cache.init().await?;
//!
//! let session = SessionId::new("session-1");
//! cache.load_reference(("ACCOUNT", "42"), Some(&session)).await?;
//!
//! let veteran = Rule::new(json!({">": [{"var": "CREATED_DATE"}, 1_600_000_000_000_i64]}));
//! let verdict = cache.apply_metrics_condition("ACCOUNT:42", &veteran)?;
//! # let _ = verdict;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Data model
pub mod error;
pub mod identity;
pub mod metric;
pub mod reference;
pub mod segment;
pub mod session;

// Storage and loading
pub mod loader;
pub mod registry;
pub mod source;
pub mod store;

// Synchronization, events and queries
pub mod events;
pub mod policy;
pub mod rules;
pub mod sync;

// Facade and configuration
pub mod cache;
pub mod config;
#[cfg(feature = "cli")]
pub mod logging;

// Re-export primary types at crate root for convenience
pub use cache::{CacheStats, ReferenceCache};
pub use config::{CacheConfig, LogFormat, LoggingConfig};
pub use error::{CacheError, CacheResult, ConfigError, EventError, RuleError, SourceError};
pub use events::{DomainEvent, DomainEventPayload, EventBus, EventStream, SegmentChange};
pub use identity::{to_key, CategoryReferenceId, ReferenceParam};
pub use loader::{LoadedReference, PreloadSummary};
pub use metric::{Metric, MetricKey, MetricMap, MetricScope, MetricValue};
pub use reference::Reference;
pub use registry::{SegmentDefinitionRegistry, UpdateOutcome};
pub use rules::{Rule, VariableSource};
pub use segment::{AccessPolicy, SegmentDefinition, SegmentDefinitionId, SegmentPolicy, SegmentType};
pub use session::{SessionEvent, SessionId};
pub use source::{InMemorySource, Page, ReferenceSource, SourceSnapshot};
pub use store::{Eviction, ReferenceStore};
pub use sync::{DeltaEvent, DeltaOutcome, HandlerTable, SessionOutcome};
