//! Incremental synchronization from push and session events.
//!
//! Delta handlers mutate exactly one store each and are idempotent under
//! replay. Stale and untracked deltas are ordinary traffic and are reported
//! through [`DeltaOutcome`], not as errors.

mod events;
mod handlers;
mod session;
mod table;

pub use events::{DeltaEvent, DeltaOutcome, MetricsDelta, SegmentDefinitionDelta, SegmentDefinitionRemoval};
pub use session::SessionOutcome;
pub use table::{Handler, HandlerTable};
