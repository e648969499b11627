//! On-demand loader and ownership tracker.
//!
//! Loads a single reference (record, metrics, memberships fetched
//! concurrently) and commits it tagged with the session that asked for it.
//! Concurrent loads of one key share a single in-flight fetch when
//! coalescing is enabled; every caller still commits and claims ownership
//! once the shared fetch resolves, so the last claimant owns the entry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::SourceError;
use crate::identity::CategoryReferenceId;
use crate::reference::Reference;
use crate::session::SessionId;
use crate::source::{MetricFilter, ReferenceSource};
use crate::store::{Eviction, ReferenceSnapshot, ReferenceStore};

type FetchResult = Result<Arc<ReferenceSnapshot>, SourceError>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

#[derive(Clone)]
struct InFlight {
    generation: u64,
    fetch: SharedFetch,
}

/// Summary of a committed on-demand load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadedReference {
    /// The committed reference record.
    pub reference: Reference,
    /// Number of metrics committed.
    pub metrics: usize,
    /// Number of segment memberships committed.
    pub segments: usize,
    /// True if this call joined a fetch started by another caller.
    pub coalesced: bool,
}

/// Loads single references into the store on behalf of sessions.
pub struct OnDemandLoader {
    source: Arc<dyn ReferenceSource>,
    store: Arc<ReferenceStore>,
    coalesce: bool,
    in_flight: Mutex<HashMap<CategoryReferenceId, InFlight>>,
    next_generation: AtomicU64,
}

impl std::fmt::Debug for OnDemandLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnDemandLoader")
            .field("coalesce", &self.coalesce)
            .field("in_flight", &self.in_flight.lock().len())
            .finish_non_exhaustive()
    }
}

async fn fetch_snapshot(
    source: Arc<dyn ReferenceSource>,
    key: CategoryReferenceId,
) -> Result<ReferenceSnapshot, SourceError> {
    let (reference, metrics, segments) = futures::try_join!(
        source.get_reference_by_id(&key),
        source.get_reference_metrics(&key, MetricFilter::all()),
        source.get_reference_segments(&key),
    )?;

    Ok(ReferenceSnapshot {
        reference,
        metrics: metrics.into_iter().map(|m| (m.key, m.value)).collect(),
        segments: segments.into_iter().map(|s| s.segment_definition_id).collect(),
    })
}

impl OnDemandLoader {
    /// Creates a loader.
    #[must_use]
    pub fn new(source: Arc<dyn ReferenceSource>, store: Arc<ReferenceStore>, coalesce: bool) -> Self {
        Self {
            source,
            store,
            coalesce,
            in_flight: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Fetch `key` from the source and commit it, recording `owner` as the
    /// owning session when given.
    ///
    /// Nothing is committed if any of the three fetches fails.
    pub async fn load(
        &self,
        key: &CategoryReferenceId,
        owner: Option<&SessionId>,
    ) -> Result<LoadedReference, SourceError> {
        debug!(key = %key, owner = ?owner.map(SessionId::as_str), "loading reference");

        let (snapshot, coalesced) = if self.coalesce {
            self.fetch_coalesced(key).await
        } else {
            (fetch_snapshot(Arc::clone(&self.source), key.clone()).await.map(Arc::new), false)
        };

        let snapshot = match snapshot {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(key = %key, error = %err, "reference load failed");
                return Err(err);
            }
        };

        let loaded = LoadedReference {
            reference: snapshot.reference.clone(),
            metrics: snapshot.metrics.len(),
            segments: snapshot.segments.len(),
            coalesced,
        };
        self.store.commit(ReferenceSnapshot::clone(&snapshot), owner);
        info!(
            key = %key,
            owner = ?owner.map(SessionId::as_str),
            metrics = loaded.metrics,
            segments = loaded.segments,
            coalesced,
            "reference committed"
        );
        Ok(loaded)
    }

    async fn fetch_coalesced(&self, key: &CategoryReferenceId) -> (FetchResult, bool) {
        let (entry, coalesced) = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get(key) {
                Some(entry) => (entry.clone(), true),
                None => {
                    let entry = InFlight {
                        generation: self.next_generation.fetch_add(1, Ordering::Relaxed),
                        fetch: fetch_snapshot(Arc::clone(&self.source), key.clone())
                            .map(|result| result.map(Arc::new))
                            .boxed()
                            .shared(),
                    };
                    in_flight.insert(key.clone(), entry.clone());
                    (entry, false)
                }
            }
        };

        if coalesced {
            debug!(key = %key, "joining in-flight load");
        }

        let result = entry.fetch.await;

        let mut in_flight = self.in_flight.lock();
        if in_flight.get(key).is_some_and(|current| current.generation == entry.generation) {
            in_flight.remove(key);
        }
        (result, coalesced)
    }

    /// Evict `key`. With `session`, only when that session owns the entry.
    pub fn remove(&self, key: &CategoryReferenceId, session: Option<&SessionId>) -> Eviction {
        let eviction = self.store.evict(key, session);
        match &eviction {
            Eviction::Evicted => info!(key = %key, session = ?session.map(SessionId::as_str), "reference evicted"),
            Eviction::OwnedByOther(owner) => debug!(
                key = %key,
                session = ?session.map(SessionId::as_str),
                owner = %owner,
                "eviction skipped: owned by another session"
            ),
            Eviction::Unowned => debug!(key = %key, "eviction skipped: entry has no owner"),
            Eviction::NotCached => debug!(key = %key, "eviction skipped: not cached"),
        }
        eviction
    }

    /// Number of distinct keys with a fetch in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Forget every in-flight fetch. Callers already awaiting one still
    /// receive its result.
    pub fn clear(&self) {
        self.in_flight.lock().clear();
    }
}
