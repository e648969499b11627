//! Explicit event-name to handler registration table.
//!
//! Handlers are bound closures registered at composition time. Dispatch runs
//! the handlers of one name in registration order.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::trace;

use crate::cache::ReferenceCache;
use crate::error::{CacheResult, EventError};
use crate::session::SessionEvent;

use super::events::DeltaEvent;

/// A registered event handler.
pub type Handler = Arc<dyn Fn(Value) -> BoxFuture<'static, CacheResult<()>> + Send + Sync>;

/// Session event names handled by [`HandlerTable::for_cache`].
const SESSION_EVENTS: [&str; 3] = ["session.authorized", "session.character_linked", "session.finished"];

/// Registration table mapping event names to handlers.
#[derive(Default)]
pub struct HandlerTable {
    handlers: HashMap<String, Vec<Handler>>,
}

impl std::fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names = self.names();
        names.sort_unstable();
        f.debug_struct("HandlerTable").field("names", &names).finish()
    }
}

/// Decode a tagged event payload, filling in the tag from `name` when the
/// payload omits it.
fn decode<T: DeserializeOwned>(name: &str, mut payload: Value) -> Result<T, EventError> {
    if let Value::Object(map) = &mut payload {
        map.entry("event").or_insert_with(|| Value::String(name.to_string()));
    }
    serde_json::from_value(payload).map_err(|e| EventError::Malformed {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

impl HandlerTable {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`. Several handlers may share a name.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CacheResult<()>> + Send + 'static,
    {
        let boxed: Handler = Arc::new(move |payload| handler(payload).boxed());
        self.handlers.entry(name.into()).or_default().push(boxed);
    }

    /// Table wiring every delta and session event to `cache`.
    #[must_use]
    pub fn for_cache(cache: Arc<ReferenceCache>) -> Self {
        let mut table = Self::new();

        for name in DeltaEvent::NAMES {
            let cache = Arc::clone(&cache);
            table.register(name, move |payload| {
                let cache = Arc::clone(&cache);
                async move {
                    let event: DeltaEvent = decode(name, payload)?;
                    cache.apply_delta(event).await.map(|_| ())
                }
            });
        }

        for name in SESSION_EVENTS {
            let cache = Arc::clone(&cache);
            table.register(name, move |payload| {
                let cache = Arc::clone(&cache);
                async move {
                    let event: SessionEvent = decode(name, payload)?;
                    cache.handle_session(event).await.map(|_| ())
                }
            });
        }

        table
    }

    /// Run every handler registered under `name` and return how many ran.
    ///
    /// Unknown names run nothing. The first failing handler stops the
    /// dispatch and its error is returned.
    pub async fn dispatch(&self, name: &str, payload: Value) -> CacheResult<usize> {
        let Some(handlers) = self.handlers.get(name) else {
            trace!(event = name, "no handler registered");
            return Ok(0);
        };
        for handler in handlers {
            (**handler)(payload.clone()).await?;
        }
        Ok(handlers.len())
    }

    /// Registered event names.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    /// Number of handlers registered under `name`.
    #[must_use]
    pub fn handler_count(&self, name: &str) -> usize {
        self.handlers.get(name).map_or(0, Vec::len)
    }
}
