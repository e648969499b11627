//! Session-lifecycle handlers: load on authorization and character link,
//! ownership-scoped eviction on session end.

use serde::Serialize;
use tracing::debug;

use crate::cache::ReferenceCache;
use crate::error::CacheResult;
use crate::identity::CategoryReferenceId;
use crate::loader::LoadedReference;
use crate::session::SessionEvent;
use crate::store::Eviction;

/// What a session event did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    /// A reference was loaded and claimed by the session.
    Loaded(LoadedReference),
    /// The session ended; one eviction result per reference it named.
    Finished(Vec<(CategoryReferenceId, Eviction)>),
}

impl ReferenceCache {
    /// Apply a session-lifecycle event.
    ///
    /// Load failures propagate to the caller; nothing is committed for them.
    pub async fn handle_session(&self, event: SessionEvent) -> CacheResult<SessionOutcome> {
        match event {
            SessionEvent::Authorized { session_id, account_id } => {
                let key = CategoryReferenceId::new(&self.config.account_category, &account_id);
                let loaded = self.load_reference(key, Some(&session_id)).await?;
                Ok(SessionOutcome::Loaded(loaded))
            }
            SessionEvent::CharacterLinked {
                session_id,
                character_id,
            } => {
                let key = CategoryReferenceId::new(&self.config.character_category, &character_id);
                let loaded = self.load_reference(key, Some(&session_id)).await?;
                Ok(SessionOutcome::Loaded(loaded))
            }
            SessionEvent::Finished {
                session_id,
                account_id,
                character_id,
            } => {
                let keys = account_id
                    .map(|id| CategoryReferenceId::new(&self.config.account_category, id))
                    .into_iter()
                    .chain(
                        character_id.map(|id| CategoryReferenceId::new(&self.config.character_category, id)),
                    );
                let evictions: Vec<_> = keys
                    .map(|key| {
                        let eviction = self.remove_reference(&key, Some(&session_id));
                        (key, eviction)
                    })
                    .collect();
                debug!(
                    session = %session_id,
                    evicted = evictions.iter().filter(|(_, e)| e.is_evicted()).count(),
                    "session finished"
                );
                Ok(SessionOutcome::Finished(evictions))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use crate::config::CacheConfig;
    use crate::reference::Reference;
    use crate::session::SessionId;
    use crate::source::{InMemorySource, SourceSnapshot};

    async fn ready_cache() -> ReferenceCache {
        let source = InMemorySource::new(SourceSnapshot {
            references: vec![Reference::new("ACCOUNT", "1", "alice"), Reference::new("CHARACTER", "9", "bob")],
            ..SourceSnapshot::default()
        });
        let cache = ReferenceCache::new(Arc::new(source), CacheConfig::default()).unwrap();
        cache.init().await.unwrap();
        cache
    }

    #[tokio::test]
    async fn test_session_loads_and_evicts_its_references() {
        let cache = ready_cache().await;
        let s1 = SessionId::new("s1");

        cache
            .handle_session(SessionEvent::Authorized {
                session_id: s1.clone(),
                account_id: "1".to_string(),
            })
            .await
            .unwrap();
        cache
            .handle_session(SessionEvent::CharacterLinked {
                session_id: s1.clone(),
                character_id: "9".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(cache.owner_of("ACCOUNT:1"), Some(s1.clone()));
        assert_eq!(cache.owner_of("CHARACTER:9"), Some(s1.clone()));

        let outcome = cache
            .handle_session(SessionEvent::Finished {
                session_id: s1,
                account_id: Some("1".to_string()),
                character_id: Some("9".to_string()),
            })
            .await
            .unwrap();
        let SessionOutcome::Finished(evictions) = outcome else {
            panic!("unexpected outcome");
        };
        assert!(evictions.iter().all(|(_, e)| e.is_evicted()));
        assert!(cache.get("ACCOUNT:1").is_none());
        assert!(cache.get("CHARACTER:9").is_none());
    }

    #[tokio::test]
    async fn test_old_session_end_keeps_reclaimed_entry() {
        let cache = ready_cache().await;
        for session in ["s1", "s2"] {
            cache
                .handle_session(SessionEvent::Authorized {
                    session_id: SessionId::new(session),
                    account_id: "1".to_string(),
                })
                .await
                .unwrap();
        }

        let outcome = cache
            .handle_session(SessionEvent::Finished {
                session_id: SessionId::new("s1"),
                account_id: Some("1".to_string()),
                character_id: None,
            })
            .await
            .unwrap();
        assert_eq!(
            outcome,
            SessionOutcome::Finished(vec![(
                CategoryReferenceId::new("ACCOUNT", "1"),
                Eviction::OwnedByOther(SessionId::new("s2"))
            )])
        );
        assert!(cache.get("ACCOUNT:1").is_some());
    }

    #[tokio::test]
    async fn test_authorization_failure_propagates() {
        let cache = ready_cache().await;
        let err = cache
            .handle_session(SessionEvent::Authorized {
                session_id: SessionId::new("s1"),
                account_id: "404".to_string(),
            })
            .await
            .unwrap_err();
        assert!(err.is_source());
        assert!(cache.get("ACCOUNT:404").is_none());
    }
}
