//! Session identities and the session-lifecycle inputs that drive on-demand
//! loads and ownership-scoped eviction.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a player session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps a session id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Session-lifecycle inputs published by the session domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The session was authorized against an account.
    #[serde(rename = "session.authorized", rename_all = "camelCase")]
    Authorized {
        /// Session that was authorized.
        session_id: SessionId,
        /// Account reference id, without category.
        account_id: String,
    },

    /// A character was linked to the session.
    #[serde(rename = "session.character_linked", rename_all = "camelCase")]
    CharacterLinked {
        /// Session the character joined.
        session_id: SessionId,
        /// Character reference id, without category.
        character_id: String,
    },

    /// The session ended.
    #[serde(rename = "session.finished", rename_all = "camelCase")]
    Finished {
        /// Session that ended.
        session_id: SessionId,
        /// Account the session held, if any.
        #[serde(default)]
        account_id: Option<String>,
        /// Character the session held, if any.
        #[serde(default)]
        character_id: Option<String>,
    },
}

impl SessionEvent {
    /// Session this event belongs to.
    #[must_use]
    pub const fn session_id(&self) -> &SessionId {
        match self {
            Self::Authorized { session_id, .. }
            | Self::CharacterLinked { session_id, .. }
            | Self::Finished { session_id, .. } => session_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_event_wire_format() {
        let json = serde_json::json!({
            "event": "session.character_linked",
            "sessionId": "s-1",
            "characterId": "77"
        });
        let event: SessionEvent = serde_json::from_value(json).unwrap();
        assert_eq!(
            event,
            SessionEvent::CharacterLinked {
                session_id: SessionId::new("s-1"),
                character_id: "77".to_string(),
            }
        );
        assert_eq!(event.session_id().as_str(), "s-1");
    }

    #[test]
    fn test_session_finished_optional_ids() {
        let json = serde_json::json!({ "event": "session.finished", "sessionId": "s-2" });
        let event: SessionEvent = serde_json::from_value(json).unwrap();
        assert!(matches!(
            event,
            SessionEvent::Finished { account_id: None, character_id: None, .. }
        ));
    }
}
