//! Error types for refcache.
//!
//! All errors are strongly typed using thiserror so callers can match on
//! the failing layer (upstream source, rule evaluation, configuration,
//! inbound events) instead of parsing messages.

use thiserror::Error;

use crate::identity::CategoryReferenceId;

/// Failures reported by the upstream reference/metric/segment source.
///
/// Cloneable: a coalesced on-demand load hands the same failure to every
/// caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The upstream call failed outright.
    #[error("Upstream request '{operation}' failed: {message}")]
    Request {
        /// Upstream operation name, e.g. `getReferences`.
        operation: String,
        /// Failure detail from the transport or the source.
        message: String,
    },

    /// The source has no reference with this identity.
    #[error("Reference not found upstream: {id}")]
    NotFound {
        /// The identity that was looked up.
        id: CategoryReferenceId,
    },

    /// The response arrived but could not be decoded.
    #[error("Failed to decode upstream response: {message}")]
    Decode {
        /// Decoder detail.
        message: String,
    },

    /// The upstream call did not answer in time.
    #[error("Upstream request '{operation}' timed out")]
    Timeout {
        /// Upstream operation name.
        operation: String,
    },
}

impl SourceError {
    /// Creates a request error for the named upstream operation.
    #[must_use]
    pub fn request(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Request {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Rule evaluation errors.
///
/// A variable that is missing from the environment is not an error; it
/// evaluates to `null`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    /// The operation names an operator the evaluator does not know.
    #[error("Unknown rule operator '{operator}'")]
    UnknownOperator {
        /// The unrecognised operator name.
        operator: String,
    },

    /// The operation object is not a single-key map.
    #[error("Malformed rule operation: {reason}")]
    MalformedOperation {
        /// What was wrong with its shape.
        reason: String,
    },

    /// An operator received arguments it cannot work with.
    #[error("Invalid argument for '{operator}': {reason}")]
    InvalidArgument {
        /// The operator being applied.
        operator: String,
        /// Why the arguments were rejected.
        reason: String,
    },
}

/// Configuration loading and validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config file {path}: {message}")]
    Read {
        /// Path that was opened.
        path: String,
        /// I/O failure detail.
        message: String,
    },

    /// The config text is not valid TOML for [`crate::CacheConfig`].
    #[error("Failed to parse config: {message}")]
    Parse {
        /// Parser detail.
        message: String,
    },

    /// A field parsed but holds an unusable value.
    #[error("Invalid config field '{field}': {reason}")]
    Invalid {
        /// Name of the offending field.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Inbound event decoding and outbound stream errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// An inbound event is missing data or carries the wrong shape.
    #[error("Malformed '{name}' event: {reason}")]
    Malformed {
        /// Event name as received.
        name: String,
        /// What could not be decoded.
        reason: String,
    },

    /// No event arrived within the receive timeout.
    #[error("Event stream timed out after {duration_ms}ms")]
    Timeout {
        /// Timeout that elapsed, in milliseconds.
        duration_ms: u64,
    },

    /// The publishing side of the stream is gone.
    #[error("Event stream disconnected")]
    Disconnected,
}

/// Top-level error type for refcache.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// Upstream source failure.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Rule evaluation failure.
    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),

    /// Configuration failure.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Inbound event or stream failure.
    #[error("Event error: {0}")]
    Event(#[from] EventError),

    /// A read arrived before a successful `init`.
    #[error("Cache is not initialised")]
    NotReady,

    /// An invariant inside the cache was broken.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the broken state.
        message: String,
    },
}

impl CacheError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this error came from the upstream source.
    #[must_use]
    pub const fn is_source(&self) -> bool {
        matches!(self, Self::Source(_))
    }

    /// Returns true if this is a rule evaluation error.
    #[must_use]
    pub const fn is_rule(&self) -> bool {
        matches!(self, Self::Rule(_))
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if retrying the same call may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Source(e) => matches!(e, SourceError::Request { .. } | SourceError::Timeout { .. }),
            Self::NotReady => true,
            Self::Rule(_) | Self::Config(_) | Self::Event(_) | Self::Internal { .. } => false,
        }
    }
}

/// Result type alias for refcache operations.
pub type CacheResult<T> = Result<T, CacheError>;
