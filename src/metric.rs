//! Metric keys and values attached to references.
//!
//! Metric values form a closed set (number, string, bool, sequence, map);
//! producers must build one of the variants explicitly.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identity::CategoryReferenceId;

/// Per-reference metric map.
pub type MetricMap = HashMap<MetricKey, MetricValue>;

/// Optional `{type, key}` scope of a metric.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricScope {
    /// Scope type, e.g. `SERVER`.
    #[serde(rename = "type")]
    pub scope_type: String,
    /// Scope key, e.g. a server id.
    pub key: String,
}

impl MetricScope {
    /// Creates a scope.
    #[must_use]
    pub fn new(scope_type: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            scope_type: scope_type.into(),
            key: key.into(),
        }
    }
}

/// Full metric key: `[SCOPE_TYPE:SCOPE_KEY:]MAIN_KEY[:SUB_KEY]`.
///
/// # Examples
///
/// ```
/// use refcache::{MetricKey, MetricScope};
///
/// let plain = MetricKey::compose("PLAYTIME", None, None);
/// assert_eq!(plain.as_str(), "PLAYTIME");
///
/// let scoped = MetricKey::compose("KILLS", Some("PISTOL"), Some(&MetricScope::new("SERVER", "eu-1")));
/// assert_eq!(scoped.as_str(), "SERVER:eu-1:KILLS:PISTOL");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricKey(String);

impl MetricKey {
    /// Wraps a full key as-is.
    #[must_use]
    pub fn new(full_key: impl Into<String>) -> Self {
        Self(full_key.into())
    }

    /// Composes a full key from its parts.
    #[must_use]
    pub fn compose(main_key: &str, sub_key: Option<&str>, scope: Option<&MetricScope>) -> Self {
        let mut key = String::new();
        if let Some(scope) = scope {
            key.push_str(&scope.scope_type);
            key.push(':');
            key.push_str(&scope.key);
            key.push(':');
        }
        key.push_str(main_key);
        if let Some(sub_key) = sub_key {
            key.push(':');
            key.push_str(sub_key);
        }
        Self(key)
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::borrow::Borrow<str> for MetricKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MetricKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for MetricKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Value of a single metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    /// Flag.
    Bool(bool),
    /// Counter or measurement.
    Number(f64),
    /// Free text.
    String(String),
    /// JSON array, kept as-is.
    List(Vec<serde_json::Value>),
    /// JSON object, kept as-is.
    Map(serde_json::Map<String, serde_json::Value>),
}

impl MetricValue {
    /// Returns true for numeric values.
    #[must_use]
    pub const fn is_number(&self) -> bool {
        matches!(self, Self::Number(_))
    }

    /// Numeric value, if this is a number.
    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Boolean value, if this is a flag.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Text value, if this is a string.
    #[must_use]
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Returns a human-readable type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    /// JSON form used by the rule evaluator.
    ///
    /// Non-finite numbers have no JSON form and become `null`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(v) => serde_json::Value::Bool(*v),
            Self::Number(v) => serde_json::Number::from_f64(*v)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::String(v) => serde_json::Value::String(v.clone()),
            Self::List(v) => serde_json::Value::Array(v.clone()),
            Self::Map(v) => serde_json::Value::Object(v.clone()),
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Number(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v:?}"),
            Self::List(v) => write!(f, "list[{}]", v.len()),
            Self::Map(v) => write!(f, "map{{{}}}", v.len()),
        }
    }
}

impl From<bool> for MetricValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for MetricValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(v: i64) -> Self {
        Self::Number(v as f64)
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

/// One metric as delivered by the upstream source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metric {
    /// Owning reference.
    pub category_reference_id: CategoryReferenceId,
    /// Full metric key.
    #[serde(alias = "fullKey")]
    pub key: MetricKey,
    /// Current value.
    pub value: MetricValue,
}

impl Metric {
    /// Creates a metric.
    #[must_use]
    pub fn new(
        category_reference_id: impl Into<CategoryReferenceId>,
        key: impl Into<MetricKey>,
        value: impl Into<MetricValue>,
    ) -> Self {
        Self {
            category_reference_id: category_reference_id.into(),
            key: key.into(),
            value: value.into(),
        }
    }
}
