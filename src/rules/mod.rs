//! JSON-Logic style rule evaluation over cached metrics.
//!
//! A [`Rule`] is a serializable expression tree. It is evaluated against a
//! [`VariableSource`], normally a reference's metric map, where `var` lookups
//! of absent keys yield `null` instead of failing.
//!
//! ```
//! use refcache::metric::{MetricKey, MetricMap, MetricValue};
//! use refcache::rules::Rule;
//! use serde_json::json;
//!
//! let mut metrics = MetricMap::new();
//! metrics.insert(MetricKey::new("LEVEL"), MetricValue::Number(12.0));
//!
//! let rule = Rule::new(json!({">": [{"var": "LEVEL"}, 10]}));
//! assert!(rule.matches(&metrics).unwrap());
//! ```

mod coerce;
mod eval;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RuleError;
use crate::metric::MetricMap;

pub use coerce::{is_truthy, loose_eq, strict_eq};
pub use eval::{evaluate, MAX_RULE_DEPTH};

/// Environment a rule reads its variables from.
pub trait VariableSource {
    /// Value bound to `key`, if any.
    fn resolve(&self, key: &str) -> Option<Value>;
}

impl VariableSource for MetricMap {
    fn resolve(&self, key: &str) -> Option<Value> {
        self.get(key).map(crate::metric::MetricValue::to_json)
    }
}

impl VariableSource for serde_json::Map<String, Value> {
    fn resolve(&self, key: &str) -> Option<Value> {
        self.get(key).cloned()
    }
}

impl<T: VariableSource + ?Sized> VariableSource for &T {
    fn resolve(&self, key: &str) -> Option<Value> {
        (**self).resolve(key)
    }
}

/// A rule expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rule(Value);

impl Rule {
    /// Wraps a JSON expression.
    #[must_use]
    pub const fn new(expression: Value) -> Self {
        Self(expression)
    }

    /// Parses a rule from JSON text.
    pub fn parse(json: &str) -> Result<Self, RuleError> {
        serde_json::from_str(json)
            .map(Self)
            .map_err(|e| RuleError::MalformedOperation { reason: e.to_string() })
    }

    /// The underlying expression.
    #[must_use]
    pub const fn as_json(&self) -> &Value {
        &self.0
    }

    /// Evaluates the rule.
    pub fn evaluate(&self, vars: &dyn VariableSource) -> Result<Value, RuleError> {
        evaluate(&self.0, vars)
    }

    /// Evaluates the rule and reduces the result to its truthiness.
    pub fn matches(&self, vars: &dyn VariableSource) -> Result<bool, RuleError> {
        self.evaluate(vars).map(|value| is_truthy(&value))
    }
}

impl From<Value> for Rule {
    fn from(expression: Value) -> Self {
        Self(expression)
    }
}
