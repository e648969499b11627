//! Canonical `"category:id"` reference keys.
//!
//! Every store and handler normalizes its input through [`to_key`] first, so
//! callers may pass either a raw key or a `{category, referenceId}` pair.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator between the category and the reference id.
pub const KEY_SEPARATOR: char = ':';

/// Canonical key of an external entity: `"{category}:{referenceId}"`.
///
/// Category and id are opaque; no separator validation is performed, so the
/// pair form is only reversible by convention (see [`CategoryReferenceId::parse`]).
///
/// # Examples
///
/// ```
/// use refcache::CategoryReferenceId;
///
/// let key = CategoryReferenceId::new("VEHICLE", "1200");
/// assert_eq!(key.as_str(), "VEHICLE:1200");
/// assert_eq!(key.parse().unwrap().category, "VEHICLE");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryReferenceId(String);

impl CategoryReferenceId {
    /// Builds a key from a category and a reference id.
    #[must_use]
    pub fn new(category: impl AsRef<str>, reference_id: impl AsRef<str>) -> Self {
        Self(format!(
            "{}{KEY_SEPARATOR}{}",
            category.as_ref(),
            reference_id.as_ref()
        ))
    }

    /// Wraps an already-formatted key without inspecting it.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits the key at the first separator.
    ///
    /// Returns `None` for keys without a separator.
    #[must_use]
    pub fn parse(&self) -> Option<ReferenceParam> {
        let (category, reference_id) = self.0.split_once(KEY_SEPARATOR)?;
        Some(ReferenceParam::new(category, reference_id))
    }

    /// Category part of the key, if the key has one.
    #[must_use]
    pub fn category(&self) -> Option<&str> {
        self.0.split_once(KEY_SEPARATOR).map(|(category, _)| category)
    }
}

impl fmt::Display for CategoryReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CategoryReferenceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CategoryReferenceId {
    fn from(raw: &str) -> Self {
        Self::from_raw(raw)
    }
}

impl From<String> for CategoryReferenceId {
    fn from(raw: String) -> Self {
        Self::from_raw(raw)
    }
}

impl From<&CategoryReferenceId> for CategoryReferenceId {
    fn from(key: &CategoryReferenceId) -> Self {
        key.clone()
    }
}

impl From<ReferenceParam> for CategoryReferenceId {
    fn from(param: ReferenceParam) -> Self {
        Self::new(param.category, param.reference_id)
    }
}

impl From<&ReferenceParam> for CategoryReferenceId {
    fn from(param: &ReferenceParam) -> Self {
        Self::new(&param.category, &param.reference_id)
    }
}

impl<C: AsRef<str>, R: AsRef<str>> From<(C, R)> for CategoryReferenceId {
    fn from((category, reference_id): (C, R)) -> Self {
        Self::new(category, reference_id)
    }
}

/// The `{category, referenceId}` form of a reference key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceParam {
    /// Reference category, e.g. `ACCOUNT` or `VEHICLE`.
    pub category: String,
    /// Category-local id.
    pub reference_id: String,
}

impl ReferenceParam {
    /// Creates a new pair.
    #[must_use]
    pub fn new(category: impl Into<String>, reference_id: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            reference_id: reference_id.into(),
        }
    }

    /// Canonical key for this pair.
    #[must_use]
    pub fn key(&self) -> CategoryReferenceId {
        CategoryReferenceId::from(self)
    }
}

/// Normalizes either key form into a [`CategoryReferenceId`].
///
/// Raw strings pass through unchanged; pairs are joined with `:`.
pub fn to_key(param: impl Into<CategoryReferenceId>) -> CategoryReferenceId {
    param.into()
}
