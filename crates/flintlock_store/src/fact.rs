//! Typed fact records.

use std::fmt;

use flintlock_foundation::{Error, FlMap, KeywordId, Result, Value};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A typed record inserted into working memory.
///
/// A fact is a fact-type tag plus a persistent field map. Facts are plain
/// immutable values: rule actions change working memory by replacing the
/// fact behind a handle, never by mutating a fact in place.
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Fact {
    fact_type: KeywordId,
    fields: FlMap<KeywordId, Value>,
}

impl Fact {
    /// Creates a new fact of the given type with no fields.
    #[must_use]
    pub fn new(fact_type: KeywordId) -> Self {
        Self {
            fact_type,
            fields: FlMap::new(),
        }
    }

    /// Returns this fact with the field set (builder style).
    #[must_use]
    pub fn with_field(mut self, key: KeywordId, value: impl Into<Value>) -> Self {
        self.fields = self.fields.insert(key, value.into());
        self
    }

    /// Returns this fact's type tag.
    #[must_use]
    pub const fn fact_type(&self) -> KeywordId {
        self.fact_type
    }

    /// Gets a field value.
    #[must_use]
    pub fn get(&self, key: KeywordId) -> Option<&Value> {
        self.fields.get(&key)
    }

    /// Gets a field value, or fails with an internal error naming the slot.
    pub fn require(&self, key: KeywordId) -> Result<&Value> {
        self.get(key)
            .ok_or_else(|| Error::internal(format!("missing field {key:?}")))
    }

    /// Gets a string field.
    pub fn field_str(&self, key: KeywordId) -> Result<&str> {
        self.require(key)?.expect_str()
    }

    /// Gets an integer field.
    pub fn field_int(&self, key: KeywordId) -> Result<i64> {
        self.require(key)?.expect_int()
    }

    /// Gets a float field.
    pub fn field_float(&self, key: KeywordId) -> Result<f64> {
        self.require(key)?.expect_float()
    }

    /// Gets a boolean field.
    pub fn field_bool(&self, key: KeywordId) -> Result<bool> {
        self.require(key)?.expect_bool()
    }

    /// Gets a keyword field.
    pub fn field_keyword(&self, key: KeywordId) -> Result<KeywordId> {
        self.require(key)?.expect_keyword()
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the fact has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns an iterator over the fields.
    pub fn fields(&self) -> impl Iterator<Item = (&KeywordId, &Value)> {
        self.fields.iter()
    }
}

impl fmt::Debug for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fact(:{} ", self.fact_type.index())?;
        f.debug_map().entries(self.fields.iter()).finish()?;
        write!(f, ")")
    }
}
