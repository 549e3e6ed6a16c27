//! Keyword interning for fact types and field names.
//!
//! Fact-type tags and field names are interned to enable fast equality
//! comparison in the matcher's inner loop. The interner is owned by the
//! caller (test code or an external rule compiler); [`KeywordId`]s are
//! `Copy` and flow freely through the engine without it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Interned keyword identifier.
///
/// Keywords name fact types (`gift`, `purchase`) and fields (`recipient`,
/// `subtotal`). They are interned for fast comparison.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct KeywordId(pub(crate) u32);

impl KeywordId {
    /// Returns the raw index of this keyword.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for KeywordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeywordId({})", self.0)
    }
}

/// Interner mapping keyword strings to unique IDs and back.
///
/// Not thread-safe; use external synchronization if needed.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Interner {
    /// Keyword string storage, indexed by `KeywordId`.
    keywords: Vec<Arc<str>>,
    /// Map from keyword string to its id.
    keyword_map: HashMap<Arc<str>, KeywordId>,
}

impl Interner {
    /// Creates a new empty interner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a keyword, returning its [`KeywordId`].
    ///
    /// Interning the same string twice returns the same id.
    ///
    /// # Panics
    ///
    /// Panics if the number of interned keywords exceeds `u32::MAX`.
    pub fn intern_keyword(&mut self, s: &str) -> KeywordId {
        if let Some(&id) = self.keyword_map.get(s) {
            return id;
        }

        let idx = u32::try_from(self.keywords.len()).expect("too many interned keywords");
        let arc: Arc<str> = s.into();
        self.keywords.push(arc.clone());
        let id = KeywordId(idx);
        self.keyword_map.insert(arc, id);
        id
    }

    /// Gets the string for a keyword id.
    #[must_use]
    pub fn keyword_name(&self, id: KeywordId) -> Option<&str> {
        self.keywords.get(id.0 as usize).map(AsRef::as_ref)
    }

    /// Returns the number of interned keywords.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    /// Returns true if nothing has been interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}
