//! Fact handles for working memory.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Unique identifier bound to exactly one fact for its lifetime.
///
/// Handles are assigned monotonically by working memory and are never
/// reused: once the fact is retracted the handle is permanently invalid,
/// and any operation through it fails rather than touching a newer fact.
///
/// Identity is by handle, not value equality. Inserting two equal-by-value
/// facts produces two distinct handles.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FactHandle(u64);

impl FactHandle {
    /// Creates a handle from a raw id.
    ///
    /// Only working memory should mint new handles; this is exposed for
    /// storage internals and tests.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id of this handle.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for FactHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FactHandle({})", self.0)
    }
}

impl fmt::Display for FactHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fact({})", self.0)
    }
}
