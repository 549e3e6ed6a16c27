//! Working memory: the fact store.
//!
//! Handles are monotonic and never reused. Each live fact carries an
//! update counter; an update replaces the value and bumps the counter,
//! which is how the engine tells a re-created tuple from one it has
//! already fired on.

use flintlock_foundation::{Error, FactHandle, FlMap, KeywordId, Result};

use crate::fact::Fact;

/// A live fact together with its update counter.
#[derive(Clone, Debug)]
struct FactRecord {
    fact: Fact,
    version: u64,
}

/// The live set of inserted facts visible to rule matching.
///
/// Backed by a persistent map, so taking a point-in-time snapshot is O(1);
/// queries iterate such a snapshot and never observe mutations made while
/// they run.
#[derive(Clone, Debug, Default)]
pub struct WorkingMemory {
    facts: FlMap<FactHandle, FactRecord>,
    next_id: u64,
}

impl WorkingMemory {
    /// Creates empty working memory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a fact, returning its freshly minted handle.
    ///
    /// Never fails. Equal-by-value facts inserted twice get two distinct
    /// handles.
    pub fn insert(&mut self, fact: Fact) -> FactHandle {
        let handle = FactHandle::new(self.next_id);
        self.next_id += 1;
        self.facts
            .insert_mut(handle, FactRecord { fact, version: 0 });
        handle
    }

    /// Replaces the fact behind a handle and bumps its update counter.
    ///
    /// # Errors
    /// Fails with an invalid-handle error if the handle is unknown or
    /// already retracted.
    pub fn update(&mut self, handle: FactHandle, fact: Fact) -> Result<()> {
        let Some(record) = self.facts.get(&handle) else {
            return Err(Error::invalid_handle(handle));
        };
        let version = record.version + 1;
        self.facts.insert_mut(handle, FactRecord { fact, version });
        Ok(())
    }

    /// Removes a fact, permanently invalidating its handle.
    ///
    /// Returns the retracted fact.
    ///
    /// # Errors
    /// Fails with an invalid-handle error if the handle is unknown or
    /// already retracted. Retracting twice is therefore an error, never
    /// a crash.
    pub fn retract(&mut self, handle: FactHandle) -> Result<Fact> {
        self.facts
            .remove_mut(&handle)
            .map(|record| record.fact)
            .ok_or_else(|| Error::invalid_handle(handle))
    }

    /// Gets the fact behind a handle.
    ///
    /// # Errors
    /// Fails with an invalid-handle error if the handle is unknown or
    /// already retracted.
    pub fn get(&self, handle: FactHandle) -> Result<&Fact> {
        self.facts
            .get(&handle)
            .map(|record| &record.fact)
            .ok_or_else(|| Error::invalid_handle(handle))
    }

    /// Gets the update counter for a handle.
    ///
    /// # Errors
    /// Fails with an invalid-handle error if the handle is unknown or
    /// already retracted.
    pub fn version(&self, handle: FactHandle) -> Result<u64> {
        self.facts
            .get(&handle)
            .map(|record| record.version)
            .ok_or_else(|| Error::invalid_handle(handle))
    }

    /// Returns true if the handle refers to a live fact.
    #[must_use]
    pub fn contains(&self, handle: FactHandle) -> bool {
        self.facts.contains_key(&handle)
    }

    /// Returns the number of live facts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    /// Returns true if working memory is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Returns the handles of live facts, optionally filtered by fact
    /// type, in ascending handle (insertion) order.
    #[must_use]
    pub fn handles_by_type(&self, fact_type: Option<KeywordId>) -> Vec<FactHandle> {
        let mut handles: Vec<FactHandle> = self
            .facts
            .iter()
            .filter(|(_, record)| fact_type.is_none_or(|ty| record.fact.fact_type() == ty))
            .map(|(handle, _)| *handle)
            .collect();
        handles.sort_unstable();
        handles
    }

    /// Lazily yields the handles of facts satisfying the predicate.
    ///
    /// The iteration is snapshot-consistent at call time: mutations made
    /// to working memory while the iterator is alive are not observed.
    pub fn query<P>(&self, predicate: P) -> impl Iterator<Item = FactHandle> + use<P>
    where
        P: Fn(&Fact) -> bool,
    {
        self.facts
            .clone()
            .into_iter()
            .filter(move |(_, record)| predicate(&record.fact))
            .map(|(handle, _)| handle)
    }

    /// Returns an O(1) snapshot of the live facts.
    #[must_use]
    pub fn snapshot(&self) -> FlMap<FactHandle, Fact> {
        self.facts
            .iter()
            .map(|(handle, record)| (*handle, record.fact.clone()))
            .collect()
    }

    /// Drops every fact. Used at session teardown.
    pub fn clear(&mut self) {
        self.facts = FlMap::new();
    }
}
