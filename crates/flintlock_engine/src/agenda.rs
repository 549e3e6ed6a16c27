//! Conflict-resolution agenda.
//!
//! Eligible activations are ordered by `(salience desc, sequence asc)`.
//! Activations of duration-gated rules sit in a separate pending set keyed
//! by eligibility time until the clock catches up; keeping them out of the
//! ordered agenda avoids re-scanning ineligible activations on every fire
//! and makes duration semantics exact under the pseudo-clock.

use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use flintlock_foundation::{FactHandle, TimeDelta, Timestamp};

/// Computes the refraction signature of a rule bound to a tuple at
/// specific fact versions.
///
/// The signature identifies a logical match: updating any tuple fact bumps
/// its version and therefore produces a fresh signature, which is how the
/// engine distinguishes a re-created tuple from one it already fired on.
#[must_use]
pub fn refraction_signature(rule_index: usize, tuple: &[(FactHandle, u64)]) -> u64 {
    let mut hasher = DefaultHasher::new();
    rule_index.hash(&mut hasher);
    for (handle, version) in tuple {
        handle.hash(&mut hasher);
        version.hash(&mut hasher);
    }
    hasher.finish()
}

// =============================================================================
// Activation
// =============================================================================

/// A candidate firing: a rule bound to a specific fact tuple.
#[derive(Clone, Debug)]
pub struct Activation {
    id: u64,
    rule_index: usize,
    rule_name: Arc<str>,
    salience: i32,
    tuple: Vec<FactHandle>,
    signature: u64,
    created_at: Timestamp,
    eligible_at: Option<Timestamp>,
}

impl Activation {
    /// Returns the activation's sequence number (also its identity).
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Returns the index of the activated rule within its rule set.
    #[must_use]
    pub const fn rule_index(&self) -> usize {
        self.rule_index
    }

    /// Returns the activated rule's name.
    #[must_use]
    pub fn rule_name(&self) -> &str {
        &self.rule_name
    }

    pub(crate) fn rule_name_arc(&self) -> Arc<str> {
        Arc::clone(&self.rule_name)
    }

    /// Returns the rule's salience.
    #[must_use]
    pub const fn salience(&self) -> i32 {
        self.salience
    }

    /// Returns the matched fact handles, one per pattern slot.
    #[must_use]
    pub fn tuple(&self) -> &[FactHandle] {
        &self.tuple
    }

    /// Returns the refraction signature captured at activation time.
    #[must_use]
    pub const fn signature(&self) -> u64 {
        self.signature
    }

    /// Returns the instant the activation was created.
    #[must_use]
    pub const fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Returns the instant the activation becomes eligible, if it was
    /// duration-gated.
    #[must_use]
    pub const fn eligible_at(&self) -> Option<Timestamp> {
        self.eligible_at
    }
}

// =============================================================================
// Ordering
// =============================================================================

/// Comparator key for the ordered agenda: higher salience first, then
/// earlier sequence (FIFO among equals).
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
struct ReadyKey {
    salience: i32,
    seq: u64,
}

impl Ord for ReadyKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .salience
            .cmp(&self.salience)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for ReadyKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Where an activation currently lives.
#[derive(Copy, Clone, Debug)]
enum Slot {
    Ready(ReadyKey),
    Pending(Timestamp),
}

// =============================================================================
// Agenda
// =============================================================================

/// Ordered collection of eligible activations plus the pending set for
/// duration-gated ones.
#[derive(Debug, Default)]
pub struct Agenda {
    next_seq: u64,
    ready: BTreeMap<ReadyKey, Activation>,
    pending: BTreeMap<(Timestamp, u64), Activation>,
    slots: HashMap<u64, Slot>,
    signatures: HashMap<u64, u64>,
}

impl Agenda {
    /// Creates an empty agenda.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an activation for the rule/tuple pair.
    ///
    /// Assigns the next sequence number. If `duration` is set and has not
    /// yet elapsed relative to `now`, the activation goes to the pending
    /// set keyed by `now + duration`; otherwise it enters the ordered
    /// agenda. Returns a copy of the created activation so the caller can
    /// notify listeners.
    #[allow(clippy::too_many_arguments)]
    pub fn activate(
        &mut self,
        rule_index: usize,
        rule_name: Arc<str>,
        salience: i32,
        tuple: Vec<FactHandle>,
        signature: u64,
        now: Timestamp,
        duration: Option<TimeDelta>,
    ) -> Activation {
        let id = self.next_seq;
        self.next_seq += 1;

        let eligible_at = duration.map(|d| now + d);
        let activation = Activation {
            id,
            rule_index,
            rule_name,
            salience,
            tuple,
            signature,
            created_at: now,
            eligible_at,
        };

        match eligible_at {
            Some(at) if at > now => {
                self.pending.insert((at, id), activation.clone());
                self.slots.insert(id, Slot::Pending(at));
            }
            _ => {
                let key = ReadyKey { salience, seq: id };
                self.ready.insert(key, activation.clone());
                self.slots.insert(id, Slot::Ready(key));
            }
        }
        self.signatures.insert(signature, id);
        activation
    }

    /// Removes an activation from the agenda or the pending set.
    ///
    /// Idempotent: cancelling an id that is gone (or never existed)
    /// returns `None` and does nothing. The caller should only notify
    /// listeners on `Some`.
    pub fn cancel(&mut self, id: u64) -> Option<Activation> {
        let slot = self.slots.remove(&id)?;
        let activation = match slot {
            Slot::Ready(key) => self.ready.remove(&key),
            Slot::Pending(at) => self.pending.remove(&(at, id)),
        }?;
        self.signatures.remove(&activation.signature);
        Some(activation)
    }

    /// Moves every pending activation whose eligibility time has been
    /// reached into the ordered agenda, preserving creation order for
    /// tie-breaking. Returns the number promoted.
    pub fn promote(&mut self, now: Timestamp) -> usize {
        let mut promoted = 0;
        while let Some((&(at, id), _)) = self.pending.first_key_value() {
            if at > now {
                break;
            }
            if let Some(activation) = self.pending.remove(&(at, id)) {
                let key = ReadyKey {
                    salience: activation.salience,
                    seq: activation.id,
                };
                self.slots.insert(activation.id, Slot::Ready(key));
                self.ready.insert(key, activation);
                promoted += 1;
            }
        }
        promoted
    }

    /// Removes and returns the highest-salience, earliest-created eligible
    /// activation.
    pub fn pop_highest(&mut self) -> Option<Activation> {
        let (_, activation) = self.ready.pop_first()?;
        self.slots.remove(&activation.id);
        self.signatures.remove(&activation.signature);
        Some(activation)
    }

    /// Returns true if a live activation carries this signature.
    #[must_use]
    pub fn contains_signature(&self, signature: u64) -> bool {
        self.signatures.contains_key(&signature)
    }

    /// Returns the (signature, activation id) pairs of every live
    /// activation, agenda-resident or pending.
    pub fn signatures(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.signatures.iter().map(|(&sig, &id)| (sig, id))
    }

    /// Returns the number of eligible activations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ready.len()
    }

    /// Returns the number of duration-gated activations not yet eligible.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if there are no activations at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ready.is_empty() && self.pending.is_empty()
    }

    /// Drops every activation. Used at session teardown.
    pub fn clear(&mut self) {
        self.ready.clear();
        self.pending.clear();
        self.slots.clear();
        self.signatures.clear();
    }
}

// =============================================================================
// Tests
// =============================================================================
