//! Candidate-match discovery.
//!
//! The matcher is a pluggable capability: given a rule set and working
//! memory it yields every (rule, tuple) pair whose condition currently
//! holds. The engine core only requires that re-matching be deterministic
//! and complete, not which algorithm produces it.

use flintlock_foundation::{FactHandle, Result};
use flintlock_store::{Fact, WorkingMemory};

use crate::rule::RuleSet;

/// A rule paired with a satisfying fact tuple.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateMatch {
    /// Index of the rule within its rule set.
    pub rule_index: usize,
    /// Matched fact handles, one per pattern slot.
    pub tuple: Vec<FactHandle>,
}

/// Yields the set of rules whose conditions currently hold.
pub trait Matcher: Send {
    /// Returns every satisfying (rule, tuple) pair, in a deterministic
    /// order.
    ///
    /// # Errors
    /// A condition failure surfaces as a rule-execution error naming the
    /// rule whose condition raised.
    fn candidates(&self, rules: &RuleSet, memory: &WorkingMemory) -> Result<Vec<CandidateMatch>>;
}

/// Reference matcher: full deterministic re-evaluation.
///
/// Enumerates rules in definition order and, per rule, the cross product
/// of live facts of each pattern slot's type in ascending handle order.
/// Quadratic in the worst case and entirely predictable, which is what the
/// session's signature diffing relies on.
#[derive(Copy, Clone, Debug, Default)]
pub struct NaiveMatcher;

impl Matcher for NaiveMatcher {
    fn candidates(&self, rules: &RuleSet, memory: &WorkingMemory) -> Result<Vec<CandidateMatch>> {
        let mut out = Vec::new();

        for (rule_index, rule) in rules.iter().enumerate() {
            let slots: Vec<Vec<FactHandle>> = rule
                .pattern()
                .iter()
                .map(|ty| memory.handles_by_type(Some(*ty)))
                .collect();

            if slots.iter().any(Vec::is_empty) {
                continue;
            }

            let mut tuple = Vec::with_capacity(slots.len());
            Self::emit_tuples(&slots, &mut tuple, &mut |candidate| {
                let facts = candidate
                    .iter()
                    .map(|&h| memory.get(h).cloned())
                    .collect::<Result<Vec<Fact>>>()?;
                if rule.evaluate(&facts)? {
                    out.push(CandidateMatch {
                        rule_index,
                        tuple: candidate.to_vec(),
                    });
                }
                Ok(())
            })?;
        }

        Ok(out)
    }
}

impl NaiveMatcher {
    /// Walks the cross product of the slot handle lists in order.
    fn emit_tuples(
        slots: &[Vec<FactHandle>],
        prefix: &mut Vec<FactHandle>,
        sink: &mut impl FnMut(&[FactHandle]) -> Result<()>,
    ) -> Result<()> {
        if prefix.len() == slots.len() {
            return sink(prefix);
        }
        for &handle in &slots[prefix.len()] {
            prefix.push(handle);
            Self::emit_tuples(slots, prefix, sink)?;
            prefix.pop();
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
