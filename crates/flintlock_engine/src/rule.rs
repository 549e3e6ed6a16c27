//! Compiled rule definitions.
//!
//! Rules arrive pre-compiled: conditions and actions are opaque
//! capabilities supplied by the caller (or an external rule compiler).
//! The engine never inspects their internals, only invokes them.

use std::fmt;
use std::sync::Arc;

use flintlock_foundation::{Error, KeywordId, Result, TimeDelta, Timestamp};
use flintlock_store::Fact;

use crate::session::RuleContext;

/// Opaque predicate capability over a candidate fact tuple.
///
/// Receives the tuple's facts in pattern-slot order.
pub type Condition = Arc<dyn Fn(&[Fact]) -> Result<bool> + Send + Sync>;

/// Opaque side-effecting capability invoked on fire.
///
/// Receives a mutation handle to working memory plus the matched tuple
/// and the session's global bindings.
pub type Action = Arc<dyn Fn(&mut RuleContext<'_>) -> Result<()> + Send + Sync>;

// =============================================================================
// Rule
// =============================================================================

/// An immutable, compiled rule definition.
#[derive(Clone)]
pub struct Rule {
    name: Arc<str>,
    salience: i32,
    no_loop: bool,
    date_effective: Option<Timestamp>,
    date_expires: Option<Timestamp>,
    duration: Option<TimeDelta>,
    pattern: Vec<KeywordId>,
    globals: Vec<String>,
    condition: Condition,
    action: Action,
}

impl Rule {
    /// Creates a new rule binding one fact per pattern slot.
    ///
    /// The default condition always holds (a bare type match) and the
    /// default action does nothing. Salience defaults to 0, no-loop to
    /// false, and the temporal attributes to unset.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>, pattern: impl Into<Vec<KeywordId>>) -> Self {
        Self {
            name: name.into(),
            salience: 0,
            no_loop: false,
            date_effective: None,
            date_expires: None,
            duration: None,
            pattern: pattern.into(),
            globals: Vec::new(),
            condition: Arc::new(|_| Ok(true)),
            action: Arc::new(|_| Ok(())),
        }
    }

    /// Sets the condition evaluated against each candidate tuple.
    #[must_use]
    pub fn when<F>(mut self, condition: F) -> Self
    where
        F: Fn(&[Fact]) -> Result<bool> + Send + Sync + 'static,
    {
        self.condition = Arc::new(condition);
        self
    }

    /// Sets the action executed when an activation fires.
    #[must_use]
    pub fn then<F>(mut self, action: F) -> Self
    where
        F: Fn(&mut RuleContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.action = Arc::new(action);
        self
    }

    /// Sets the salience (priority). Higher fires first.
    #[must_use]
    pub fn with_salience(mut self, salience: i32) -> Self {
        self.salience = salience;
        self
    }

    /// Sets the no-loop flag.
    ///
    /// When set, an update performed by this rule's own action does not
    /// re-trigger the rule for the same original tuple.
    #[must_use]
    pub fn with_no_loop(mut self, no_loop: bool) -> Self {
        self.no_loop = no_loop;
        self
    }

    /// Sets the instant from which the rule is eligible to fire.
    #[must_use]
    pub fn with_date_effective(mut self, instant: Timestamp) -> Self {
        self.date_effective = Some(instant);
        self
    }

    /// Sets the instant from which the rule is no longer eligible.
    #[must_use]
    pub fn with_date_expires(mut self, instant: Timestamp) -> Self {
        self.date_expires = Some(instant);
        self
    }

    /// Sets the delay before an activation of this rule may fire.
    #[must_use]
    pub fn with_duration(mut self, duration: TimeDelta) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Declares the global bindings this rule references.
    ///
    /// Declared globals are validated before the session's first fire.
    #[must_use]
    pub fn with_globals<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.globals = names.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the rule name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    /// Returns the salience.
    #[must_use]
    pub const fn salience(&self) -> i32 {
        self.salience
    }

    /// Returns the no-loop flag.
    #[must_use]
    pub const fn no_loop(&self) -> bool {
        self.no_loop
    }

    /// Returns the effective-from instant, if set.
    #[must_use]
    pub const fn date_effective(&self) -> Option<Timestamp> {
        self.date_effective
    }

    /// Returns the expiry instant, if set.
    #[must_use]
    pub const fn date_expires(&self) -> Option<Timestamp> {
        self.date_expires
    }

    /// Returns the activation delay, if set.
    #[must_use]
    pub const fn duration(&self) -> Option<TimeDelta> {
        self.duration
    }

    /// Returns the fact types bound by the rule, one per tuple slot.
    #[must_use]
    pub fn pattern(&self) -> &[KeywordId] {
        &self.pattern
    }

    /// Returns the declared global names.
    #[must_use]
    pub fn globals(&self) -> &[String] {
        &self.globals
    }

    /// Returns true if the date window contains the given instant.
    ///
    /// The window is `[date_effective, date_expires)`; an unset bound is
    /// open.
    #[must_use]
    pub fn window_contains(&self, now: Timestamp) -> bool {
        self.date_effective.is_none_or(|eff| now >= eff)
            && self.date_expires.is_none_or(|exp| now < exp)
    }

    /// Evaluates the condition against a candidate tuple.
    ///
    /// # Errors
    /// A condition failure surfaces as a rule-execution error naming this
    /// rule.
    pub fn evaluate(&self, facts: &[Fact]) -> Result<bool> {
        (self.condition)(facts).map_err(|e| Error::rule_execution(self.name.as_ref(), e))
    }

    /// Runs the action against a firing context.
    ///
    /// Failures surface as rule-execution errors naming this rule, except
    /// unresolved-global failures, which surface as themselves.
    pub(crate) fn run_action(&self, ctx: &mut RuleContext<'_>) -> Result<()> {
        (self.action)(ctx).map_err(|e| {
            if e.is_unresolved_global() {
                e
            } else {
                Error::rule_execution(self.name.as_ref(), e)
            }
        })
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("salience", &self.salience)
            .field("no_loop", &self.no_loop)
            .field("date_effective", &self.date_effective)
            .field("date_expires", &self.date_expires)
            .field("duration", &self.duration)
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Rule Set
// =============================================================================

/// An ordered, immutable collection of rules with unique names.
///
/// Iteration order is the deterministic tie-break source when several
/// rules activate in the same re-match pass.
#[derive(Clone, Debug, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Creates an empty rule set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns this rule set with the rule appended.
    ///
    /// # Errors
    /// Fails with a duplicate-rule error if a rule of the same name is
    /// already present.
    pub fn with_rule(mut self, rule: Rule) -> Result<Self> {
        if self.rules.iter().any(|r| r.name() == rule.name()) {
            return Err(Error::duplicate_rule(rule.name()));
        }
        self.rules.push(rule);
        Ok(self)
    }

    /// Returns the number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if the rule set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Gets a rule by index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Rule> {
        self.rules.get(index)
    }

    /// Finds a rule by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name() == name)
    }

    /// Returns an iterator over the rules in definition order.
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }
}

// =============================================================================
// Tests
// =============================================================================
