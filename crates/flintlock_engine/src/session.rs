//! Sessions: the rule executors.
//!
//! A stateful [`Session`] keeps facts across explicit
//! `insert`/`fire_all_rules`/`retract`/`update` calls until disposed. A
//! [`StatelessSession`] runs one atomic execute per call: insert all
//! facts, fire to exhaustion, tear down, with no external access to the
//! intermediate state.
//!
//! One logical session supports at most one in-flight fire cycle. Every
//! operation serializes behind the session's exclusive-execution lock;
//! `dispose` is the exception, callable concurrently, and stops an
//! in-flight cycle at its next loop check. The engine imposes no implicit
//! iteration cap: a rule whose action keeps re-satisfying its own
//! condition with no-loop disabled is a caller-visible unbounded fire
//! cycle unless `max_activations` is configured.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use flintlock_foundation::{
    Error, ErrorContext, FactHandle, KeywordId, Result, TimeDelta, Timestamp,
};
use flintlock_store::{Fact, WorkingMemory};

use crate::agenda::{Activation, Agenda, refraction_signature};
use crate::clock::SessionClock;
use crate::event::{AgendaEvent, AgendaListener, ListenerHub, ListenerId};
use crate::matcher::{Matcher, NaiveMatcher};
use crate::rule::{Rule, RuleSet};

/// A named value injected into the session and available to rule actions.
pub type Global = Arc<dyn Any + Send + Sync>;

// =============================================================================
// Configuration
// =============================================================================

/// Which time source a session uses.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ClockMode {
    /// Wall-clock time.
    #[default]
    Realtime,
    /// Manually advanced pseudo-clock.
    Pseudo,
}

/// Session construction options.
#[derive(Clone, Debug, Default)]
pub struct SessionConfig {
    clock: ClockMode,
    max_activations: Option<usize>,
}

impl SessionConfig {
    /// Creates the default configuration: realtime clock, no activation
    /// cap.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a manually advanced pseudo-clock.
    #[must_use]
    pub fn with_pseudo_clock(mut self) -> Self {
        self.clock = ClockMode::Pseudo;
        self
    }

    /// Caps the number of rule firings per fire cycle.
    ///
    /// Without a cap the engine lets self-reinforcing rules loop forever.
    #[must_use]
    pub fn with_max_activations(mut self, max: usize) -> Self {
        self.max_activations = Some(max);
        self
    }

    /// Returns the configured clock mode.
    #[must_use]
    pub const fn clock_mode(&self) -> ClockMode {
        self.clock
    }

    /// Returns the configured activation cap, if any.
    #[must_use]
    pub const fn max_activations(&self) -> Option<usize> {
        self.max_activations
    }
}

// =============================================================================
// Rule Context
// =============================================================================

/// Mutation handle passed to a firing rule's action.
///
/// Gives the action its matched tuple, insert/update/retract access to
/// working memory, and lookup of session globals. Updates made through the
/// context are tagged with the firing rule so no-loop suppression can tell
/// self-inflicted re-matches from external ones.
pub struct RuleContext<'a> {
    memory: &'a mut WorkingMemory,
    globals: &'a HashMap<String, Global>,
    tuple: &'a [FactHandle],
    facts: &'a [Fact],
    updated: Vec<FactHandle>,
}

impl RuleContext<'_> {
    /// Returns the matched fact for a pattern slot.
    ///
    /// # Errors
    /// Fails with an internal error if the slot index is out of range.
    pub fn fact(&self, slot: usize) -> Result<&Fact> {
        self.facts
            .get(slot)
            .ok_or_else(|| Error::internal(format!("tuple slot {slot} out of range")))
    }

    /// Returns the handle for a pattern slot.
    ///
    /// # Errors
    /// Fails with an internal error if the slot index is out of range.
    pub fn handle(&self, slot: usize) -> Result<FactHandle> {
        self.tuple
            .get(slot)
            .copied()
            .ok_or_else(|| Error::internal(format!("tuple slot {slot} out of range")))
    }

    /// Returns the matched tuple's handles.
    #[must_use]
    pub fn tuple(&self) -> &[FactHandle] {
        self.tuple
    }

    /// Inserts a new fact into working memory.
    pub fn insert(&mut self, fact: Fact) -> FactHandle {
        self.memory.insert(fact)
    }

    /// Replaces the fact behind a handle.
    ///
    /// # Errors
    /// Fails with an invalid-handle error if the handle is unknown or
    /// retracted.
    pub fn update(&mut self, handle: FactHandle, fact: Fact) -> Result<()> {
        self.memory.update(handle, fact)?;
        self.updated.push(handle);
        Ok(())
    }

    /// Replaces the fact matched at a pattern slot.
    ///
    /// # Errors
    /// Fails if the slot is out of range or the fact was retracted.
    pub fn update_slot(&mut self, slot: usize, fact: Fact) -> Result<()> {
        let handle = self.handle(slot)?;
        self.update(handle, fact)
    }

    /// Retracts a fact from working memory.
    ///
    /// # Errors
    /// Fails with an invalid-handle error if the handle is unknown or
    /// already retracted.
    pub fn retract(&mut self, handle: FactHandle) -> Result<Fact> {
        self.memory.retract(handle)
    }

    /// Looks up a session global by name, downcast to its concrete type.
    ///
    /// # Errors
    /// Fails with an unresolved-global error if the name was never
    /// supplied, or a global-type-mismatch error if the downcast fails.
    pub fn global<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        let value = self
            .globals
            .get(name)
            .ok_or_else(|| Error::unresolved_global(name))?;
        Arc::clone(value)
            .downcast::<T>()
            .map_err(|_| Error::global_type_mismatch(name))
    }
}

// =============================================================================
// Session State
// =============================================================================

/// Everything behind the session's exclusive-execution lock.
struct SessionState {
    rules: Arc<RuleSet>,
    matcher: Box<dyn Matcher>,
    memory: WorkingMemory,
    agenda: Agenda,
    clock: SessionClock,
    hub: Arc<Mutex<ListenerHub>>,
    globals: HashMap<String, Global>,
    fired: HashSet<u64>,
}

fn lock_hub(hub: &Arc<Mutex<ListenerHub>>) -> MutexGuard<'_, ListenerHub> {
    hub.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionState {
    fn publish(&self, event: &AgendaEvent) -> Result<()> {
        lock_hub(&self.hub).publish(event)
    }

    fn publish_for(&self, activation: &Activation, make: fn(Arc<str>, u64, Vec<FactHandle>) -> AgendaEvent) -> Result<()> {
        self.publish(&make(
            activation.rule_name_arc(),
            activation.id(),
            activation.tuple().to_vec(),
        ))
    }

    /// Re-runs the matcher and diffs the result against the live
    /// activations: cancels those whose tuple no longer matches, creates
    /// activations for new tuples not already active and not refracted.
    fn refresh_matches(&mut self) -> Result<()> {
        let rules = Arc::clone(&self.rules);
        let candidates = self.matcher.candidates(&rules, &self.memory)?;

        let mut desired = Vec::with_capacity(candidates.len());
        let mut desired_sigs = HashSet::with_capacity(candidates.len());
        for candidate in candidates {
            let mut versioned = Vec::with_capacity(candidate.tuple.len());
            for &handle in &candidate.tuple {
                versioned.push((handle, self.memory.version(handle)?));
            }
            let signature = refraction_signature(candidate.rule_index, &versioned);
            desired_sigs.insert(signature);
            desired.push((signature, candidate));
        }

        let stale: Vec<u64> = self
            .agenda
            .signatures()
            .filter(|(sig, _)| !desired_sigs.contains(sig))
            .map(|(_, id)| id)
            .collect();
        for id in stale {
            if let Some(activation) = self.agenda.cancel(id) {
                self.publish_for(&activation, |rule, activation, tuple| {
                    AgendaEvent::MatchCancelled {
                        rule,
                        activation,
                        tuple,
                    }
                })?;
            }
        }

        let now = self.clock.now();
        for (signature, candidate) in desired {
            if self.fired.contains(&signature) || self.agenda.contains_signature(signature) {
                continue;
            }
            let rule = rules
                .get(candidate.rule_index)
                .ok_or_else(|| Error::internal("candidate references unknown rule"))?;
            let activation = self.agenda.activate(
                candidate.rule_index,
                rule.name_arc(),
                rule.salience(),
                candidate.tuple,
                signature,
                now,
                rule.duration(),
            );
            self.publish_for(&activation, |rule, activation, tuple| {
                AgendaEvent::MatchCreated {
                    rule,
                    activation,
                    tuple,
                }
            })?;
        }
        Ok(())
    }

    /// Checks that every global declared by a rule was supplied.
    fn validate_globals(&self) -> Result<()> {
        for rule in self.rules.iter() {
            for name in rule.globals() {
                if !self.globals.contains_key(name) {
                    return Err(Error::unresolved_global(name.clone())
                        .with_context(ErrorContext::new().with_rule(rule.name())));
                }
            }
        }
        Ok(())
    }

    /// Executes one activation's action, returning the handles it updated.
    fn run_action(&mut self, rule: &Rule, activation: &Activation) -> Result<Vec<FactHandle>> {
        let mut facts = Vec::with_capacity(activation.tuple().len());
        for &handle in activation.tuple() {
            facts.push(self.memory.get(handle)?.clone());
        }

        let mut ctx = RuleContext {
            memory: &mut self.memory,
            globals: &self.globals,
            tuple: activation.tuple(),
            facts: &facts,
            updated: Vec::new(),
        };
        rule.run_action(&mut ctx)?;
        Ok(ctx.updated)
    }

    /// Signature of the tuple at its current fact versions, if every fact
    /// is still live.
    fn current_signature(&self, rule_index: usize, tuple: &[FactHandle]) -> Option<u64> {
        let mut versioned = Vec::with_capacity(tuple.len());
        for &handle in tuple {
            versioned.push((handle, self.memory.version(handle).ok()?));
        }
        Some(refraction_signature(rule_index, &versioned))
    }

    /// The fire cycle: pop, gate, fire, re-match, repeat.
    fn fire_cycle(&mut self, cancelled: &AtomicBool, max: Option<usize>) -> Result<usize> {
        self.validate_globals()?;
        let rules = Arc::clone(&self.rules);
        let mut fired = 0usize;

        loop {
            if cancelled.load(Ordering::SeqCst) {
                self.teardown();
                break;
            }

            let now = self.clock.now();
            self.agenda.promote(now);
            let Some(activation) = self.agenda.pop_highest() else {
                break;
            };
            let rule = rules
                .get(activation.rule_index())
                .ok_or_else(|| Error::internal("activation references unknown rule"))?;

            // Temporal window gate: outside [effective, expires) the
            // activation is dropped silently, with neither cancel nor
            // fire notifications.
            if !rule.window_contains(now) {
                self.publish_for(&activation, |rule, activation, tuple| {
                    AgendaEvent::MatchSkipped {
                        rule,
                        activation,
                        tuple,
                    }
                })?;
                continue;
            }

            if let Some(limit) = max {
                if fired >= limit {
                    return Err(Error::activation_limit(limit));
                }
            }

            self.publish_for(&activation, |rule, activation, tuple| {
                AgendaEvent::BeforeFire {
                    rule,
                    activation,
                    tuple,
                }
            })?;

            // Refraction: this exact match never re-activates.
            self.fired.insert(activation.signature());

            let updated = self.run_action(rule, &activation)?;

            // No-loop: suppress the re-match this action inflicted on its
            // own tuple. Other rules still see the update normally.
            if rule.no_loop() && updated.iter().any(|h| activation.tuple().contains(h)) {
                if let Some(signature) =
                    self.current_signature(activation.rule_index(), activation.tuple())
                {
                    self.fired.insert(signature);
                }
            }

            self.publish_for(&activation, |rule, activation, tuple| {
                AgendaEvent::AfterFire {
                    rule,
                    activation,
                    tuple,
                }
            })?;

            self.refresh_matches()?;
            fired += 1;
        }

        Ok(fired)
    }

    /// Drops working memory, the agenda, and session bindings.
    fn teardown(&mut self) {
        self.memory.clear();
        self.agenda.clear();
        self.fired.clear();
        self.globals.clear();
    }
}

// =============================================================================
// Stateful Session
// =============================================================================

struct SessionShared {
    state: Mutex<SessionState>,
    cancelled: AtomicBool,
    max_activations: Option<usize>,
}

/// A stateful rule session.
///
/// Facts persist across explicit calls until [`Session::dispose`].
/// The handle is cheap to clone; clones refer to the same session, which
/// is how another thread gets to dispose a session stuck in an unbounded
/// fire cycle.
#[derive(Clone)]
pub struct Session {
    shared: Arc<SessionShared>,
}

impl Session {
    /// Creates a session over the given rules with the reference matcher.
    #[must_use]
    pub fn new(rules: RuleSet, config: &SessionConfig) -> Self {
        Self::with_matcher(rules, config, NaiveMatcher)
    }

    /// Creates a session with a caller-supplied matcher.
    #[must_use]
    pub fn with_matcher(
        rules: RuleSet,
        config: &SessionConfig,
        matcher: impl Matcher + 'static,
    ) -> Self {
        Self::from_parts(
            Arc::new(rules),
            config,
            Box::new(matcher),
            Arc::new(Mutex::new(ListenerHub::new())),
            HashMap::new(),
        )
    }

    fn from_parts(
        rules: Arc<RuleSet>,
        config: &SessionConfig,
        matcher: Box<dyn Matcher>,
        hub: Arc<Mutex<ListenerHub>>,
        globals: HashMap<String, Global>,
    ) -> Self {
        let clock = match config.clock_mode() {
            ClockMode::Realtime => SessionClock::realtime(),
            ClockMode::Pseudo => SessionClock::pseudo(),
        };
        Self {
            shared: Arc::new(SessionShared {
                state: Mutex::new(SessionState {
                    rules,
                    matcher,
                    memory: WorkingMemory::new(),
                    agenda: Agenda::new(),
                    clock,
                    hub,
                    globals,
                    fired: HashSet::new(),
                }),
                cancelled: AtomicBool::new(false),
                max_activations: config.max_activations(),
            }),
        }
    }

    /// Acquires the exclusive-execution lock, failing if disposed.
    fn guard(&self) -> Result<MutexGuard<'_, SessionState>> {
        if self.is_disposed() {
            return Err(Error::session_disposed());
        }
        let state = self
            .shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Dispose may have won the race while we waited on the lock.
        if self.is_disposed() {
            return Err(Error::session_disposed());
        }
        Ok(state)
    }

    /// Inserts a fact, re-matching affected rules eagerly.
    ///
    /// # Errors
    /// Fails if the session is disposed, or propagates a condition or
    /// listener failure raised during re-matching.
    pub fn insert(&self, fact: Fact) -> Result<FactHandle> {
        let mut state = self.guard()?;
        let handle = state.memory.insert(fact);
        state.refresh_matches()?;
        Ok(handle)
    }

    /// Replaces the fact behind a handle and re-matches.
    ///
    /// Activations whose tuple no longer matches are cancelled; matching
    /// tuples re-activate fresh (the update counter makes them new
    /// matches).
    ///
    /// # Errors
    /// Fails with an invalid-handle error for unknown/retracted handles,
    /// or if the session is disposed.
    pub fn update(&self, handle: FactHandle, fact: Fact) -> Result<()> {
        let mut state = self.guard()?;
        state.memory.update(handle, fact)?;
        state.refresh_matches()
    }

    /// Retracts a fact, cancelling every activation (agenda-resident or
    /// pending) whose tuple references it.
    ///
    /// # Errors
    /// Fails with an invalid-handle error for unknown/retracted handles,
    /// or if the session is disposed.
    pub fn retract(&self, handle: FactHandle) -> Result<Fact> {
        let mut state = self.guard()?;
        let fact = state.memory.retract(handle)?;
        state.refresh_matches()?;
        Ok(fact)
    }

    /// Runs the fire cycle until the agenda is exhausted or the session is
    /// disposed. Returns the number of rules fired.
    ///
    /// # Errors
    /// Surfaces rule-execution, unresolved-global, listener, and
    /// activation-limit failures. Working memory keeps any mutations made
    /// before the failure; there is no rollback.
    pub fn fire_all_rules(&self) -> Result<usize> {
        let mut state = self.guard()?;
        state.fire_cycle(&self.shared.cancelled, self.shared.max_activations)
    }

    /// Returns a copy of the fact behind a handle.
    ///
    /// # Errors
    /// Fails with an invalid-handle error for unknown/retracted handles,
    /// or if the session is disposed.
    pub fn fact(&self, handle: FactHandle) -> Result<Fact> {
        let state = self.guard()?;
        state.memory.get(handle).cloned()
    }

    /// Returns the handles of live facts, optionally filtered by type, in
    /// insertion order.
    ///
    /// # Errors
    /// Fails if the session is disposed.
    pub fn fact_handles(&self, fact_type: Option<KeywordId>) -> Result<Vec<FactHandle>> {
        let state = self.guard()?;
        Ok(state.memory.handles_by_type(fact_type))
    }

    /// Returns the number of live facts.
    ///
    /// # Errors
    /// Fails if the session is disposed.
    pub fn fact_count(&self) -> Result<usize> {
        let state = self.guard()?;
        Ok(state.memory.len())
    }

    /// Supplies a named global binding.
    ///
    /// Globals referenced by rules must be supplied before the first fire.
    ///
    /// # Errors
    /// Fails if the session is disposed.
    pub fn set_global(&self, name: impl Into<String>, value: Global) -> Result<()> {
        let mut state = self.guard()?;
        state.globals.insert(name.into(), value);
        Ok(())
    }

    /// Subscribes an agenda listener.
    ///
    /// # Errors
    /// Fails if the session is disposed.
    pub fn add_listener(&self, listener: impl AgendaListener + 'static) -> Result<ListenerId> {
        let state = self.guard()?;
        Ok(lock_hub(&state.hub).subscribe(listener))
    }

    /// Unsubscribes a listener. Idempotent.
    ///
    /// # Errors
    /// Fails if the session is disposed.
    pub fn remove_listener(&self, id: ListenerId) -> Result<()> {
        let state = self.guard()?;
        lock_hub(&state.hub).unsubscribe(id);
        Ok(())
    }

    /// Advances the pseudo-clock, promoting any pending activation whose
    /// eligibility time is reached. Does not fire rules.
    ///
    /// # Errors
    /// Fails with an unsupported-clock-mode error on a realtime session,
    /// or if the session is disposed.
    pub fn advance_time(&self, delta: TimeDelta) -> Result<Timestamp> {
        let mut state = self.guard()?;
        let now = state.clock.advance(delta)?;
        state.agenda.promote(now);
        Ok(now)
    }

    /// Returns the session clock's current instant.
    ///
    /// # Errors
    /// Fails if the session is disposed.
    pub fn now(&self) -> Result<Timestamp> {
        let state = self.guard()?;
        Ok(state.clock.now())
    }

    /// Disposes the session.
    ///
    /// Idempotent and safe to call from any thread, including while a
    /// fire cycle is in flight on another: the cycle observes the flag at
    /// its next loop check and stops. Every later operation fails with a
    /// session-disposed error.
    pub fn dispose(&self) {
        self.shared.cancelled.store(true, Ordering::SeqCst);
        // If no cycle holds the lock, tear down now; otherwise the cycle
        // tears down when it observes the flag.
        if let Ok(mut state) = self.shared.state.try_lock() {
            state.teardown();
        }
    }

    /// Returns true once the session has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.shared.cancelled.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Stateless Session
// =============================================================================

/// A stateless rule session.
///
/// Each [`execute`](StatelessSession::execute) builds fresh working
/// memory, inserts the given facts, fires to exhaustion, and tears
/// everything down before returning: no caller-visible handle to the
/// intermediate state exists. Globals and listeners are shared across
/// executes, so the session is reusable.
pub struct StatelessSession {
    rules: Arc<RuleSet>,
    config: SessionConfig,
    hub: Arc<Mutex<ListenerHub>>,
    globals: Mutex<HashMap<String, Global>>,
}

impl StatelessSession {
    /// Creates a stateless session over the given rules.
    #[must_use]
    pub fn new(rules: RuleSet, config: &SessionConfig) -> Self {
        Self {
            rules: Arc::new(rules),
            config: config.clone(),
            hub: Arc::new(Mutex::new(ListenerHub::new())),
            globals: Mutex::new(HashMap::new()),
        }
    }

    /// Supplies a named global binding for every later execute.
    pub fn set_global(&self, name: impl Into<String>, value: Global) {
        self.globals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), value);
    }

    /// Subscribes an agenda listener for every later execute.
    pub fn add_listener(&self, listener: impl AgendaListener + 'static) -> ListenerId {
        lock_hub(&self.hub).subscribe(listener)
    }

    /// Unsubscribes a listener. Idempotent.
    pub fn remove_listener(&self, id: ListenerId) {
        lock_hub(&self.hub).unsubscribe(id);
    }

    /// Atomically inserts the facts and fires all rules to exhaustion.
    /// Returns the number of rules fired.
    ///
    /// # Errors
    /// Surfaces the same failures as [`Session::fire_all_rules`]. The
    /// internal session is torn down either way.
    pub fn execute<I>(&self, facts: I) -> Result<usize>
    where
        I: IntoIterator<Item = Fact>,
    {
        let globals = self
            .globals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let session = Session::from_parts(
            Arc::clone(&self.rules),
            &self.config,
            Box::new(NaiveMatcher),
            Arc::clone(&self.hub),
            globals,
        );

        let result = (|| {
            for fact in facts {
                session.insert(fact)?;
            }
            session.fire_all_rules()
        })();

        session.dispose();
        result
    }
}

// =============================================================================
// Tests
// =============================================================================
