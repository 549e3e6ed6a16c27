//! Agenda event fan-out.
//!
//! One tagged event type and one dispatch method per subscriber, so
//! implementers only handle the variants they care about. Fan-out is
//! synchronous and in registration order; a listener error aborts the fire
//! cycle at the point raised, exactly like an action error. Listeners are
//! process-lifetime only.

use std::sync::Arc;

use flintlock_foundation::{FactHandle, Result};

/// An agenda lifecycle event.
///
/// Every variant names the rule, the activation's sequence number, and the
/// matched tuple.
#[derive(Clone, Debug)]
pub enum AgendaEvent {
    /// A new activation entered the agenda (or the pending set).
    MatchCreated {
        /// Name of the activated rule.
        rule: Arc<str>,
        /// Sequence number of the activation.
        activation: u64,
        /// Matched fact handles.
        tuple: Vec<FactHandle>,
    },
    /// An activation was cancelled because its tuple no longer matches.
    MatchCancelled {
        /// Name of the formerly activated rule.
        rule: Arc<str>,
        /// Sequence number of the activation.
        activation: u64,
        /// Matched fact handles.
        tuple: Vec<FactHandle>,
    },
    /// An activation was dropped at pop time because the rule's date
    /// window does not contain the current instant. Not a cancellation:
    /// no fire notifications follow.
    MatchSkipped {
        /// Name of the skipped rule.
        rule: Arc<str>,
        /// Sequence number of the activation.
        activation: u64,
        /// Matched fact handles.
        tuple: Vec<FactHandle>,
    },
    /// The engine is about to execute the rule's action.
    BeforeFire {
        /// Name of the firing rule.
        rule: Arc<str>,
        /// Sequence number of the activation.
        activation: u64,
        /// Matched fact handles.
        tuple: Vec<FactHandle>,
    },
    /// The rule's action completed.
    AfterFire {
        /// Name of the fired rule.
        rule: Arc<str>,
        /// Sequence number of the activation.
        activation: u64,
        /// Matched fact handles.
        tuple: Vec<FactHandle>,
    },
}

impl AgendaEvent {
    /// Returns the rule name the event concerns.
    #[must_use]
    pub fn rule(&self) -> &str {
        match self {
            Self::MatchCreated { rule, .. }
            | Self::MatchCancelled { rule, .. }
            | Self::MatchSkipped { rule, .. }
            | Self::BeforeFire { rule, .. }
            | Self::AfterFire { rule, .. } => rule,
        }
    }

    /// Returns the activation's sequence number.
    #[must_use]
    pub const fn activation(&self) -> u64 {
        match self {
            Self::MatchCreated { activation, .. }
            | Self::MatchCancelled { activation, .. }
            | Self::MatchSkipped { activation, .. }
            | Self::BeforeFire { activation, .. }
            | Self::AfterFire { activation, .. } => *activation,
        }
    }

    /// Returns the matched tuple.
    #[must_use]
    pub fn tuple(&self) -> &[FactHandle] {
        match self {
            Self::MatchCreated { tuple, .. }
            | Self::MatchCancelled { tuple, .. }
            | Self::MatchSkipped { tuple, .. }
            | Self::BeforeFire { tuple, .. }
            | Self::AfterFire { tuple, .. } => tuple,
        }
    }

    /// Returns a stable name for the event variant.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::MatchCreated { .. } => "match-created",
            Self::MatchCancelled { .. } => "match-cancelled",
            Self::MatchSkipped { .. } => "match-skipped",
            Self::BeforeFire { .. } => "before-fire",
            Self::AfterFire { .. } => "after-fire",
        }
    }
}

/// A subscriber to agenda events.
pub trait AgendaListener: Send {
    /// Handles one event.
    ///
    /// # Errors
    /// Returning an error aborts the fire cycle at the point raised;
    /// listeners are not isolated from the engine or from each other.
    fn on_event(&mut self, event: &AgendaEvent) -> Result<()>;
}

impl<F> AgendaListener for F
where
    F: FnMut(&AgendaEvent) -> Result<()> + Send,
{
    fn on_event(&mut self, event: &AgendaEvent) -> Result<()> {
        self(event)
    }
}

/// Identifier returned by [`ListenerHub::subscribe`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Synchronous event fan-out in registration order.
#[derive(Default)]
pub struct ListenerHub {
    listeners: Vec<(ListenerId, Box<dyn AgendaListener>)>,
    next_id: u64,
}

impl ListenerHub {
    /// Creates an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener, returning its id.
    pub fn subscribe(&mut self, listener: impl AgendaListener + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Removes a listener. Idempotent: unknown ids are ignored.
    pub fn unsubscribe(&mut self, id: ListenerId) {
        self.listeners.retain(|(lid, _)| *lid != id);
    }

    /// Delivers the event to every listener in registration order.
    ///
    /// # Errors
    /// Stops at the first listener error and returns it; later listeners
    /// do not see the event.
    pub fn publish(&mut self, event: &AgendaEvent) -> Result<()> {
        for (_, listener) in &mut self.listeners {
            listener.on_event(event)?;
        }
        Ok(())
    }

    /// Returns the number of subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Returns true if nobody subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
