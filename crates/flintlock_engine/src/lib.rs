//! Rule engine core for Flintlock.
//!
//! This crate provides:
//! - [`Rule`] / [`RuleSet`] - Compiled rule definitions with salience and
//!   temporal attributes
//! - [`Matcher`] - Pluggable candidate-match discovery
//! - [`Agenda`] - Salience-ordered conflict resolution with a pending set
//!   for duration-gated activations
//! - [`SessionClock`] - Wall-clock or manually advanced pseudo-clock
//! - [`ListenerHub`] - Synchronous agenda event fan-out
//! - [`Session`] / [`StatelessSession`] - The fire-cycle orchestrators

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod agenda;
pub mod clock;
pub mod event;
pub mod matcher;
pub mod rule;
pub mod session;

pub use agenda::{Activation, Agenda, refraction_signature};
pub use clock::SessionClock;
pub use event::{AgendaEvent, AgendaListener, ListenerHub, ListenerId};
pub use matcher::{CandidateMatch, Matcher, NaiveMatcher};
pub use rule::{Action, Condition, Rule, RuleSet};
pub use session::{ClockMode, Global, RuleContext, Session, SessionConfig, StatelessSession};
