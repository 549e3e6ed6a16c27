//! Flintlock - Production rule engine
//!
//! This crate re-exports all layers of the Flintlock system for convenient
//! access. For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 2: flintlock_engine     — Rules, matching, agenda, clock, sessions
//! Layer 1: flintlock_store      — Typed facts, working memory
//! Layer 0: flintlock_foundation — Core types (Value, FactHandle, Error)
//! ```

pub use flintlock_engine as engine;
pub use flintlock_foundation as foundation;
pub use flintlock_store as store;
