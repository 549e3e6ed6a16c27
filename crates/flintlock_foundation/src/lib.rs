//! Core types, values, and persistent collections for Flintlock.
//!
//! This crate provides:
//! - [`Value`] - The field value type for facts
//! - [`FactHandle`] - Monotonic working-memory handles
//! - [`KeywordId`] - Interned fact-type tags and field names
//! - [`Type`] - Type descriptors for value access errors
//! - [`Error`] - Rich error types with context
//! - Persistent collections ([`FlVec`], [`FlMap`])

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod collections;
pub mod error;
pub mod handle;
pub mod intern;
pub mod time;
pub mod types;
pub mod value;

pub use collections::{FlMap, FlVec};
pub use error::{Error, ErrorContext, ErrorKind, Result};
pub use handle::FactHandle;
pub use intern::{Interner, KeywordId};
pub use time::{TimeDelta, Timestamp, pseudo_epoch};
pub use types::Type;
pub use value::Value;
