//! Error types for the Flintlock engine.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.
//! Every error surfaces synchronously to the call that triggered it;
//! the engine never retries on a caller's behalf.

use std::fmt;

use thiserror::Error;

use crate::handle::FactHandle;
use crate::types::Type;

/// Result alias used across the Flintlock crates.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Flintlock operations.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Creates an invalid-handle error.
    #[must_use]
    pub fn invalid_handle(handle: FactHandle) -> Self {
        Self::new(ErrorKind::InvalidHandle(handle))
    }

    /// Creates an unresolved-global error.
    #[must_use]
    pub fn unresolved_global(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnresolvedGlobal { name: name.into() })
    }

    /// Creates a global-type-mismatch error.
    #[must_use]
    pub fn global_type_mismatch(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::GlobalTypeMismatch { name: name.into() })
    }

    /// Wraps a condition, action, or listener failure for the named rule.
    #[must_use]
    pub fn rule_execution(rule: impl Into<String>, cause: Error) -> Self {
        Self::new(ErrorKind::RuleExecution {
            rule: rule.into(),
            cause: Box::new(cause),
        })
    }

    /// Creates an unsupported-clock-mode error.
    #[must_use]
    pub fn unsupported_clock_mode() -> Self {
        Self::new(ErrorKind::UnsupportedClockMode)
    }

    /// Creates a session-disposed error.
    #[must_use]
    pub fn session_disposed() -> Self {
        Self::new(ErrorKind::SessionDisposed)
    }

    /// Creates a duplicate-rule error.
    #[must_use]
    pub fn duplicate_rule(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::DuplicateRule { name: name.into() })
    }

    /// Creates a type mismatch error.
    #[must_use]
    pub fn type_mismatch(expected: Type, actual: Type) -> Self {
        Self::new(ErrorKind::TypeMismatch { expected, actual })
    }

    /// Creates an activation-limit error (configured kill switch tripped).
    #[must_use]
    pub fn activation_limit(limit: usize) -> Self {
        Self::new(ErrorKind::ActivationLimitExceeded { limit })
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal(message.into()))
    }

    /// Returns true if this error (or, for a rule-execution wrapper, its
    /// cause) is an unresolved-global failure.
    #[must_use]
    pub fn is_unresolved_global(&self) -> bool {
        match &self.kind {
            ErrorKind::UnresolvedGlobal { .. } => true,
            ErrorKind::RuleExecution { cause, .. } => cause.is_unresolved_global(),
            _ => false,
        }
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// Operation referenced an unknown or already-retracted fact handle.
    #[error("invalid fact handle: {0}")]
    InvalidHandle(FactHandle),

    /// A rule referenced a global binding that was never supplied.
    #[error("unresolved global: {name}")]
    UnresolvedGlobal {
        /// Name of the missing global.
        name: String,
    },

    /// A supplied global binding has the wrong type.
    #[error("global has unexpected type: {name}")]
    GlobalTypeMismatch {
        /// Name of the mistyped global.
        name: String,
    },

    /// A rule's condition, action, or a listener raised during firing.
    ///
    /// Working memory is left in its partially-mutated state; there is
    /// no rollback.
    #[error("rule '{rule}' failed: {cause}")]
    RuleExecution {
        /// Name of the rule that was firing.
        rule: String,
        /// The underlying failure.
        #[source]
        cause: Box<Error>,
    },

    /// A pseudo-clock operation was requested on a realtime session.
    #[error("clock does not support manual time control")]
    UnsupportedClockMode,

    /// Operation on a session that has been disposed.
    #[error("session has been disposed")]
    SessionDisposed,

    /// A rule set was built with two rules of the same name.
    #[error("duplicate rule name: {name}")]
    DuplicateRule {
        /// The repeated rule name.
        name: String,
    },

    /// Type mismatch in a typed value accessor.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The expected type.
        expected: Type,
        /// The actual type encountered.
        actual: Type,
    },

    /// The configured activation kill switch tripped.
    #[error("activation limit ({limit}) exceeded")]
    ActivationLimitExceeded {
        /// The configured limit.
        limit: usize,
    },

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Rule being fired, if any.
    pub rule: Option<String>,
    /// Free-form detail about the failing operation.
    pub detail: Option<String>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the rule name.
    #[must_use]
    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }

    /// Sets the detail string.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(rule) = &self.rule {
            write!(f, "in rule {rule}")?;
        }
        if let Some(detail) = &self.detail {
            if self.rule.is_some() {
                write!(f, ": ")?;
            }
            write!(f, "{detail}")?;
        }
        Ok(())
    }
}
