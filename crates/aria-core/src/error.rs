//! Unified error types for the dispatch core.
//!
//! Two families live here:
//!
//! - [`HandlerError`] — a structured runtime failure raised *inside* a skill
//!   handler. These are contained at the dispatch-wrapper / fallback-chain
//!   boundary, logged with the owner's identity, and never propagated to the
//!   bus or to sibling handlers.
//! - [`SkillError`] — a registration-time failure raised synchronously to the
//!   caller (typically aborting that skill's load).

use thiserror::Error;

use crate::intent::IntentError;

// =============================================================================
// Handler runtime failures
// =============================================================================

/// A structured failure value produced by a skill handler.
///
/// Carries a human-readable message and an optional wrapped cause, replacing
/// ad-hoc exception inspection with a deterministic, typed value.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
    #[source]
    cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl HandlerError {
    /// Creates an error from a message alone.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    /// Creates an error wrapping an underlying cause.
    pub fn with_cause(
        message: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }

    /// The failure message, as carried on `handler.complete` lifecycle events.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Result type for intent handlers.
pub type HandlerResult = Result<(), HandlerError>;

// =============================================================================
// Registration failures
// =============================================================================

/// Errors raised synchronously while a skill registers its handlers.
#[derive(Debug, Error)]
pub enum SkillError {
    /// The intent specification failed validation.
    #[error("invalid intent specification: {0}")]
    InvalidIntent(#[from] IntentError),

    /// The skill already has a handler under this event name.
    #[error("event '{0}' is already registered")]
    DuplicateEvent(String),

    /// The skill already registered an intent under this local name.
    #[error("intent '{0}' is already registered")]
    DuplicateIntent(String),
}

/// Result type for skill registration operations.
pub type SkillResult<T> = Result<T, SkillError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn handler_error_exposes_message_and_cause() {
        let io = std::io::Error::other("disk on fire");
        let err = HandlerError::with_cause("could not load forecast", io);

        assert_eq!(err.message(), "could not load forecast");
        assert_eq!(err.source().unwrap().to_string(), "disk on fire");
    }

    #[test]
    fn skill_error_wraps_intent_validation() {
        let err = SkillError::from(IntentError::EmptyName);
        assert!(matches!(err, SkillError::InvalidIntent(_)));
    }
}
