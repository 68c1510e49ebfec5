//! Error types shared across the hub.

use thiserror::Error;

/// Errors returned by the identity resolver and the Arena State Service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// Arena (or user) does not exist.
    #[error("not found")]
    NotFound,
    /// The user has never joined the arena.
    #[error("user has not joined the arena")]
    NotMember,
    /// The user already holds an active session in the arena.
    #[error("duplicate session")]
    DuplicateSession,
    /// The user is not a facilitator of the arena.
    #[error("user is not a facilitator")]
    NotFacilitator,
    /// The credential did not resolve to a user.
    #[error("unauthorized")]
    Unauthorized,
    /// Input rejected by the state service.
    #[error("invalid: {0}")]
    Invalid(String),
    /// Any other collaborator failure.
    #[error("internal: {0}")]
    Internal(String),
}

/// Errors produced while authorizing or handling one arena event.
#[derive(Debug, Error)]
pub enum EventError {
    /// Owner-only event issued by a non-facilitator.
    #[error("event requires a facilitator")]
    Unauthorized,
    /// The event value could not be interpreted by the handler.
    #[error("invalid event value: {message}")]
    InvalidValue {
        /// What was wrong with the value.
        message: String,
    },
    /// The state service rejected the operation.
    #[error(transparent)]
    State(#[from] StateError),
    /// The handler did not finish within the handler timeout.
    #[error("event handler timed out")]
    Timeout,
}

impl EventError {
    /// Build an [`EventError::InvalidValue`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidValue {
            message: message.into(),
        }
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::InvalidValue { .. } => "invalid_value",
            Self::State(_) => "state",
            Self::Timeout => "timeout",
        }
    }
}

impl From<serde_json::Error> for EventError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn state_error_display() {
        assert_eq!(StateError::DuplicateSession.to_string(), "duplicate session");
        assert_eq!(
            StateError::Internal("db down".into()).to_string(),
            "internal: db down"
        );
    }

    #[test]
    fn state_error_converts_into_event_error() {
        let err: EventError = StateError::NotFound.into();
        assert_matches!(err, EventError::State(StateError::NotFound));
        assert_eq!(err.to_string(), "not found");
        assert_eq!(err.kind(), "state");
    }

    #[test]
    fn json_error_is_invalid_value() {
        let json_err = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();
        let err: EventError = json_err.into();
        assert_matches!(err, EventError::InvalidValue { .. });
        assert_eq!(err.kind(), "invalid_value");
    }
}
