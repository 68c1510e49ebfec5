//! WebSocket close codes emitted by the hub.
//!
//! Admission failures and forced closures end the connection with one of
//! these application-range codes. A normal peer-initiated disconnect sends
//! no special code.

/// Application close code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CloseCode {
    /// Identity could not be resolved (also used when join-code attempts run out).
    Unauthorized,
    /// A handler forced the connection closed (the user abandoned the arena).
    Abandoned,
    /// The user already holds an active session elsewhere.
    DuplicateSession,
    /// The arena does not exist.
    NotFound,
    /// Unexpected collaborator failure.
    Internal,
}

impl CloseCode {
    /// Numeric wire value.
    pub fn code(self) -> u16 {
        match self {
            Self::Unauthorized => 4001,
            Self::Abandoned => 4002,
            Self::DuplicateSession => 4003,
            Self::NotFound => 4004,
            Self::Internal => 4005,
        }
    }

    /// Close reason text sent alongside the code.
    pub fn reason(self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Abandoned => "abandoned",
            Self::DuplicateSession => "duplicate session",
            Self::NotFound => "not found",
            Self::Internal => "internal error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_values() {
        assert_eq!(CloseCode::Unauthorized.code(), 4001);
        assert_eq!(CloseCode::Abandoned.code(), 4002);
        assert_eq!(CloseCode::DuplicateSession.code(), 4003);
        assert_eq!(CloseCode::NotFound.code(), 4004);
        assert_eq!(CloseCode::Internal.code(), 4005);
    }

    #[test]
    fn reasons() {
        assert_eq!(CloseCode::Abandoned.reason(), "abandoned");
        assert_eq!(CloseCode::DuplicateSession.reason(), "duplicate session");
    }
}
