//! Session lifecycle error types.
//!
//! # Error Classification
//!
//! Errors split by who can do something about them:
//!
//! - **Exchange failures** (`ServiceFault`, `Transport`, `Timeout`) come back
//!   from a create/activate/reactivate/close exchange. The state machine turns
//!   them into internal events and decides recovery itself; callers only see
//!   them when no recovery path remains.
//! - **Lifecycle outcomes** (`ClosedBeforeReady`, `RecoveryExhausted`) are
//!   produced by the state machine when it fails a pending session future.
//! - **Local errors** (`Stopped`, `Config`) never reach the server.
//!
//! `SessionError` is `Clone` because one failure is delivered to every waiter
//! of a [`SessionFuture`](crate::session::SessionFuture).

use std::time::Duration;

use thiserror::Error;

use crate::status::StatusCode;

/// Session lifecycle errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    /// The server answered an exchange with a bad status.
    #[error("Service fault: {0}")]
    ServiceFault(StatusCode),

    /// The exchange failed below the session layer.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The exchange did not complete within the request timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// A close completed while a caller still waited for the session.
    #[error("Session closed before it became ready")]
    ClosedBeforeReady,

    /// Reactivation and recreation both kept failing past the configured ceiling.
    #[error("Session recovery exhausted after {cycles} cycle(s)")]
    RecoveryExhausted {
        /// Recovery cycles attempted before giving up.
        cycles: u32,
    },

    /// The state machine dispatcher is no longer running.
    #[error("Session state machine stopped")]
    Stopped,

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),
}

impl SessionError {
    /// Status code carried by a service fault, if any.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::ServiceFault(status) => Some(*status),
            _ => None,
        }
    }
}

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

impl From<toml::de::Error> for SessionError {
    fn from(err: toml::de::Error) -> Self {
        SessionError::Config(format!("Failed to parse config: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_only_on_faults() {
        let fault = SessionError::ServiceFault(StatusCode::BAD_SESSION_ID_INVALID);
        assert_eq!(fault.status_code(), Some(StatusCode::BAD_SESSION_ID_INVALID));
        assert_eq!(SessionError::ClosedBeforeReady.status_code(), None);
    }

    #[test]
    fn test_display() {
        let err = SessionError::RecoveryExhausted { cycles: 3 };
        assert_eq!(err.to_string(), "Session recovery exhausted after 3 cycle(s)");

        let err = SessionError::ServiceFault(StatusCode::BAD_SESSION_CLOSED);
        assert!(err.to_string().contains("BadSessionClosed"));
    }
}
