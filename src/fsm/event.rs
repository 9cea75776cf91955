//! Events delivered to the session state machine.

use std::fmt;

use crate::client::FaultHandlerId;
use crate::error::SessionError;
use crate::session::Session;

/// Identifies one exchange started by a state's entry effects.
///
/// Completion events carry the id of the exchange they finish, so a state
/// can tell its own completions from those of an exchange it superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(pub(crate) u64);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

/// Triggers driving the session lifecycle.
///
/// The first five variants are requests. The rest are completions synthesized
/// from asynchronous exchanges and fed back through the same serialized queue.
///
/// `CreateAndActivateRequested` raised by a fault handler names the
/// registration that raised it. Only the `Active` instance owning that
/// registration acts on it, so a callback that was already running when its
/// handler got deregistered cannot restart a finished lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStateEvent {
    /// A caller wants a usable session
    ConnectRequested,
    /// Start over with a brand-new session
    CreateAndActivateRequested {
        /// Registration that raised it, `None` for a caller request
        fault_handler: Option<FaultHandlerId>,
    },
    /// Re-bind the current session to the current channel
    ReactivateRequested,
    /// A caller wants the session closed
    CloseSessionRequested,
    /// The transport lost its connection
    ErrConnectionLost,

    /// Create + activate exchange finished with a session
    CreateAndActivateSucceeded {
        /// Exchange id
        op: OperationId,
        /// Newly created and activated session
        session: Session,
    },
    /// Create + activate exchange failed
    CreateAndActivateFailed {
        /// Exchange id
        op: OperationId,
        /// Failure reason
        error: SessionError,
    },
    /// Reactivation exchange finished
    ReactivateSucceeded {
        /// Exchange id
        op: OperationId,
        /// Reactivated session
        session: Session,
    },
    /// Reactivation exchange failed
    ReactivateFailed {
        /// Exchange id
        op: OperationId,
        /// Failure reason
        error: SessionError,
    },
    /// Close exchange finished, whatever its outcome
    CloseCompleted {
        /// Exchange id
        op: OperationId,
    },
}

impl SessionStateEvent {
    /// `CREATE_AND_ACTIVATE_REQUESTED` from a caller.
    pub fn create_and_activate_requested() -> Self {
        Self::CreateAndActivateRequested {
            fault_handler: None,
        }
    }

    /// Event name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConnectRequested => "CONNECT_REQUESTED",
            Self::CreateAndActivateRequested { .. } => "CREATE_AND_ACTIVATE_REQUESTED",
            Self::ReactivateRequested => "REACTIVATE_REQUESTED",
            Self::CloseSessionRequested => "CLOSE_SESSION_REQUESTED",
            Self::ErrConnectionLost => "ERR_CONNECTION_LOST",
            Self::CreateAndActivateSucceeded { .. } => "CREATE_AND_ACTIVATE_SUCCEEDED",
            Self::CreateAndActivateFailed { .. } => "CREATE_AND_ACTIVATE_FAILED",
            Self::ReactivateSucceeded { .. } => "REACTIVATE_SUCCEEDED",
            Self::ReactivateFailed { .. } => "REACTIVATE_FAILED",
            Self::CloseCompleted { .. } => "CLOSE_COMPLETED",
        }
    }

    /// Whether this event reports the completion of an exchange.
    pub fn is_completion(&self) -> bool {
        self.operation().is_some()
    }

    /// Exchange id carried by completion events.
    pub fn operation(&self) -> Option<OperationId> {
        match self {
            Self::CreateAndActivateSucceeded { op, .. }
            | Self::CreateAndActivateFailed { op, .. }
            | Self::ReactivateSucceeded { op, .. }
            | Self::ReactivateFailed { op, .. }
            | Self::CloseCompleted { op } => Some(*op),
            _ => None,
        }
    }
}

impl fmt::Display for SessionStateEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operation() {
            Some(op) => write!(f, "{}({})", self.name(), op),
            None => f.write_str(self.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_classification() {
        assert!(!SessionStateEvent::ConnectRequested.is_completion());
        assert!(!SessionStateEvent::ErrConnectionLost.is_completion());

        let event = SessionStateEvent::CloseCompleted { op: OperationId(7) };
        assert!(event.is_completion());
        assert_eq!(event.operation(), Some(OperationId(7)));
        assert_eq!(event.to_string(), "CLOSE_COMPLETED(op-7)");
    }
}
