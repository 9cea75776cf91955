//! Session lifecycle state machine.
//!
//! Establishes, activates, monitors, reactivates and closes one logical
//! session on top of a client's secure channel. Callers get a
//! [`SessionFuture`](crate::session::SessionFuture) that resolves once the
//! session is usable and stays resolved across transient reconnects.
//!
//! # State Machine
//!
//! ```text
//!                 CONNECT_REQUESTED
//!   [Inactive] ─────────────────────> [CreateAndActivate] ──failure, no previous──> [Closed]
//!                                        │         ▲    │                              ▲
//!                                success │         │    │ failure, reconnect           │
//!                                        v         │    v                              │
//!   CREATE_AND_ACTIVATE_REQUESTED ─── [Active] ◄───┼── [Reactivate] ◄─┐ attempts left  │
//!   (server invalidated session)         │         │    │    └────────┘                │
//!                                        │         └────┘ attempts exhausted           │
//!                    ERR_CONNECTION_LOST ┴──> [Reactivate]                             │
//!                                                                                      │
//!   CLOSE_SESSION_REQUESTED (from CreateAndActivate, Active, Reactivate)               │
//!        ──> [ClosingSession] ── close completed ──────────────────────────────────────┘
//! ```
//!
//! | State               | Entry effect                              | Holds            |
//! |---------------------|-------------------------------------------|------------------|
//! | `Inactive`          | none                                      | nothing          |
//! | `CreateAndActivate` | start create + activate exchange          | future           |
//! | `Active`            | register fault handler, resolve future    | session, future  |
//! | `Reactivate`        | backoff, then reactivate exchange         | session, future  |
//! | `ClosingSession`    | start close exchange                      | future           |
//! | `Closed`            | none                                      | last failure     |
//!
//! # Concurrency
//!
//! All events go through one queue processed by one task (see
//! [`SessionStateContext`]). Exchanges run as separate tasks and report back
//! as new events, tagged with an [`OperationId`] so that completions of
//! superseded exchanges are recognised and dropped.

mod context;
mod event;
mod machine;
pub mod states;

pub use context::{EventSink, SessionStateContext};
pub use event::{OperationId, SessionStateEvent};
pub use machine::{SessionFsm, SessionStatus, Transition};
pub use states::SessionState;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which of the six states the machine is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateKind {
    /// No session, nothing pending
    Inactive,
    /// Create + activate in flight
    CreateAndActivate,
    /// Session usable
    Active,
    /// Re-binding the session after connection loss
    Reactivate,
    /// Close in flight
    ClosingSession,
    /// Lifecycle finished
    Closed,
}

impl StateKind {
    /// Get state name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Inactive => "Inactive",
            Self::CreateAndActivate => "CreateAndActivate",
            Self::Active => "Active",
            Self::Reactivate => "Reactivate",
            Self::ClosingSession => "ClosingSession",
            Self::Closed => "Closed",
        }
    }

    /// Whether no lifecycle is in progress.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Inactive | Self::Closed)
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}
