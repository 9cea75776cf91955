//! The six session states.
//!
//! Each state is its own type with an entry hook (`activate`) and a decision
//! function (`transition`). [`SessionState`] is the tagged union the
//! dispatcher holds; it forwards to the variant.
//!
//! `transition` returns `None` when the event is ignored. The dispatcher then
//! keeps the current instance and does not call `activate` again.

mod active;
mod closed;
mod closing_session;
mod create_and_activate;
mod inactive;
mod reactivate;

pub use active::Active;
pub use closed::Closed;
pub use closing_session::ClosingSession;
pub use create_and_activate::CreateAndActivate;
pub use inactive::Inactive;
pub use reactivate::Reactivate;

use super::context::SessionStateContext;
use super::event::SessionStateEvent;
use super::StateKind;
use crate::session::{Session, SessionFuture};

/// The current state of the session lifecycle.
#[derive(Debug)]
pub enum SessionState {
    /// No session, nothing pending
    Inactive(Inactive),
    /// Create + activate exchange in flight
    CreateAndActivate(CreateAndActivate),
    /// Session usable
    Active(Active),
    /// Re-binding the existing session after connection loss
    Reactivate(Reactivate),
    /// Close exchange in flight
    ClosingSession(ClosingSession),
    /// Lifecycle finished
    Closed(Closed),
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Inactive(Inactive)
    }
}

impl SessionState {
    /// Which state this is.
    pub fn kind(&self) -> StateKind {
        match self {
            Self::Inactive(_) => StateKind::Inactive,
            Self::CreateAndActivate(_) => StateKind::CreateAndActivate,
            Self::Active(_) => StateKind::Active,
            Self::Reactivate(_) => StateKind::Reactivate,
            Self::ClosingSession(_) => StateKind::ClosingSession,
            Self::Closed(_) => StateKind::Closed,
        }
    }

    /// Future callers should wait on, if a lifecycle is in progress.
    pub fn session_future(&self) -> Option<&SessionFuture> {
        match self {
            Self::Inactive(_) | Self::Closed(_) => None,
            Self::CreateAndActivate(state) => Some(state.session_future()),
            Self::Active(state) => Some(state.session_future()),
            Self::Reactivate(state) => Some(state.session_future()),
            Self::ClosingSession(state) => Some(state.session_future()),
        }
    }

    /// Session this state holds, usable or not.
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::Active(state) => Some(state.session()),
            Self::Reactivate(state) => Some(state.session()),
            Self::ClosingSession(state) => state.session(),
            _ => None,
        }
    }

    pub(crate) fn transition(
        &self,
        event: &SessionStateEvent,
        ctx: &SessionStateContext,
    ) -> Option<SessionState> {
        match self {
            Self::Inactive(state) => state.transition(event),
            Self::CreateAndActivate(state) => state.transition(event),
            Self::Active(state) => state.transition(event, ctx),
            Self::Reactivate(state) => state.transition(event, ctx),
            Self::ClosingSession(state) => state.transition(event),
            Self::Closed(state) => state.transition(event),
        }
    }

    pub(crate) fn activate(&mut self, event: &SessionStateEvent, ctx: &SessionStateContext) {
        tracing::trace!("Entering {} on {}", self.kind(), event);
        match self {
            Self::Inactive(_) => {},
            Self::CreateAndActivate(state) => state.activate(ctx),
            Self::Active(state) => state.activate(ctx),
            Self::Reactivate(state) => state.activate(ctx),
            Self::ClosingSession(state) => state.activate(ctx),
            Self::Closed(state) => state.activate(),
        }
    }

    /// Give back client resources when the dispatcher stops.
    pub(crate) fn release(&self, ctx: &SessionStateContext) {
        if let Self::Active(state) = self {
            state.release(ctx);
        }
    }
}

impl From<Inactive> for SessionState {
    fn from(state: Inactive) -> Self {
        Self::Inactive(state)
    }
}

impl From<CreateAndActivate> for SessionState {
    fn from(state: CreateAndActivate) -> Self {
        Self::CreateAndActivate(state)
    }
}

impl From<Active> for SessionState {
    fn from(state: Active) -> Self {
        Self::Active(state)
    }
}

impl From<Reactivate> for SessionState {
    fn from(state: Reactivate) -> Self {
        Self::Reactivate(state)
    }
}

impl From<ClosingSession> for SessionState {
    fn from(state: ClosingSession) -> Self {
        Self::ClosingSession(state)
    }
}

impl From<Closed> for SessionState {
    fn from(state: Closed) -> Self {
        Self::Closed(state)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Drives states by hand without a running dispatcher.

    use std::sync::Arc;

    use tokio::sync::mpsc;

    use super::*;
    use crate::config::{ReconnectConfig, SessionConfig};
    use crate::fsm::context::Envelope;
    use crate::sim::SimulatedClient;

    /// Context plus the queue it feeds, so tests can read synthesized events.
    pub(crate) struct Harness {
        pub(crate) client: Arc<SimulatedClient>,
        pub(crate) ctx: SessionStateContext,
        // keeps the queue open for exchanges spawned through `ctx`
        _tx: mpsc::UnboundedSender<Envelope>,
        rx: mpsc::UnboundedReceiver<Envelope>,
    }

    impl Harness {
        pub(crate) fn new(reconnect: ReconnectConfig) -> Self {
            let client = Arc::new(SimulatedClient::new());
            let (tx, rx) = mpsc::unbounded_channel();
            let config = SessionConfig::default().with_reconnect(reconnect);
            let ctx = SessionStateContext::new(client.clone(), config, &tx);
            Self {
                client,
                ctx,
                _tx: tx,
                rx,
            }
        }

        /// Apply `event`, activating the next state like the dispatcher does.
        pub(crate) fn step(&self, state: SessionState, event: SessionStateEvent) -> SessionState {
            match state.transition(&event, &self.ctx) {
                Some(mut next) => {
                    next.activate(&event, &self.ctx);
                    next
                },
                None => state,
            }
        }

        /// Next event synthesized by an entry effect or exchange.
        pub(crate) async fn next_event(&mut self) -> SessionStateEvent {
            self.rx.recv().await.map(|env| env.event).unwrap()
        }
    }
}
