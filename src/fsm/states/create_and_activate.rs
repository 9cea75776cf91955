use std::sync::Arc;
use std::time::Duration;

use super::{Active, Closed, ClosingSession, Reactivate, SessionState};
use crate::error::SessionError;
use crate::fsm::context::SessionStateContext;
use crate::fsm::event::{OperationId, SessionStateEvent};
use crate::session::{Session, SessionFuture};

/// A create + activate exchange is in flight.
///
/// Without a previous session this is a first attempt: failure fails the
/// future and closes. With one it is a reconnect: failure goes back to
/// reactivating the previous session instead of surfacing.
#[derive(Debug)]
pub struct CreateAndActivate {
    future: SessionFuture,
    previous: Option<Session>,
    recovery_cycle: u32,
    op: Option<OperationId>,
}

impl CreateAndActivate {
    /// First attempt of a lifecycle.
    pub fn new(future: SessionFuture) -> Self {
        Self {
            future,
            previous: None,
            recovery_cycle: 0,
            op: None,
        }
    }

    /// Replace `previous` with a new session as part of recovery.
    pub fn reconnect(future: SessionFuture, previous: Session, recovery_cycle: u32) -> Self {
        Self {
            future,
            previous: Some(previous),
            recovery_cycle,
            op: None,
        }
    }

    /// Whether a failure falls back to reactivation.
    pub fn is_reconnect(&self) -> bool {
        self.previous.is_some()
    }

    /// Get pending session future
    pub fn session_future(&self) -> &SessionFuture {
        &self.future
    }

    /// Session being replaced, on reconnect.
    pub fn previous_session(&self) -> Option<&Session> {
        self.previous.as_ref()
    }

    /// Recovery cycles used so far.
    pub fn recovery_cycle(&self) -> u32 {
        self.recovery_cycle
    }

    pub(crate) fn activate(&mut self, ctx: &SessionStateContext) {
        let op = ctx.next_operation();
        self.op = Some(op);
        tracing::debug!(
            "Creating session ({}, reconnect={}, cycle={})",
            op,
            self.is_reconnect(),
            self.recovery_cycle
        );

        let client = Arc::clone(ctx.client());
        ctx.spawn_exchange(
            op,
            Duration::ZERO,
            async move { client.create_and_activate_session().await },
            |op, outcome| match outcome {
                Ok(session) => SessionStateEvent::CreateAndActivateSucceeded { op, session },
                Err(error) => SessionStateEvent::CreateAndActivateFailed { op, error },
            },
        );
    }

    pub(crate) fn transition(&self, event: &SessionStateEvent) -> Option<SessionState> {
        match event {
            SessionStateEvent::CreateAndActivateSucceeded { op, session } if self.owns(*op) => {
                Some(Active::new(session.clone(), self.future.clone()).into())
            },
            SessionStateEvent::CreateAndActivateFailed { op, error } if self.owns(*op) => {
                Some(self.on_failure(error))
            },
            // the in-flight create finishes under ClosingSession
            SessionStateEvent::CloseSessionRequested => {
                Some(ClosingSession::awaiting_create(self.future.clone(), self.op).into())
            },
            _ => None,
        }
    }

    fn on_failure(&self, error: &SessionError) -> SessionState {
        match &self.previous {
            None => {
                tracing::warn!("Session create failed: {}", error);
                self.future.fail(error.clone());
                Closed::failed(error.clone()).into()
            },
            Some(previous) => {
                tracing::warn!(
                    "Session re-create failed, reactivating {} again: {}",
                    previous.id(),
                    error
                );
                Reactivate::new(previous.clone(), self.future.clone(), self.recovery_cycle).into()
            },
        }
    }

    fn owns(&self, op: OperationId) -> bool {
        self.op == Some(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconnectConfig;
    use crate::fsm::states::test_support::Harness;
    use crate::fsm::StateKind;

    #[tokio::test]
    async fn test_success_enters_active_with_same_future() {
        let mut h = Harness::new(ReconnectConfig::default());
        let state = h.step(SessionState::default(), SessionStateEvent::ConnectRequested);
        assert_eq!(state.kind(), StateKind::CreateAndActivate);
        let pending = state.session_future().unwrap().clone();

        let event = h.next_event().await;
        assert!(matches!(event, SessionStateEvent::CreateAndActivateSucceeded { .. }));

        let state = h.step(state, event);
        assert_eq!(state.kind(), StateKind::Active);
        assert!(state.session_future().unwrap().same_as(&pending));
        assert!(pending.peek().unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_first_attempt_failure_closes_and_fails_future() {
        let mut h = Harness::new(ReconnectConfig::default());
        h.client.script_create([Err(SessionError::Transport("refused".into()))]);

        let state = h.step(SessionState::default(), SessionStateEvent::ConnectRequested);
        let future = state.session_future().unwrap().clone();

        let event = h.next_event().await;
        let state = h.step(state, event);
        assert_eq!(state.kind(), StateKind::Closed);
        assert_eq!(
            future.peek(),
            Some(Err(SessionError::Transport("refused".into())))
        );
    }

    #[tokio::test]
    async fn test_reconnect_failure_falls_back_to_reactivate() {
        let mut h = Harness::new(ReconnectConfig::default());
        h.client.script_create([Err(SessionError::Transport("refused".into()))]);

        let previous = Session::new("old", "token", Duration::from_secs(60));
        let future = SessionFuture::new();
        let mut state: SessionState =
            CreateAndActivate::reconnect(future.clone(), previous.clone(), 2).into();
        state.activate(&SessionStateEvent::create_and_activate_requested(), &h.ctx);

        let event = h.next_event().await;
        let state = h.step(state, event);
        let SessionState::Reactivate(reactivate) = &state else {
            panic!("expected Reactivate, got {}", state.kind());
        };
        assert_eq!(reactivate.session(), &previous);
        assert_eq!(reactivate.attempt(), 0);
        assert_eq!(reactivate.recovery_cycle(), 2);
        assert!(reactivate.session_future().same_as(&future));
        assert!(!future.is_done());
    }

    #[tokio::test]
    async fn test_foreign_completion_ignored() {
        let h = Harness::new(ReconnectConfig::default());
        let state = CreateAndActivate::new(SessionFuture::new());
        let stale = SessionStateEvent::CreateAndActivateFailed {
            op: OperationId(999),
            error: SessionError::Stopped,
        };
        assert!(SessionState::from(state).transition(&stale, &h.ctx).is_none());
    }

    #[test]
    fn test_close_while_pending() {
        let future = SessionFuture::new();
        let state = CreateAndActivate::new(future.clone());
        let next = state
            .transition(&SessionStateEvent::CloseSessionRequested)
            .unwrap();
        assert_eq!(next.kind(), StateKind::ClosingSession);
        assert!(next.session_future().unwrap().same_as(&future));
    }
}
