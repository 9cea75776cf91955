use std::sync::Arc;

use super::{Active, Closed, ClosingSession, CreateAndActivate, SessionState};
use crate::error::SessionError;
use crate::fsm::context::SessionStateContext;
use crate::fsm::event::{OperationId, SessionStateEvent};
use crate::session::{Session, SessionFuture};

/// The connection was lost; re-binding the existing session to a fresh channel.
///
/// Each failed attempt moves to a new `Reactivate` with the counter bumped
/// and a backoff delay before the next try. Once attempts run out the machine
/// falls back to creating a new session through the reconnect path.
#[derive(Debug)]
pub struct Reactivate {
    session: Session,
    future: SessionFuture,
    attempt: u32,
    recovery_cycle: u32,
    op: Option<OperationId>,
}

impl Reactivate {
    /// First reactivation attempt for `session`.
    pub fn new(session: Session, future: SessionFuture, recovery_cycle: u32) -> Self {
        Self {
            session,
            future,
            attempt: 0,
            recovery_cycle,
            op: None,
        }
    }

    /// Get the session being reactivated
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Get session future
    pub fn session_future(&self) -> &SessionFuture {
        &self.future
    }

    /// Zero-based attempt number within the current cycle.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Recovery cycles used so far.
    pub fn recovery_cycle(&self) -> u32 {
        self.recovery_cycle
    }

    pub(crate) fn activate(&mut self, ctx: &SessionStateContext) {
        let op = ctx.next_operation();
        self.op = Some(op);

        let delay = ctx.config().reconnect.delay_for_attempt(self.attempt);
        tracing::debug!(
            "Reactivating session {} (attempt {}, delay {:?}, {})",
            self.session.id(),
            self.attempt,
            delay,
            op
        );

        let client = Arc::clone(ctx.client());
        let session = self.session.clone();
        ctx.spawn_exchange(
            op,
            delay,
            async move { client.reactivate_session(&session).await },
            |op, outcome| match outcome {
                Ok(session) => SessionStateEvent::ReactivateSucceeded { op, session },
                Err(error) => SessionStateEvent::ReactivateFailed { op, error },
            },
        );
    }

    pub(crate) fn transition(
        &self,
        event: &SessionStateEvent,
        ctx: &SessionStateContext,
    ) -> Option<SessionState> {
        match event {
            SessionStateEvent::ReactivateSucceeded { op, session } if self.owns(*op) => {
                Some(Active::new(session.clone(), self.future.clone()).into())
            },
            SessionStateEvent::ReactivateFailed { op, error } if self.owns(*op) => {
                Some(self.on_failure(error, ctx))
            },
            SessionStateEvent::CloseSessionRequested => {
                Some(ClosingSession::closing(self.future.clone(), self.session.clone()).into())
            },
            // ERR_CONNECTION_LOST: the attempt in flight already counts
            _ => None,
        }
    }

    fn on_failure(&self, error: &SessionError, ctx: &SessionStateContext) -> SessionState {
        let policy = &ctx.config().reconnect;

        if policy.has_attempts_after(self.attempt) {
            tracing::warn!(
                "Reactivation attempt {} of session {} failed: {}",
                self.attempt,
                self.session.id(),
                error
            );
            return Self {
                session: self.session.clone(),
                future: self.future.clone(),
                attempt: self.attempt + 1,
                recovery_cycle: self.recovery_cycle,
                op: None,
            }
            .into();
        }

        let cycle = self.recovery_cycle + 1;
        if policy.exceeds_recovery_ceiling(cycle) {
            let exhausted = SessionError::RecoveryExhausted {
                cycles: self.recovery_cycle,
            };
            tracing::warn!("Giving up on session {}: {}", self.session.id(), exhausted);
            self.future.fail(exhausted.clone());
            return Closed::failed(exhausted).into();
        }

        tracing::warn!(
            "Reactivation of session {} exhausted after {} attempt(s), creating a new session: {}",
            self.session.id(),
            self.attempt + 1,
            error
        );
        // callers still waiting keep their future; a settled one is replaced
        let future = if self.future.is_done() {
            SessionFuture::new()
        } else {
            self.future.clone()
        };
        CreateAndActivate::reconnect(future, self.session.clone(), cycle).into()
    }

    fn owns(&self, op: OperationId) -> bool {
        self.op == Some(op)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::ReconnectConfig;
    use crate::fsm::states::test_support::Harness;
    use crate::fsm::StateKind;
    use crate::status::StatusCode;

    fn fast(attempts: u32) -> ReconnectConfig {
        ReconnectConfig::default()
            .with_max_reactivate_attempts(attempts)
            .with_backoff(Duration::from_millis(1), Duration::from_millis(2))
    }

    fn session() -> Session {
        Session::new("s-1", "token", Duration::from_secs(60))
    }

    fn failed(op: OperationId) -> SessionStateEvent {
        SessionStateEvent::ReactivateFailed {
            op,
            error: SessionError::ServiceFault(StatusCode::BAD_SECURE_CHANNEL_CLOSED),
        }
    }

    fn entered(h: &Harness, state: Reactivate) -> (Reactivate, OperationId) {
        let mut state = state;
        state.activate(&h.ctx);
        let op = state.op.unwrap();
        (state, op)
    }

    #[tokio::test]
    async fn test_failure_with_attempts_left_retries() {
        let h = Harness::new(fast(3));
        let future = SessionFuture::new();
        let (state, op) = entered(&h, Reactivate::new(session(), future.clone(), 0));

        let SessionState::Reactivate(next) = state.transition(&failed(op), &h.ctx).unwrap() else {
            panic!("expected Reactivate");
        };
        assert_eq!(next.attempt(), 1);
        assert!(next.session_future().same_as(&future));
    }

    #[tokio::test]
    async fn test_exhausted_falls_back_to_create() {
        let h = Harness::new(fast(1));
        let future = SessionFuture::new();
        future.complete(session());
        let (state, op) = entered(&h, Reactivate::new(session(), future.clone(), 0));

        let SessionState::CreateAndActivate(next) = state.transition(&failed(op), &h.ctx).unwrap()
        else {
            panic!("expected CreateAndActivate");
        };
        assert!(next.is_reconnect());
        assert_eq!(next.recovery_cycle(), 1);
        assert_eq!(next.previous_session(), Some(&session()));
        // the old future already resolved, so recreation gets a new one
        assert!(!next.session_future().same_as(&future));
    }

    #[tokio::test]
    async fn test_pending_future_carried_into_create() {
        let h = Harness::new(fast(1));
        let future = SessionFuture::new();
        let (state, op) = entered(&h, Reactivate::new(session(), future.clone(), 0));

        let next = state.transition(&failed(op), &h.ctx).unwrap();
        assert_eq!(next.kind(), StateKind::CreateAndActivate);
        assert!(next.session_future().unwrap().same_as(&future));
    }

    #[tokio::test]
    async fn test_recovery_ceiling_closes() {
        let h = Harness::new(fast(1).with_max_recovery_cycles(Some(2)));
        let future = SessionFuture::new();
        let (state, op) = entered(&h, Reactivate::new(session(), future.clone(), 2));

        let next = state.transition(&failed(op), &h.ctx).unwrap();
        assert_eq!(next.kind(), StateKind::Closed);
        assert_eq!(
            future.peek(),
            Some(Err(SessionError::RecoveryExhausted { cycles: 2 }))
        );
    }

    #[tokio::test]
    async fn test_connection_loss_does_not_count() {
        let h = Harness::new(fast(3));
        let (state, _) = entered(&h, Reactivate::new(session(), SessionFuture::new(), 0));
        assert!(state
            .transition(&SessionStateEvent::ErrConnectionLost, &h.ctx)
            .is_none());
    }

    #[tokio::test]
    async fn test_stale_completion_ignored() {
        let h = Harness::new(fast(3));
        let (state, op) = entered(&h, Reactivate::new(session(), SessionFuture::new(), 0));
        let stale = OperationId(op.0 + 100);
        assert!(state.transition(&failed(stale), &h.ctx).is_none());
    }

    #[tokio::test]
    async fn test_close_while_reactivating() {
        let h = Harness::new(fast(3));
        let (state, _) = entered(&h, Reactivate::new(session(), SessionFuture::new(), 0));
        let next = state
            .transition(&SessionStateEvent::CloseSessionRequested, &h.ctx)
            .unwrap();
        assert_eq!(next.kind(), StateKind::ClosingSession);
        assert_eq!(next.session(), Some(&session()));
    }

    #[tokio::test]
    async fn test_exchange_reports_completion() {
        let mut h = Harness::new(fast(3));
        // the simulated server does not know "s-1"
        let (_state, op) = entered(&h, Reactivate::new(session(), SessionFuture::new(), 0));

        let event = h.next_event().await;
        assert_eq!(event.operation(), Some(op));
        assert!(matches!(
            event,
            SessionStateEvent::ReactivateFailed {
                error: SessionError::ServiceFault(StatusCode::BAD_SESSION_ID_INVALID),
                ..
            }
        ));
    }
}
