use std::sync::Arc;
use std::time::Duration;

use super::{Closed, SessionState};
use crate::error::SessionError;
use crate::fsm::context::SessionStateContext;
use crate::fsm::event::{OperationId, SessionStateEvent};
use crate::session::{Session, SessionFuture};

/// A close request was issued; waiting for it to finish.
///
/// Close is best effort: success, fault and transport error all end in
/// [`Closed`]. Entered from a pending create, the state first waits for that
/// create to finish and closes whatever session it produced.
#[derive(Debug)]
pub struct ClosingSession {
    future: SessionFuture,
    session: Option<Session>,
    pending_create: Option<OperationId>,
    op: Option<OperationId>,
}

impl ClosingSession {
    /// Close an established `session`.
    pub fn closing(future: SessionFuture, session: Session) -> Self {
        Self {
            future,
            session: Some(session),
            pending_create: None,
            op: None,
        }
    }

    /// Close whatever the in-flight create `pending_create` yields.
    pub fn awaiting_create(future: SessionFuture, pending_create: Option<OperationId>) -> Self {
        Self {
            future,
            session: None,
            pending_create,
            op: None,
        }
    }

    /// Get session future
    pub fn session_future(&self) -> &SessionFuture {
        &self.future
    }

    /// Session being closed, once known.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub(crate) fn activate(&mut self, ctx: &SessionStateContext) {
        match (&self.session, self.pending_create) {
            (Some(session), _) => {
                let op = ctx.next_operation();
                self.op = Some(op);
                tracing::debug!("Closing session {} ({})", session.id(), op);

                let client = Arc::clone(ctx.client());
                let session = session.clone();
                ctx.spawn_exchange(
                    op,
                    Duration::ZERO,
                    async move { client.close_session(&session).await },
                    |op, outcome| {
                        if let Err(e) = outcome {
                            tracing::debug!("Close failed, treating session as closed: {}", e);
                        }
                        SessionStateEvent::CloseCompleted { op }
                    },
                );
            },
            (None, Some(create)) => {
                tracing::debug!("Close requested, waiting for {} to finish", create);
            },
            (None, None) => {
                let op = ctx.next_operation();
                self.op = Some(op);
                ctx.handle_event(SessionStateEvent::CloseCompleted { op });
            },
        }
    }

    pub(crate) fn transition(&self, event: &SessionStateEvent) -> Option<SessionState> {
        match event {
            SessionStateEvent::CloseCompleted { op } if self.op == Some(*op) => Some(self.finish()),
            SessionStateEvent::CreateAndActivateSucceeded { op, session }
                if self.pending_create == Some(*op) =>
            {
                Some(Self::closing(self.future.clone(), session.clone()).into())
            },
            SessionStateEvent::CreateAndActivateFailed { op, .. }
                if self.pending_create == Some(*op) =>
            {
                Some(self.finish())
            },
            _ => None,
        }
    }

    fn finish(&self) -> SessionState {
        if self.future.fail(SessionError::ClosedBeforeReady) {
            tracing::debug!("Session future {} failed: closed before ready", self.future.id());
        }
        Closed::new().into()
    }
}
