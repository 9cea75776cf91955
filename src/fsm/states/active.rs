use super::{ClosingSession, CreateAndActivate, Reactivate, SessionState};
use crate::client::{FaultAction, FaultHandlerId};
use crate::fsm::context::SessionStateContext;
use crate::fsm::event::SessionStateEvent;
use crate::session::{Session, SessionFuture};
use crate::status::StatusCode;

/// The session is usable.
///
/// The only state holding a fault handler registration. It is installed on
/// entry and removed on every outward transition, so a handler exists exactly
/// while a session is nominally active.
#[derive(Debug)]
pub struct Active {
    session: Session,
    future: SessionFuture,
    handler: Option<FaultHandlerId>,
}

impl Active {
    /// Active `session`, resolving `future` on entry.
    pub fn new(session: Session, future: SessionFuture) -> Self {
        Self {
            session,
            future,
            handler: None,
        }
    }

    /// Get the active session
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Get session future
    pub fn session_future(&self) -> &SessionFuture {
        &self.future
    }

    /// Registration owned by this instance, once entered.
    pub fn fault_handler(&self) -> Option<FaultHandlerId> {
        self.handler
    }

    pub(crate) fn activate(&mut self, ctx: &SessionStateContext) {
        let sink = ctx.event_sink();
        let session_id = self.session.id().to_string();

        // server-side invalidation means starting over, not reactivating
        let id = ctx.client().fault_handlers().register(
            |fault| fault.service_result == StatusCode::BAD_SESSION_ID_INVALID,
            move |id, fault| {
                tracing::warn!("ServiceFault on session {}: {}", session_id, fault.service_result);
                sink.send(SessionStateEvent::CreateAndActivateRequested {
                    fault_handler: Some(id),
                });
                FaultAction::Deregister
            },
        );
        self.handler = Some(id);

        if self.future.complete(self.session.clone()) {
            tracing::info!("Session {} active", self.session.id());
        } else {
            tracing::info!("Session {} reactivated", self.session.id());
        }
    }

    pub(crate) fn transition(
        &self,
        event: &SessionStateEvent,
        ctx: &SessionStateContext,
    ) -> Option<SessionState> {
        let next: SessionState = match event {
            SessionStateEvent::CreateAndActivateRequested { fault_handler } => {
                // raised by a handler some other Active instance registered
                if fault_handler.is_some() && *fault_handler != self.handler {
                    tracing::debug!("Ignoring recreate request from {:?}", fault_handler);
                    return None;
                }
                CreateAndActivate::reconnect(SessionFuture::new(), self.session.clone(), 0).into()
            },
            SessionStateEvent::CloseSessionRequested => {
                ClosingSession::closing(self.future.clone(), self.session.clone()).into()
            },
            SessionStateEvent::ErrConnectionLost | SessionStateEvent::ReactivateRequested => {
                Reactivate::new(self.session.clone(), self.future.clone(), 0).into()
            },
            _ => return None,
        };

        self.release(ctx);
        Some(next)
    }

    /// Remove this instance's own registration.
    pub(crate) fn release(&self, ctx: &SessionStateContext) {
        if let Some(id) = self.handler {
            ctx.client().fault_handlers().deregister(id);
        }
    }
}
