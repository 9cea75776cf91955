use super::{CreateAndActivate, SessionState};
use crate::fsm::event::SessionStateEvent;
use crate::session::SessionFuture;

/// Initial state: no session, nothing pending.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inactive;

impl Inactive {
    pub(crate) fn transition(&self, event: &SessionStateEvent) -> Option<SessionState> {
        start_lifecycle(event)
    }
}

/// Begin a new lifecycle with a fresh future on connect or create requests.
///
/// Shared with [`Closed`](super::Closed), which behaves like `Inactive`. A
/// create request raised by a fault handler belongs to a lifecycle that has
/// already ended and is ignored.
pub(super) fn start_lifecycle(event: &SessionStateEvent) -> Option<SessionState> {
    match event {
        SessionStateEvent::ConnectRequested
        | SessionStateEvent::CreateAndActivateRequested {
            fault_handler: None,
        } => Some(CreateAndActivate::new(SessionFuture::new()).into()),
        _ => None,
    }
}
