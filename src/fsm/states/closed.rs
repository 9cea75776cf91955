use super::inactive::start_lifecycle;
use super::SessionState;
use crate::error::SessionError;
use crate::fsm::event::SessionStateEvent;

/// A lifecycle finished, by close or by unrecoverable failure.
///
/// Transitions exactly like [`Inactive`](super::Inactive): only a connect or
/// create request starts a new lifecycle, with a new future.
#[derive(Debug, Clone, Default)]
pub struct Closed {
    error: Option<SessionError>,
}

impl Closed {
    /// Closed after a regular close.
    pub fn new() -> Self {
        Self::default()
    }

    /// Closed because establishment or recovery failed.
    pub fn failed(error: SessionError) -> Self {
        Self { error: Some(error) }
    }

    /// Failure that ended the lifecycle, if any.
    pub fn error(&self) -> Option<&SessionError> {
        self.error.as_ref()
    }

    pub(crate) fn activate(&self) {
        match &self.error {
            Some(error) => tracing::info!("Session closed after failure: {}", error),
            None => tracing::info!("Session closed"),
        }
    }

    pub(crate) fn transition(&self, event: &SessionStateEvent) -> Option<SessionState> {
        start_lifecycle(event)
    }
}
