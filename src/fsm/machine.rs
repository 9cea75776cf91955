//! Public handle to a running session state machine.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use super::context::{self, Envelope, SessionStateContext};
use super::event::SessionStateEvent;
use super::states::SessionState;
use super::StateKind;
use crate::client::SessionClient;
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::session::{Session, SessionFuture};

/// Snapshot published after every accepted transition.
#[derive(Debug, Clone)]
pub struct SessionStatus {
    /// Current state
    pub state: StateKind,
    /// Usable session, only while `Active`
    pub session: Option<Session>,
    /// Future of the lifecycle in progress
    pub future: Option<SessionFuture>,
    /// Transitions accepted so far
    pub transitions: u64,
}

impl SessionStatus {
    pub(crate) fn capture(state: &SessionState, transitions: u64) -> Self {
        let kind = state.kind();
        Self {
            state: kind,
            session: if kind == StateKind::Active {
                state.session().cloned()
            } else {
                None
            },
            future: state.session_future().cloned(),
            transitions,
        }
    }

    /// Check if the session is usable
    pub fn is_active(&self) -> bool {
        self.state == StateKind::Active
    }
}

/// Transitions kept for a lagging [`SessionFsm::transitions`] receiver.
const TRANSITION_HISTORY: usize = 64;

/// One accepted transition, as published on [`SessionFsm::transitions`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    /// State the event arrived in
    pub from: StateKind,
    /// State entered
    pub to: StateKind,
    /// Name of the event that caused it
    pub event: &'static str,
    /// Transition count after this one
    pub transitions: u64,
    /// Session id once `Active`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
}

impl Transition {
    pub(crate) fn new(from: StateKind, event: &SessionStateEvent, status: &SessionStatus) -> Self {
        Self {
            from,
            to: status.state,
            event: event.name(),
            transitions: status.transitions,
            session: status.session.as_ref().map(|s| s.id().to_string()),
        }
    }
}

/// Cloneable handle to a session state machine.
///
/// Creating one spawns the dispatcher on the current tokio runtime. The
/// dispatcher stops once every handle is dropped, even with an exchange
/// still in flight; that exchange's completion is then discarded.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use ua_session::{SessionConfig, SessionFsm};
///
/// let fsm = SessionFsm::new(Arc::new(client), SessionConfig::default())?;
/// let session = fsm.connect().await?;
///
/// // transport reports a dropped connection: the same future stays valid
/// fsm.notify_connection_lost()?;
///
/// fsm.close().await?;
/// ```
#[derive(Clone)]
pub struct SessionFsm {
    events: mpsc::UnboundedSender<Envelope>,
    status: watch::Receiver<SessionStatus>,
    history: broadcast::Sender<Transition>,
    client: Arc<dyn SessionClient>,
}

impl SessionFsm {
    /// Validate `config` and start the dispatcher.
    pub fn new(client: Arc<dyn SessionClient>, config: SessionConfig) -> Result<Self> {
        config.validate()?;

        let (events, rx) = mpsc::unbounded_channel();
        let (status_tx, status) =
            watch::channel(SessionStatus::capture(&SessionState::default(), 0));
        let (history, _) = broadcast::channel(TRANSITION_HISTORY);
        let ctx = SessionStateContext::new(Arc::clone(&client), config, &events);

        tokio::spawn(context::run(ctx, rx, status_tx, history.clone()));
        tracing::debug!("Session state machine started for {}", client.name());

        Ok(Self {
            events,
            status,
            history,
            client,
        })
    }

    /// Queue a raw event.
    pub fn handle_event(&self, event: SessionStateEvent) -> Result<()> {
        self.events
            .send(Envelope::event(event))
            .map_err(|_| SessionError::Stopped)
    }

    /// Ask for a usable session.
    pub fn request_connect(&self) -> Result<()> {
        self.handle_event(SessionStateEvent::ConnectRequested)
    }

    /// Ask for the session to be closed.
    pub fn request_close(&self) -> Result<()> {
        self.handle_event(SessionStateEvent::CloseSessionRequested)
    }

    /// Ask for the active session to be re-bound to the current channel.
    pub fn request_reactivate(&self) -> Result<()> {
        self.handle_event(SessionStateEvent::ReactivateRequested)
    }

    /// Report that the transport lost its connection.
    pub fn notify_connection_lost(&self) -> Result<()> {
        self.handle_event(SessionStateEvent::ErrConnectionLost)
    }

    /// Current state.
    pub fn state(&self) -> StateKind {
        self.status.borrow().state
    }

    /// Latest status snapshot.
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Future of the lifecycle in progress, if any.
    pub fn session_future(&self) -> Option<SessionFuture> {
        self.status.borrow().future.clone()
    }

    /// Watch status snapshots.
    ///
    /// Only the latest snapshot is kept; use [`transitions`](Self::transitions)
    /// to see every step.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    /// Receive every transition accepted from now on.
    ///
    /// A receiver that falls more than 64 transitions behind gets
    /// `RecvError::Lagged` with the number it missed. The channel closes when
    /// the dispatcher stops.
    pub fn transitions(&self) -> broadcast::Receiver<Transition> {
        self.history.subscribe()
    }

    /// The client collaborator.
    pub fn client(&self) -> &Arc<dyn SessionClient> {
        &self.client
    }

    /// Wait until the machine reaches `kind`.
    pub async fn wait_for_state(&self, kind: StateKind) -> Result<SessionStatus> {
        let mut rx = self.status.clone();
        let status = rx
            .wait_for(|status| status.state == kind)
            .await
            .map_err(|_| SessionError::Stopped)?
            .clone();
        Ok(status)
    }

    /// Request a session and wait until it is usable.
    ///
    /// A close already queued or in progress is allowed to finish first, so
    /// the returned session always belongs to a live lifecycle.
    pub async fn connect(&self) -> Result<Session> {
        loop {
            let status = self.request(SessionStateEvent::ConnectRequested).await?;
            if status.state == StateKind::ClosingSession {
                self.wait_until_closed(&status).await?;
                continue;
            }
            let future = status.future.ok_or(SessionError::Stopped)?;
            return future.await;
        }
    }

    /// Close the session and wait until the machine is idle.
    pub async fn close(&self) -> Result<()> {
        let status = self.request(SessionStateEvent::CloseSessionRequested).await?;
        if status.state.is_idle() {
            return Ok(());
        }
        self.wait_until_closed(&status).await
    }

    /// Queue `event` and return the status the dispatcher left after it.
    async fn request(&self, event: SessionStateEvent) -> Result<SessionStatus> {
        let (reply, rx) = oneshot::channel();
        self.events
            .send(Envelope {
                event,
                reply: Some(reply),
            })
            .map_err(|_| SessionError::Stopped)?;
        rx.await.map_err(|_| SessionError::Stopped)
    }

    /// Wait for the machine to leave the `ClosingSession` seen in `seen`.
    ///
    /// `ClosingSession` only ever leads to `Closed`.
    async fn wait_until_closed(&self, seen: &SessionStatus) -> Result<()> {
        let mut rx = self.status.clone();
        rx.wait_for(|status| {
            status.transitions > seen.transitions && status.state != StateKind::ClosingSession
        })
        .await
        .map_err(|_| SessionError::Stopped)?;
        Ok(())
    }
}

impl fmt::Debug for SessionFsm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionFsm")
            .field("client", &self.client.name())
            .field("state", &self.state())
            .finish()
    }
}
