//! Serialized event dispatch.
//!
//! The dispatcher is a single tokio task that owns the current
//! [`SessionState`]. Every event, whether it comes from a caller, the
//! transport, a fault handler, or a finished exchange, goes through one
//! unbounded queue, so `transition` + `activate` for one event always run to
//! completion before the next event is looked at.
//!
//! ```text
//!  request_*()  ──┐
//!  fault handler ─┼──► mpsc queue ──► run(): next = state.transition(event)
//!  exchange task ─┘                         state = next
//!        ▲                                  state.activate(event) ──┐
//!        └───────────── spawn_exchange() ◄──────────────────────────┘
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};

use super::event::{OperationId, SessionStateEvent};
use super::machine::{SessionStatus, Transition};
use super::states::SessionState;
use crate::client::SessionClient;
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};

/// One queued event, optionally asking for the status right after it.
pub(crate) struct Envelope {
    pub(crate) event: SessionStateEvent,
    pub(crate) reply: Option<oneshot::Sender<SessionStatus>>,
}

impl Envelope {
    pub(crate) fn event(event: SessionStateEvent) -> Self {
        Self { event, reply: None }
    }
}

/// Weak handle for raising events from callbacks.
///
/// Does not keep the dispatcher alive; sending after it stopped is a no-op.
#[derive(Clone)]
pub struct EventSink(mpsc::WeakUnboundedSender<Envelope>);

impl EventSink {
    /// Queue `event`. Returns `false` if the dispatcher has stopped.
    pub fn send(&self, event: SessionStateEvent) -> bool {
        match self.0.upgrade() {
            Some(tx) => tx.send(Envelope::event(event)).is_ok(),
            None => false,
        }
    }
}

/// What a state can reach while it is current.
pub struct SessionStateContext {
    client: Arc<dyn SessionClient>,
    config: SessionConfig,
    events: mpsc::WeakUnboundedSender<Envelope>,
    next_op: AtomicU64,
}

impl SessionStateContext {
    pub(crate) fn new(
        client: Arc<dyn SessionClient>,
        config: SessionConfig,
        events: &mpsc::UnboundedSender<Envelope>,
    ) -> Self {
        Self {
            client,
            config,
            events: events.downgrade(),
            next_op: AtomicU64::new(1),
        }
    }

    /// The client collaborator.
    pub fn client(&self) -> &Arc<dyn SessionClient> {
        &self.client
    }

    /// Active configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Queue `event` behind whatever is being processed now.
    pub fn handle_event(&self, event: SessionStateEvent) -> bool {
        self.event_sink().send(event)
    }

    /// Weak sender for callbacks that outlive the current state.
    pub fn event_sink(&self) -> EventSink {
        EventSink(self.events.clone())
    }

    pub(crate) fn next_operation(&self) -> OperationId {
        OperationId(self.next_op.fetch_add(1, Ordering::Relaxed))
    }

    /// Run `exchange` in the background and queue `done(op, outcome)` when it
    /// finishes.
    ///
    /// `delay` elapses before the exchange starts; the request timeout bounds
    /// only the exchange itself. Completion is always a fresh event, never a
    /// call back into the current state.
    ///
    /// The task holds only a weak sender, so a pending exchange does not keep
    /// a dispatcher alive whose handles are all gone.
    pub(crate) fn spawn_exchange<T, F, D>(&self, op: OperationId, delay: Duration, exchange: F, done: D)
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
        D: FnOnce(OperationId, Result<T>) -> SessionStateEvent + Send + 'static,
    {
        let events = self.events.clone();
        let timeout = self.config.request_timeout();

        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let outcome = match tokio::time::timeout(timeout, exchange).await {
                Ok(outcome) => outcome,
                Err(_) => Err(SessionError::Timeout(timeout)),
            };

            let delivered = match events.upgrade() {
                Some(tx) => tx.send(Envelope::event(done(op, outcome))).is_ok(),
                None => false,
            };
            if !delivered {
                tracing::debug!("Dispatcher stopped before {} completed", op);
            }
        });
    }
}

/// Dispatcher loop. Exits once every `SessionFsm` handle is gone.
pub(crate) async fn run(
    ctx: SessionStateContext,
    mut rx: mpsc::UnboundedReceiver<Envelope>,
    status: watch::Sender<SessionStatus>,
    history: broadcast::Sender<Transition>,
) {
    let mut state = SessionState::default();
    let mut transitions = 0u64;

    while let Some(Envelope { event, reply }) = rx.recv().await {
        match state.transition(&event, &ctx) {
            Some(next) => {
                let from = state.kind();
                tracing::debug!(
                    from = %from,
                    to = %next.kind(),
                    event = %event,
                    "Session state transition"
                );
                state = next;
                transitions += 1;
                // status must be current before entry effects wake any waiter
                let snapshot = SessionStatus::capture(&state, transitions);
                // no subscribers is fine
                let _ = history.send(Transition::new(from, &event, &snapshot));
                status.send_replace(snapshot);
                state.activate(&event, &ctx);
            },
            None => {
                tracing::trace!(state = %state.kind(), event = %event, "Event ignored");
            },
        }

        if let Some(reply) = reply {
            let _ = reply.send(SessionStatus::capture(&state, transitions));
        }
    }

    state.release(&ctx);
    tracing::debug!("Session state machine stopped in {}", state.kind());
}
