//! Single-assignment, multi-waiter session promise.

use std::fmt;
use std::future::IntoFuture;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::watch;

use super::Session;
use crate::error::{Result, SessionError};

static NEXT_FUTURE_ID: AtomicU64 = AtomicU64::new(1);

type Slot = Option<Result<Session>>;

/// Promise of a usable [`Session`].
///
/// Settles at most once: the first `complete` or `fail` wins and later calls
/// are no-ops that return `false`. Clones share the same slot, so any number
/// of tasks can wait on it concurrently. Identity is preserved across clones
/// and can be checked with [`SessionFuture::same_as`].
#[derive(Clone)]
pub struct SessionFuture {
    id: u64,
    slot: Arc<watch::Sender<Slot>>,
}

impl SessionFuture {
    /// Create an unsettled future.
    pub fn new() -> Self {
        let (slot, _) = watch::channel(None);
        Self {
            id: NEXT_FUTURE_ID.fetch_add(1, Ordering::Relaxed),
            slot: Arc::new(slot),
        }
    }

    /// Process-unique id, handy in logs.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Resolve with `session`. Returns `false` if already settled.
    pub fn complete(&self, session: Session) -> bool {
        self.settle(Ok(session))
    }

    /// Resolve with `error`. Returns `false` if already settled.
    pub fn fail(&self, error: SessionError) -> bool {
        self.settle(Err(error))
    }

    fn settle(&self, outcome: Result<Session>) -> bool {
        self.slot.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(outcome);
            true
        })
    }

    /// Whether the future has been completed or failed.
    pub fn is_done(&self) -> bool {
        self.slot.borrow().is_some()
    }

    /// Outcome, if settled.
    pub fn peek(&self) -> Option<Result<Session>> {
        self.slot.borrow().clone()
    }

    /// Wait for the outcome.
    pub async fn wait(&self) -> Result<Session> {
        let mut rx = self.slot.subscribe();
        let outcome = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| SessionError::Stopped)?
            .clone();
        outcome.unwrap_or(Err(SessionError::Stopped))
    }

    /// Whether `other` is a clone of this very future.
    pub fn same_as(&self, other: &SessionFuture) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

impl Default for SessionFuture {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.slot.borrow() {
            None => "pending",
            Some(Ok(_)) => "completed",
            Some(Err(_)) => "failed",
        };
        f.debug_struct("SessionFuture")
            .field("id", &self.id)
            .field("state", &state)
            .finish()
    }
}

impl IntoFuture for SessionFuture {
    type Output = Result<Session>;
    type IntoFuture = BoxFuture<'static, Result<Session>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.wait().await })
    }
}
