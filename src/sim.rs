//! In-memory session server.
//!
//! [`SimulatedClient`] implements [`SessionClient`] against a fake server that
//! tracks live sessions. Outcomes can be scripted per exchange, the server can
//! be made unreachable, and sessions can be invalidated server-side, which
//! pushes a `Bad_SessionIdInvalid` fault through the registry the same way a
//! real client would.
//!
//! # Example
//!
//! ```rust,ignore
//! let client = Arc::new(SimulatedClient::new());
//! client.script_reactivate([Err(SessionError::Transport("reset".into()))]);
//!
//! let fsm = SessionFsm::new(client.clone(), config)?;
//! let session = fsm.connect().await?;
//! client.invalidate_session(&session);
//! ```

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::client::{ExchangeFuture, FaultHandlerRegistry, ServiceFault, SessionClient};
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::session::Session;
use crate::status::StatusCode;

/// Scripted outcomes for one exchange kind, consumed front to back.
type Script = Mutex<VecDeque<Result<()>>>;

/// Scriptable [`SessionClient`] backed by an in-memory server.
pub struct SimulatedClient {
    name: String,
    session_name: String,
    session_timeout: Duration,
    max_request_message_size: u32,
    latency: Duration,
    reachable: AtomicBool,
    faults: FaultHandlerRegistry,
    live: Mutex<HashSet<String>>,
    create_script: Script,
    reactivate_script: Script,
    close_script: Script,
    creates: AtomicU64,
    reactivations: AtomicU64,
    closes: AtomicU64,
}

impl SimulatedClient {
    /// Reachable server, no latency, default session parameters.
    pub fn new() -> Self {
        Self::from_config(&SessionConfig::default())
    }

    /// Use the session name and timeouts from `config`.
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            name: "simulated".to_string(),
            session_name: config.session_name.clone(),
            session_timeout: config.session_timeout(),
            max_request_message_size: config.max_response_message_size,
            latency: Duration::ZERO,
            reachable: AtomicBool::new(true),
            faults: FaultHandlerRegistry::new(),
            live: Mutex::new(HashSet::new()),
            create_script: Script::default(),
            reactivate_script: Script::default(),
            close_script: Script::default(),
            creates: AtomicU64::new(0),
            reactivations: AtomicU64::new(0),
            closes: AtomicU64::new(0),
        }
    }

    /// Delay every exchange by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Queue outcomes for upcoming create exchanges.
    pub fn script_create(&self, outcomes: impl IntoIterator<Item = Result<()>>) {
        self.create_script.lock().extend(outcomes);
    }

    /// Queue outcomes for upcoming reactivate exchanges.
    pub fn script_reactivate(&self, outcomes: impl IntoIterator<Item = Result<()>>) {
        self.reactivate_script.lock().extend(outcomes);
    }

    /// Queue outcomes for upcoming close exchanges.
    pub fn script_close(&self, outcomes: impl IntoIterator<Item = Result<()>>) {
        self.close_script.lock().extend(outcomes);
    }

    /// While unreachable every exchange fails with a transport error.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Forget `session` on the server and push `Bad_SessionIdInvalid`.
    ///
    /// Returns how many fault handlers ran.
    pub fn invalidate_session(&self, session: &Session) -> usize {
        self.live.lock().remove(session.id());
        tracing::debug!("Server invalidated session {}", session.id());
        self.push_fault(StatusCode::BAD_SESSION_ID_INVALID)
    }

    /// Push a service fault to registered handlers.
    pub fn push_fault(&self, status: StatusCode) -> usize {
        self.faults.dispatch(&ServiceFault::new(status))
    }

    /// Create exchanges started so far
    pub fn create_count(&self) -> u64 {
        self.creates.load(Ordering::SeqCst)
    }

    /// Reactivate exchanges started so far
    pub fn reactivate_count(&self) -> u64 {
        self.reactivations.load(Ordering::SeqCst)
    }

    /// Close exchanges started so far
    pub fn close_count(&self) -> u64 {
        self.closes.load(Ordering::SeqCst)
    }

    /// Sessions the server currently knows.
    pub fn open_sessions(&self) -> usize {
        self.live.lock().len()
    }

    /// Whether the server knows `session`.
    pub fn is_open(&self, session: &Session) -> bool {
        self.live.lock().contains(session.id())
    }

    async fn exchange(&self, script: &Script) -> Result<()> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(SessionError::Transport("server unreachable".to_string()));
        }
        script.lock().pop_front().unwrap_or(Ok(()))
    }
}

impl Default for SimulatedClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionClient for SimulatedClient {
    fn create_and_activate_session(&self) -> ExchangeFuture<'_, Session> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            self.exchange(&self.create_script).await?;

            let session = Session::new(
                Uuid::new_v4().to_string(),
                Uuid::new_v4().simple().to_string(),
                self.session_timeout,
            )
            .with_name(self.session_name.clone())
            .with_max_request_message_size(self.max_request_message_size);

            self.live.lock().insert(session.id().to_string());
            tracing::debug!("Server created session {}", session.id());
            Ok(session)
        })
    }

    fn reactivate_session(&self, session: &Session) -> ExchangeFuture<'_, Session> {
        self.reactivations.fetch_add(1, Ordering::SeqCst);
        let session = session.clone();
        Box::pin(async move {
            self.exchange(&self.reactivate_script).await?;

            if !self.live.lock().contains(session.id()) {
                return Err(SessionError::ServiceFault(StatusCode::BAD_SESSION_ID_INVALID));
            }
            Ok(session)
        })
    }

    fn close_session(&self, session: &Session) -> ExchangeFuture<'_, ()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        let id = session.id().to_string();
        Box::pin(async move {
            self.exchange(&self.close_script).await?;

            if !self.live.lock().remove(&id) {
                return Err(SessionError::ServiceFault(StatusCode::BAD_SESSION_ID_INVALID));
            }
            tracing::debug!("Server closed session {}", id);
            Ok(())
        })
    }

    fn fault_handlers(&self) -> &FaultHandlerRegistry {
        &self.faults
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::FaultAction;

    #[tokio::test]
    async fn test_create_reactivate_close() {
        let client = SimulatedClient::new();

        let session = client.create_and_activate_session().await.unwrap();
        assert_eq!(session.name(), "ua-session");
        assert_eq!(session.revised_timeout(), Duration::from_secs(120));
        assert!(client.is_open(&session));

        let again = client.reactivate_session(&session).await.unwrap();
        assert_eq!(again.id(), session.id());

        client.close_session(&session).await.unwrap();
        assert_eq!(client.open_sessions(), 0);
        assert_eq!(
            (client.create_count(), client.reactivate_count(), client.close_count()),
            (1, 1, 1)
        );
    }

    #[tokio::test]
    async fn test_script_consumed_in_order() {
        let client = SimulatedClient::new();
        client.script_create([
            Err(SessionError::ServiceFault(StatusCode::BAD_TIMEOUT)),
            Ok(()),
        ]);

        let err = client.create_and_activate_session().await.unwrap_err();
        assert_eq!(err.status_code(), Some(StatusCode::BAD_TIMEOUT));
        assert!(client.create_and_activate_session().await.is_ok());
        assert!(client.create_and_activate_session().await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let client = SimulatedClient::new();
        let session = client.create_and_activate_session().await.unwrap();

        client.set_reachable(false);
        assert!(matches!(
            client.reactivate_session(&session).await,
            Err(SessionError::Transport(_))
        ));

        client.set_reachable(true);
        assert!(client.reactivate_session(&session).await.is_ok());
    }

    #[tokio::test]
    async fn test_invalidated_session_cannot_reactivate() {
        let client = SimulatedClient::new();
        let session = client.create_and_activate_session().await.unwrap();
        client.fault_handlers().register(
            |fault| fault.service_result == StatusCode::BAD_SESSION_ID_INVALID,
            |_, _| FaultAction::Keep,
        );

        assert_eq!(client.invalidate_session(&session), 1);
        assert_eq!(
            client.reactivate_session(&session).await.unwrap_err(),
            SessionError::ServiceFault(StatusCode::BAD_SESSION_ID_INVALID)
        );
    }

    #[tokio::test]
    async fn test_close_unknown_session_faults() {
        let client = SimulatedClient::new();
        let stranger = Session::new("nobody", "token", Duration::from_secs(1));
        assert!(client.close_session(&stranger).await.is_err());
        assert_eq!(client.close_count(), 1);
    }
}
