//! Client collaborator boundary.
//!
//! The state machine drives a client but does not own its secure channel,
//! transport, or wire encoding. Everything it needs from the client is the
//! [`SessionClient`] trait: three asynchronous exchanges plus access to the
//! client's [`FaultHandlerRegistry`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │          SessionFsm (dispatcher)          │
//! └───────┬───────────────────────┬──────────┘
//!         │ exchanges             │ register / deregister
//!         ▼                       ▼
//! ┌─────────────────┐   ┌─────────────────────┐
//! │  SessionClient  │   │ FaultHandlerRegistry │◄── server-pushed faults
//! └─────────────────┘   └─────────────────────┘
//! ```

mod fault;

pub use fault::{FaultAction, FaultHandlerId, FaultHandlerRegistry, ServiceFault};

use std::future::Future;
use std::pin::Pin;

use crate::error::Result;
use crate::session::Session;

/// Boxed future returned by client exchanges.
pub type ExchangeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Client operations the session state machine consumes.
///
/// Implementations perform the actual wire exchanges over their secure
/// channel. Failures are returned, never panicked; the state machine decides
/// whether a failure is recoverable.
pub trait SessionClient: Send + Sync {
    /// Create a new session and activate it on the current secure channel.
    fn create_and_activate_session(&self) -> ExchangeFuture<'_, Session>;

    /// Activate an existing session on a (re-)established secure channel.
    ///
    /// The session id is kept; only the channel binding changes.
    fn reactivate_session(&self, session: &Session) -> ExchangeFuture<'_, Session>;

    /// Close `session` on the server.
    fn close_session(&self, session: &Session) -> ExchangeFuture<'_, ()>;

    /// Registry delivering server-pushed service faults.
    fn fault_handlers(&self) -> &FaultHandlerRegistry;

    /// Get the client name for logging.
    fn name(&self) -> &str {
        "client"
    }
}
