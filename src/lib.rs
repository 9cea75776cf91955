//! # UA Session - Client Session Lifecycle
//!
//! Session lifecycle state machine for an OPC UA-style client. Establishes,
//! activates, monitors, reactivates and closes one logical session on top of
//! a client's secure channel, and gives callers a single future that
//! resolves once the session is usable.
//!
//! ## Features
//!
//! - **Serialized event handling**: one dispatcher task per session, events queued
//! - **Transparent reconnects**: connection loss reactivates the existing session with backoff
//! - **Server invalidation**: `Bad_SessionIdInvalid` faults trigger a full recreate
//! - **Stable futures**: callers keep the same future across reconnects
//! - **Bounded recovery**: optional ceiling on recreate cycles
//!
//! ## Lifecycle
//!
//! ```text
//!  Client                      SessionFsm                          Server
//!    |                             |                                  |
//!    |-- connect() --------------->|---- CreateSession -------------->|
//!    |                             |---- ActivateSession ------------>|
//!    |<-- Session (future) --------|                                  |
//!    |                             |                                  |
//!    |   (connection lost)         |---- ActivateSession (retry) ---->|
//!    |                             |                                  |
//!    |                             |<--- ServiceFault(SessionIdInvalid)
//!    |                             |---- CreateSession -------------->|
//!    |                             |                                  |
//!    |-- close() ----------------->|---- CloseSession --------------->|
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ua_session::{SessionConfig, SessionFsm, SimulatedClient};
//!
//! let client = Arc::new(SimulatedClient::new());
//! let fsm = SessionFsm::new(client.clone(), SessionConfig::default())?;
//!
//! let session = fsm.connect().await?;
//! println!("Session {} active", session.id());
//!
//! // the transport lost its connection; the session is reactivated in place
//! fsm.notify_connection_lost()?;
//!
//! fsm.close().await?;
//! ```
//!
//! ## Modules
//!
//! | Module    | Purpose                                            |
//! |-----------|----------------------------------------------------|
//! | `fsm`     | States, events, dispatcher and the `SessionFsm` handle |
//! | `client`  | `SessionClient` trait and fault handler registry   |
//! | `session` | `Session` value and `SessionFuture`                |
//! | `config`  | TOML / environment configuration                   |
//! | `sim`     | In-memory server for tests and demos               |

pub mod client;
pub mod config;
pub mod error;
pub mod fsm;
pub mod session;
pub mod sim;
pub mod status;

// Re-exports for convenience
pub use client::{FaultAction, FaultHandlerId, FaultHandlerRegistry, ServiceFault, SessionClient};
pub use config::{ReconnectConfig, SessionConfig};
pub use error::{Result, SessionError};
pub use fsm::{
    SessionFsm, SessionState, SessionStateEvent, SessionStatus, StateKind, Transition,
};
pub use session::{Session, SessionFuture};
pub use sim::SimulatedClient;
pub use status::StatusCode;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
