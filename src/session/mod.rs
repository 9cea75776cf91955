//! Established sessions and the promise callers wait on.
//!
//! A [`Session`] is produced by a successful create + activate exchange and
//! never changes afterwards. A [`SessionFuture`] resolves with that session
//! once it is usable; the same future survives transient reconnects.

mod future;

use std::time::Duration;

pub use future::SessionFuture;

/// An established session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Server-assigned session id
    id: String,
    /// Token attached to every request made within the session
    authentication_token: String,
    /// Session name advertised at creation
    name: String,
    /// Timeout negotiated with the server
    revised_timeout: Duration,
    /// Largest request the server accepts, 0 = unlimited
    max_request_message_size: u32,
}

impl Session {
    /// Create a session from the values returned by the server.
    pub fn new(
        id: impl Into<String>,
        authentication_token: impl Into<String>,
        revised_timeout: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            authentication_token: authentication_token.into(),
            name: String::new(),
            revised_timeout,
            max_request_message_size: 0,
        }
    }

    /// Set the session name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the server's maximum request message size.
    pub fn with_max_request_message_size(mut self, size: u32) -> Self {
        self.max_request_message_size = size;
        self
    }

    /// Get session ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get authentication token
    pub fn authentication_token(&self) -> &str {
        &self.authentication_token
    }

    /// Get session name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Timeout negotiated with the server.
    ///
    /// The server drops the session when no request arrives for this long,
    /// which bounds how long reactivation can keep trying.
    pub fn revised_timeout(&self) -> Duration {
        self.revised_timeout
    }

    /// Get maximum request message size (0 = unlimited)
    pub fn max_request_message_size(&self) -> u32 {
        self.max_request_message_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_builder() {
        let session = Session::new("ns=1;i=42", "token", Duration::from_secs(120))
            .with_name("line-3")
            .with_max_request_message_size(65536);

        assert_eq!(session.id(), "ns=1;i=42");
        assert_eq!(session.authentication_token(), "token");
        assert_eq!(session.name(), "line-3");
        assert_eq!(session.revised_timeout(), Duration::from_secs(120));
        assert_eq!(session.max_request_message_size(), 65536);
    }
}
