//! Connection lifecycle states.

use std::fmt;

/// Where the notification stream is in its lifecycle.
///
/// `Closed → Connecting → Open`; any failure or disconnect returns to
/// `Closed`. A scheduled reconnect passes through `Connecting` again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Closed,
    Connecting,
    Open,
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    /// Open or on the way there.
    pub fn is_active(&self) -> bool {
        !matches!(self, ConnectionState::Closed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Closed => "closed",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of asking the connection to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectAttempt {
    /// A session task was started.
    Started,
    /// A session task is already running (open, opening, or backing off).
    AlreadyActive,
    /// Nobody is signed in.
    MissingCredential,
    /// The access token is expired or undecodable; wait for a fresh one.
    CredentialExpired,
}

impl ConnectAttempt {
    pub fn is_started(&self) -> bool {
        matches!(self, ConnectAttempt::Started)
    }
}
