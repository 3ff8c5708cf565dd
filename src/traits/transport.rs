//! Event-stream transport abstraction.
//!
//! A transport opens one streaming session against the notification
//! endpoint and yields the raw frames it receives. Reconnection, watchdog,
//! and dispatch policy live above it in
//! [`StreamConnection`](crate::stream::StreamConnection), so both transport
//! strategies behave identically from the caller's point of view.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::sse::RawFrame;
use crate::traits::http::{is_auth_status, HttpError};

/// Frames from one open session. The stream ending means the server closed it.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<RawFrame, TransportError>> + Send>>;

/// Transport failures, either while opening or mid-stream.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    /// The server refused the access token (401/403).
    Unauthorized { status: u16 },
    /// The server answered with another non-success status.
    Rejected { status: u16, message: String },
    /// The connection could not be made or was dropped.
    Connection(String),
    /// The stream URL could not be built.
    InvalidUrl(String),
}

impl TransportError {
    /// The refusal status when the failure means the credential needs renewing.
    pub fn auth_status(&self) -> Option<u16> {
        match self {
            TransportError::Unauthorized { status } => Some(*status),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Unauthorized { status } => {
                write!(f, "Stream rejected credential (HTTP {})", status)
            }
            TransportError::Rejected { status, message } => {
                write!(f, "Stream rejected (HTTP {}): {}", status, message)
            }
            TransportError::Connection(msg) => write!(f, "Stream connection failed: {}", msg),
            TransportError::InvalidUrl(msg) => write!(f, "Invalid stream URL: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<HttpError> for TransportError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::ServerError { status, .. } if is_auth_status(status) => {
                TransportError::Unauthorized { status }
            }
            HttpError::ServerError { status, message } => {
                TransportError::Rejected { status, message }
            }
            HttpError::InvalidUrl(msg) => TransportError::InvalidUrl(msg),
            other => TransportError::Connection(other.to_string()),
        }
    }
}

/// Trait for opening a notification stream session.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Open a session at `url` authenticated with `access_token`.
    ///
    /// Returns once the server has accepted the stream. The returned frames
    /// are not yet decoded into notifications.
    async fn open(&self, url: &str, access_token: &str) -> Result<FrameStream, TransportError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}
