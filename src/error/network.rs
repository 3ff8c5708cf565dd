//! Network-related error types.

use std::fmt;

/// Failures talking to the notification API or holding the stream open.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkError {
    /// Connection to the server failed.
    ConnectionFailed { url: String, message: String },

    /// Request timed out.
    Timeout { operation: String, duration_secs: u64 },

    /// HTTP status error (non-2xx response).
    HttpStatus { status: u16, message: String },

    /// The server ended the stream.
    StreamClosed,

    /// No frame arrived within the heartbeat window.
    HeartbeatTimeout { silent_secs: u64 },

    /// The configured URL could not be used.
    InvalidUrl { url: String },

    /// Generic network error.
    Other { message: String },
}

impl NetworkError {
    /// Check if this error is likely transient and can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            NetworkError::ConnectionFailed { .. } => true,
            NetworkError::Timeout { .. } => true,
            NetworkError::HttpStatus { status, .. } => {
                *status >= 500 || *status == 429 || *status == 408
            }
            NetworkError::StreamClosed => true,
            NetworkError::HeartbeatTimeout { .. } => true,
            NetworkError::InvalidUrl { .. } => false,
            NetworkError::Other { .. } => false,
        }
    }

    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            NetworkError::ConnectionFailed { .. } => {
                "Unable to reach the notification server. Please check your connection."
                    .to_string()
            }
            NetworkError::Timeout { operation, duration_secs } => format!(
                "The {} operation timed out after {} seconds.",
                operation, duration_secs
            ),
            NetworkError::HttpStatus { status, .. } => match *status {
                401 => "Authentication required. Please sign in again.".to_string(),
                403 => "Access denied.".to_string(),
                404 => "The requested resource was not found.".to_string(),
                500..=599 => {
                    "The server is experiencing issues. Please try again later.".to_string()
                }
                _ => format!("The server returned an error (HTTP {}).", status),
            },
            NetworkError::StreamClosed => "The notification stream was closed.".to_string(),
            NetworkError::HeartbeatTimeout { .. } => {
                "The notification stream went silent and will be reopened.".to_string()
            }
            NetworkError::InvalidUrl { url } => format!("'{}' is not a usable URL.", url),
            NetworkError::Other { message } => format!("Network error: {}", message),
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            NetworkError::ConnectionFailed { .. } => "E_NET_CONN",
            NetworkError::Timeout { .. } => "E_NET_TIMEOUT",
            NetworkError::HttpStatus { .. } => "E_NET_HTTP",
            NetworkError::StreamClosed => "E_NET_CLOSED",
            NetworkError::HeartbeatTimeout { .. } => "E_NET_SILENT",
            NetworkError::InvalidUrl { .. } => "E_NET_URL",
            NetworkError::Other { .. } => "E_NET_OTHER",
        }
    }
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::ConnectionFailed { url, message } => {
                write!(f, "Connection failed to '{}': {}", url, message)
            }
            NetworkError::Timeout { operation, duration_secs } => {
                write!(f, "{} timed out after {} seconds", operation, duration_secs)
            }
            NetworkError::HttpStatus { status, message } => {
                write!(f, "HTTP {} error: {}", status, message)
            }
            NetworkError::StreamClosed => write!(f, "Stream closed by server"),
            NetworkError::HeartbeatTimeout { silent_secs } => {
                write!(f, "No stream activity for {} seconds", silent_secs)
            }
            NetworkError::InvalidUrl { url } => write!(f, "Invalid URL: {}", url),
            NetworkError::Other { message } => write!(f, "Network error: {}", message),
        }
    }
}

impl std::error::Error for NetworkError {}
