//! Unified error type for the crate's public operations.

use std::fmt;

use super::auth::AuthError;
use super::category::ErrorCategory;
use super::network::NetworkError;
use super::stream::StreamError;
use crate::traits::{HttpError, StorageError, TransportError};

/// Unified error type.
///
/// Domain errors convert into it with `?`, so operations that touch several
/// layers (the test trigger, hub construction) return a single type.
#[derive(Debug)]
pub enum NotifyError {
    /// Network-related errors (connections, HTTP, timeouts).
    Network(NetworkError),

    /// Credential and session errors.
    Auth(AuthError),

    /// Malformed stream frames.
    Stream(StreamError),

    /// Credential persistence errors.
    Storage(StorageError),

    /// Invalid settings.
    Config { message: String },
}

impl NotifyError {
    /// Get the category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            NotifyError::Network(NetworkError::HttpStatus { status, .. }) if *status >= 500 => {
                ErrorCategory::Server
            }
            NotifyError::Network(_) => ErrorCategory::Network,
            NotifyError::Auth(_) => ErrorCategory::Auth,
            NotifyError::Stream(_) => ErrorCategory::Protocol,
            NotifyError::Storage(_) => ErrorCategory::Storage,
            NotifyError::Config { .. } => ErrorCategory::Configuration,
        }
    }

    /// Check if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            NotifyError::Network(e) => e.is_retryable(),
            _ => self.category().is_retryable(),
        }
    }

    /// Check if the user has to sign in again.
    pub fn requires_reauth(&self) -> bool {
        match self {
            NotifyError::Auth(e) => e.requires_reauth(),
            NotifyError::Network(NetworkError::HttpStatus { status: 401, .. }) => true,
            _ => false,
        }
    }

    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            NotifyError::Network(e) => e.user_message(),
            NotifyError::Auth(e) => e.user_message(),
            NotifyError::Stream(e) => e.user_message(),
            NotifyError::Storage(e) => format!("Could not access stored credentials: {}", e),
            NotifyError::Config { message } => format!("Configuration error: {}", message),
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            NotifyError::Network(e) => e.error_code(),
            NotifyError::Auth(e) => e.error_code(),
            NotifyError::Stream(e) => e.error_code(),
            NotifyError::Storage(_) => "E_STORAGE",
            NotifyError::Config { .. } => "E_CONFIG",
        }
    }

    /// Get the recovery hint for this error's category.
    pub fn recovery_hint(&self) -> &'static str {
        self.category().recovery_hint()
    }
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifyError::Network(e) => write!(f, "{}", e),
            NotifyError::Auth(e) => write!(f, "{}", e),
            NotifyError::Stream(e) => write!(f, "{}", e),
            NotifyError::Storage(e) => write!(f, "{}", e),
            NotifyError::Config { message } => write!(f, "Configuration error: {}", message),
        }
    }
}

impl std::error::Error for NotifyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NotifyError::Network(e) => Some(e),
            NotifyError::Auth(e) => Some(e),
            NotifyError::Stream(e) => Some(e),
            NotifyError::Storage(e) => Some(e),
            NotifyError::Config { .. } => None,
        }
    }
}

// ============================================================================
// From implementations for automatic error conversion
// ============================================================================

impl From<NetworkError> for NotifyError {
    fn from(err: NetworkError) -> Self {
        NotifyError::Network(err)
    }
}

impl From<AuthError> for NotifyError {
    fn from(err: AuthError) -> Self {
        NotifyError::Auth(err)
    }
}

impl From<StreamError> for NotifyError {
    fn from(err: StreamError) -> Self {
        NotifyError::Stream(err)
    }
}

impl From<StorageError> for NotifyError {
    fn from(err: StorageError) -> Self {
        NotifyError::Storage(err)
    }
}

// ============================================================================
// From implementations for trait-level error types
// ============================================================================

impl From<HttpError> for NotifyError {
    fn from(err: HttpError) -> Self {
        let network = match err {
            HttpError::ConnectionFailed(message) => NetworkError::ConnectionFailed {
                url: "unknown".to_string(),
                message,
            },
            HttpError::Timeout(operation) => NetworkError::Timeout {
                operation,
                duration_secs: 30,
            },
            HttpError::ServerError { status, message } => {
                NetworkError::HttpStatus { status, message }
            }
            HttpError::InvalidUrl(url) => NetworkError::InvalidUrl { url },
            other => NetworkError::Other {
                message: other.to_string(),
            },
        };
        NotifyError::Network(network)
    }
}

impl From<TransportError> for NotifyError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Unauthorized { .. } => NotifyError::Auth(AuthError::TokenExpired),
            TransportError::Rejected { status, message } => {
                NotifyError::Network(NetworkError::HttpStatus { status, message })
            }
            TransportError::Connection(message) => {
                NotifyError::Network(NetworkError::ConnectionFailed {
                    url: "stream".to_string(),
                    message,
                })
            }
            TransportError::InvalidUrl(url) => NotifyError::Network(NetworkError::InvalidUrl { url }),
        }
    }
}
