//! Error category classification.
//!
//! Categories drive the handling decision at the edges of the crate: whether
//! a failure is worth retrying, whether the user has to sign in again, or
//! whether the configuration needs attention.

use std::fmt;

/// High-level categorization of errors for handling decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Connection, timeout, or stream transport failures.
    /// Generally transient and retryable.
    Network,

    /// Credential and session problems.
    /// Usually resolved by renewal or by signing in again.
    Auth,

    /// The server answered with a 5xx status.
    Server,

    /// Malformed data received from the server.
    /// Not retryable; the offending item is dropped.
    Protocol,

    /// Local credential storage failures.
    Storage,

    /// Missing or invalid settings.
    Configuration,
}

impl ErrorCategory {
    /// Returns true if errors in this category are generally transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCategory::Network | ErrorCategory::Server)
    }

    /// Short label for log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Auth => "auth",
            ErrorCategory::Server => "server",
            ErrorCategory::Protocol => "protocol",
            ErrorCategory::Storage => "storage",
            ErrorCategory::Configuration => "configuration",
        }
    }

    /// Suggested recovery action shown next to the error.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "Check your internet connection and try again",
            ErrorCategory::Auth => "Sign in again to refresh your session",
            ErrorCategory::Server => "The server may be experiencing issues. Please try again later",
            ErrorCategory::Protocol => "The server sent data this client could not understand",
            ErrorCategory::Storage => "Check permissions on the credentials file",
            ErrorCategory::Configuration => "Check the TEAMNOTIFY_* environment variables",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_retryable() {
        assert!(ErrorCategory::Network.is_retryable());
        assert!(ErrorCategory::Server.is_retryable());
        assert!(!ErrorCategory::Auth.is_retryable());
        assert!(!ErrorCategory::Protocol.is_retryable());
        assert!(!ErrorCategory::Storage.is_retryable());
        assert!(!ErrorCategory::Configuration.is_retryable());
    }

    #[test]
    fn test_category_display() {
        assert_eq!(format!("{}", ErrorCategory::Network), "network");
        assert_eq!(format!("{}", ErrorCategory::Protocol), "protocol");
    }

    #[test]
    fn test_recovery_hint_mentions_action() {
        assert!(ErrorCategory::Auth.recovery_hint().contains("Sign in"));
        assert!(ErrorCategory::Configuration
            .recovery_hint()
            .contains("TEAMNOTIFY_"));
    }
}
