//! Authentication-related error types.

use std::fmt;

/// Credential and session error variants.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthError {
    /// No credential is held (user not signed in).
    NotAuthenticated,

    /// Access token is expired or within the expiry buffer.
    TokenExpired,

    /// Access token could not be decoded.
    MalformedToken { message: String },

    /// Renewal was requested but no refresh token is stored.
    RefreshTokenMissing,

    /// The renewal endpoint rejected the refresh token or failed.
    RenewalFailed { message: String },

    /// The session was invalidated and the user must sign in again.
    SessionInvalid,

    /// The access token carries no user identifier.
    MissingSubject,
}

impl AuthError {
    /// Check if this error can only be resolved by signing in again.
    pub fn requires_reauth(&self) -> bool {
        matches!(
            self,
            AuthError::NotAuthenticated
                | AuthError::RefreshTokenMissing
                | AuthError::RenewalFailed { .. }
                | AuthError::SessionInvalid
        )
    }

    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::NotAuthenticated => {
                "You are not signed in. Please sign in to continue.".to_string()
            }
            AuthError::TokenExpired => "Your session has expired.".to_string(),
            AuthError::MalformedToken { .. } => {
                "Your access token is invalid. Please sign in again.".to_string()
            }
            AuthError::RefreshTokenMissing | AuthError::RenewalFailed { .. } => {
                "Your session could not be renewed. Please sign in again.".to_string()
            }
            AuthError::SessionInvalid => {
                "Your session has ended. Please sign in again.".to_string()
            }
            AuthError::MissingSubject => {
                "Your access token does not identify a user.".to_string()
            }
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::NotAuthenticated => "E_AUTH_NONE",
            AuthError::TokenExpired => "E_AUTH_EXPIRED",
            AuthError::MalformedToken { .. } => "E_AUTH_MALFORMED",
            AuthError::RefreshTokenMissing => "E_AUTH_NO_REFRESH",
            AuthError::RenewalFailed { .. } => "E_AUTH_RENEW",
            AuthError::SessionInvalid => "E_AUTH_SESSION",
            AuthError::MissingSubject => "E_AUTH_SUBJECT",
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::NotAuthenticated => write!(f, "Not authenticated"),
            AuthError::TokenExpired => write!(f, "Access token expired"),
            AuthError::MalformedToken { message } => {
                write!(f, "Malformed access token: {}", message)
            }
            AuthError::RefreshTokenMissing => write!(f, "No refresh token available"),
            AuthError::RenewalFailed { message } => {
                write!(f, "Credential renewal failed: {}", message)
            }
            AuthError::SessionInvalid => write!(f, "Session invalidated"),
            AuthError::MissingSubject => write!(f, "Access token has no subject claim"),
        }
    }
}

impl std::error::Error for AuthError {}
