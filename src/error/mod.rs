//! Error handling for the notification client.
//!
//! - **Error Categories**: High-level classification for handling decisions
//! - **Domain-specific Errors**: Network, Auth, and Stream errors
//! - **Unified Error Type**: `NotifyError` consolidates them with storage and config errors
//! - **Result Type Alias**: `NotifyResult<T>` for consistent return types
//!
//! | Category | Description | Retryable |
//! |----------|-------------|-----------|
//! | Network | Connection, timeout, stream drop | Yes |
//! | Auth | Credential and session issues | No |
//! | Server | Backend errors (5xx) | Yes |
//! | Protocol | Malformed frames | No |
//! | Storage | Credential file errors | No |
//! | Configuration | Config issues | No |

mod auth;
mod category;
mod network;
mod notify_error;
mod result;
mod stream;

pub use auth::AuthError;
pub use category::ErrorCategory;
pub use network::NetworkError;
pub use notify_error::NotifyError;
pub use result::NotifyResult;
pub use stream::StreamError;

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn test_error_unification() {
        let errors: Vec<NotifyError> = vec![
            NetworkError::Timeout {
                operation: "renewal".to_string(),
                duration_secs: 30,
            }
            .into(),
            AuthError::NotAuthenticated.into(),
            StreamError::MissingData {
                event_type: "notification".to_string(),
            }
            .into(),
        ];

        let categories: Vec<ErrorCategory> = errors.iter().map(|e| e.category()).collect();
        assert_eq!(
            categories,
            vec![
                ErrorCategory::Network,
                ErrorCategory::Auth,
                ErrorCategory::Protocol
            ]
        );
    }

    #[test]
    fn test_question_mark_conversion() {
        fn subject() -> Result<String, AuthError> {
            Err(AuthError::MissingSubject)
        }

        fn fails() -> NotifyResult<String> {
            let user = subject()?;
            Ok(user)
        }

        let err = fails().unwrap_err();
        assert_eq!(err.error_code(), "E_AUTH_SUBJECT");
    }
}
