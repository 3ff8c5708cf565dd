//! Errors for frames received on the notification stream.
//!
//! A frame that fails to decode is logged and dropped; it never tears the
//! connection down.

use std::fmt;

/// Malformed-frame variants.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamError {
    /// Frame data was not valid JSON or not a notification envelope.
    InvalidJson { event_type: String, message: String },

    /// A notification frame arrived without any data lines.
    MissingData { event_type: String },

    /// The envelope names an event type this client does not know.
    UnknownEventType { event_type: String },

    /// A line ran past the decoder's limit before its terminator arrived.
    LineTooLong { limit: usize },
}

impl StreamError {
    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            StreamError::InvalidJson { .. } => "E_STREAM_JSON",
            StreamError::MissingData { .. } => "E_STREAM_EMPTY",
            StreamError::UnknownEventType { .. } => "E_STREAM_TYPE",
            StreamError::LineTooLong { .. } => "E_STREAM_LINE",
        }
    }

    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            StreamError::InvalidJson { event_type, .. } => {
                format!("Received an unreadable '{}' notification.", event_type)
            }
            StreamError::MissingData { event_type } => {
                format!("Received an empty '{}' notification.", event_type)
            }
            StreamError::UnknownEventType { event_type } => {
                format!("Received a notification of unknown type '{}'.", event_type)
            }
            StreamError::LineTooLong { .. } => {
                "Received an oversized notification; it was skipped.".to_string()
            }
        }
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::InvalidJson { event_type, message } => {
                write!(f, "Invalid JSON in '{}' frame: {}", event_type, message)
            }
            StreamError::MissingData { event_type } => {
                write!(f, "Frame '{}' has no data", event_type)
            }
            StreamError::UnknownEventType { event_type } => {
                write!(f, "Unknown notification type: {}", event_type)
            }
            StreamError::LineTooLong { limit } => {
                write!(f, "Stream line exceeds {} bytes", limit)
            }
        }
    }
}

impl std::error::Error for StreamError {}
