//! Stream frame types and frame decoding.
//!
//! Both transports produce [`RawFrame`]s; [`decode_frame`] is the single
//! place that turns a frame into something the connection acts on, so the
//! two strategies deliver identical envelopes.

use crate::error::StreamError;
use crate::events::EventEnvelope;

/// Event name the server sends once the stream is accepted.
pub const CONNECTED_EVENT: &str = "connected";
/// Event name for keep-alive frames.
pub const HEARTBEAT_EVENT: &str = "heartbeat";
/// Event name for frames carrying an envelope.
pub const NOTIFICATION_EVENT: &str = "notification";

/// One classified line of the event-stream text protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum SseLine {
    /// `event: <name>`
    Event(String),
    /// `data: <payload>`
    Data(String),
    /// `id: <id>`
    Id(String),
    /// `: <comment>` or an unrecognized field
    Comment(String),
    /// Blank line, terminates a frame
    Empty,
}

/// A complete frame as received, before interpretation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawFrame {
    /// The `event:` name, if the frame had one.
    pub event: Option<String>,
    /// All `data:` lines joined with `\n`.
    pub data: String,
    pub id: Option<String>,
}

impl RawFrame {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: Some(event.into()),
            data: data.into(),
            id: None,
        }
    }

    /// A frame with no event name, as sent for plain messages.
    pub fn data_only(data: impl Into<String>) -> Self {
        Self {
            event: None,
            data: data.into(),
            id: None,
        }
    }

    pub fn heartbeat() -> Self {
        Self::new(HEARTBEAT_EVENT, "")
    }

    /// Event name for logging; unnamed frames report as `message`.
    pub fn event_name(&self) -> &str {
        self.event.as_deref().unwrap_or("message")
    }
}

/// What a frame means to the connection.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Server acknowledged the stream.
    Connected,
    /// Keep-alive; resets the watchdog and is never dispatched.
    Heartbeat,
    /// An envelope to hand to the dispatcher.
    Notification(EventEnvelope),
}

/// Interpret a frame.
///
/// - `connected` and `heartbeat` are control frames.
/// - `notification` must carry an envelope.
/// - Any other or absent event name is dispatched if it has data, and
///   ignored (`Ok(None)`) if it does not.
pub fn decode_frame(frame: &RawFrame) -> Result<Option<StreamEvent>, StreamError> {
    match frame.event.as_deref() {
        Some(CONNECTED_EVENT) => Ok(Some(StreamEvent::Connected)),
        Some(HEARTBEAT_EVENT) => Ok(Some(StreamEvent::Heartbeat)),
        Some(NOTIFICATION_EVENT) => {
            if frame.data.trim().is_empty() {
                return Err(StreamError::MissingData {
                    event_type: NOTIFICATION_EVENT.to_string(),
                });
            }
            EventEnvelope::from_frame_data(NOTIFICATION_EVENT, &frame.data)
                .map(|envelope| Some(StreamEvent::Notification(envelope)))
        }
        _ if frame.data.trim().is_empty() => Ok(None),
        _ => EventEnvelope::from_frame_data(frame.event_name(), &frame.data)
            .map(|envelope| Some(StreamEvent::Notification(envelope))),
    }
}
