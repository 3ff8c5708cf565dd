//! Notification envelope and typed payloads.
//!
//! The server pushes one JSON envelope per notification:
//!
//! ```json
//! {"id":"n-1","type":"invite.received","userId":"u-42",
//!  "data":{"teamName":"Ops","inviterName":"Sam","role":"member"},
//!  "timestamp":"2024-05-01T12:00:00Z","read":false}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::StreamError;

/// The closed set of notification types the server may push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationEventType {
    #[serde(rename = "team.activity")]
    TeamActivity,
    #[serde(rename = "task.received")]
    TaskReceived,
    #[serde(rename = "invite.received")]
    InviteReceived,
    #[serde(rename = "message.direct")]
    DirectMessage,
    #[serde(rename = "system.notification")]
    SystemNotification,
    #[serde(rename = "user.status.changed")]
    UserStatusChanged,
}

impl NotificationEventType {
    pub const ALL: [NotificationEventType; 6] = [
        NotificationEventType::TeamActivity,
        NotificationEventType::TaskReceived,
        NotificationEventType::InviteReceived,
        NotificationEventType::DirectMessage,
        NotificationEventType::SystemNotification,
        NotificationEventType::UserStatusChanged,
    ];

    /// Wire name, e.g. `"team.activity"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationEventType::TeamActivity => "team.activity",
            NotificationEventType::TaskReceived => "task.received",
            NotificationEventType::InviteReceived => "invite.received",
            NotificationEventType::DirectMessage => "message.direct",
            NotificationEventType::SystemNotification => "system.notification",
            NotificationEventType::UserStatusChanged => "user.status.changed",
        }
    }
}

impl fmt::Display for NotificationEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationEventType {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NotificationEventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| StreamError::UnknownEventType {
                event_type: s.to_string(),
            })
    }
}

/// One server-pushed notification. Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: NotificationEventType,
    /// The user the notification is addressed to.
    #[serde(rename = "userId")]
    pub subject: String,
    #[serde(default)]
    pub data: Value,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<bool>,
}

impl EventEnvelope {
    /// Decode an envelope from a frame's `data:` payload.
    ///
    /// `frame_event` is the frame's event name and only feeds error messages.
    pub fn from_frame_data(frame_event: &str, data: &str) -> Result<Self, StreamError> {
        let value: Value = serde_json::from_str(data).map_err(|e| StreamError::InvalidJson {
            event_type: frame_event.to_string(),
            message: e.to_string(),
        })?;

        // Checked separately so an unknown type is reported as such rather
        // than as a generic deserialization failure.
        if let Some(kind) = value.get("type").and_then(Value::as_str) {
            kind.parse::<NotificationEventType>()?;
        }

        serde_json::from_value(value).map_err(|e| StreamError::InvalidJson {
            event_type: frame_event.to_string(),
            message: e.to_string(),
        })
    }

    /// Interpret `data` according to the envelope type.
    pub fn payload(&self) -> NotificationPayload {
        let typed = match self.event_type {
            NotificationEventType::SystemNotification => {
                serde_json::from_value(self.data.clone()).map(NotificationPayload::System)
            }
            NotificationEventType::InviteReceived => {
                serde_json::from_value(self.data.clone()).map(NotificationPayload::InviteReceived)
            }
            NotificationEventType::TeamActivity => {
                serde_json::from_value(self.data.clone()).map(NotificationPayload::TeamActivity)
            }
            _ => return NotificationPayload::Other(self.data.clone()),
        };
        typed.unwrap_or_else(|_| NotificationPayload::Other(self.data.clone()))
    }

    /// True for the types counted as personal rather than team-wide.
    pub fn is_personal(&self) -> bool {
        matches!(
            self.event_type,
            NotificationEventType::TaskReceived
                | NotificationEventType::InviteReceived
                | NotificationEventType::DirectMessage
                | NotificationEventType::SystemNotification
        )
    }
}

/// Typed view of an envelope's `data`.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationPayload {
    System(SystemNotice),
    InviteReceived(TeamInvite),
    TeamActivity(ActivityNotice),
    /// Payload shapes this client does not interpret.
    Other(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SystemNotice {
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamInvite {
    pub team_name: String,
    pub inviter_name: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityNotice {
    pub team_id: String,
    #[serde(default)]
    pub team_name: Option<String>,
    pub activity_type: String,
    #[serde(default)]
    pub activity_title: Option<String>,
    #[serde(default)]
    pub actor_name: Option<String>,
    #[serde(default)]
    pub activity_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope_json(kind: &str, data: Value) -> String {
        json!({
            "id": "n-1",
            "type": kind,
            "userId": "u-42",
            "data": data,
            "timestamp": "2024-05-01T12:00:00Z"
        })
        .to_string()
    }

    #[test]
    fn test_event_type_round_trips_wire_names() {
        for kind in NotificationEventType::ALL {
            assert_eq!(kind.as_str().parse::<NotificationEventType>().unwrap(), kind);
        }
    }

    #[test]
    fn test_from_frame_data_reads_wire_fields() {
        let raw = envelope_json("task.received", json!({"taskId": "t-9"}));
        let envelope = EventEnvelope::from_frame_data("notification", &raw).unwrap();
        assert_eq!(envelope.id, "n-1");
        assert_eq!(envelope.subject, "u-42");
        assert_eq!(envelope.event_type, NotificationEventType::TaskReceived);
        assert_eq!(envelope.read, None);
        assert_eq!(envelope.timestamp.to_rfc3339(), "2024-05-01T12:00:00+00:00");
    }

    #[test]
    fn test_from_frame_data_unknown_type() {
        let raw = envelope_json("billing.updated", json!({}));
        let err = EventEnvelope::from_frame_data("notification", &raw).unwrap_err();
        assert_eq!(
            err,
            StreamError::UnknownEventType {
                event_type: "billing.updated".to_string()
            }
        );
    }

    #[test]
    fn test_from_frame_data_invalid_json() {
        let err = EventEnvelope::from_frame_data("notification", "{not json").unwrap_err();
        assert!(matches!(err, StreamError::InvalidJson { ref event_type, .. } if event_type == "notification"));
    }

    #[test]
    fn test_from_frame_data_missing_fields() {
        let err = EventEnvelope::from_frame_data("message", r#"{"type":"team.activity"}"#)
            .unwrap_err();
        assert!(matches!(err, StreamError::InvalidJson { .. }));
    }

    #[test]
    fn test_system_payload() {
        let raw = envelope_json(
            "system.notification",
            json!({"title": "Maintenance", "message": "Down at 5", "severity": "warning"}),
        );
        let envelope = EventEnvelope::from_frame_data("notification", &raw).unwrap();
        assert_eq!(
            envelope.payload(),
            NotificationPayload::System(SystemNotice {
                title: "Maintenance".to_string(),
                message: "Down at 5".to_string(),
                severity: Severity::Warning,
            })
        );
    }

    #[test]
    fn test_invite_payload() {
        let raw = envelope_json(
            "invite.received",
            json!({"teamName": "Ops", "inviterName": "Sam", "role": "member"}),
        );
        let envelope = EventEnvelope::from_frame_data("notification", &raw).unwrap();
        match envelope.payload() {
            NotificationPayload::InviteReceived(invite) => {
                assert_eq!(invite.team_name, "Ops");
                assert_eq!(invite.role.as_deref(), Some("member"));
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_mismatched_payload_falls_back_to_other() {
        let raw = envelope_json("team.activity", json!({"unexpected": true}));
        let envelope = EventEnvelope::from_frame_data("notification", &raw).unwrap();
        assert_eq!(
            envelope.payload(),
            NotificationPayload::Other(json!({"unexpected": true}))
        );
    }

    #[test]
    fn test_is_personal() {
        let team = EventEnvelope::from_frame_data(
            "notification",
            &envelope_json("team.activity", json!({})),
        )
        .unwrap();
        let direct = EventEnvelope::from_frame_data(
            "notification",
            &envelope_json("message.direct", json!({})),
        )
        .unwrap();
        assert!(!team.is_personal());
        assert!(direct.is_personal());
    }
}
