//! Notification envelopes and their delivery to subscribers.

mod counts;
mod dispatcher;
mod envelope;

pub use counts::{CountScope, CountsSnapshot, NotificationCounts};
pub use dispatcher::{
    handler, DispatchReport, EventDispatcher, Handler, HandlerError, HandlerResult,
};
pub use envelope::{
    ActivityNotice, EventEnvelope, NotificationEventType, NotificationPayload, Severity,
    SystemNotice, TeamInvite,
};
