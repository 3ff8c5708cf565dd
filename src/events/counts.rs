//! Unread notification counters.
//!
//! Personal notifications are tasks, invites, direct messages, and system
//! notices; team notifications are team activity. Status changes are not
//! counted.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::dispatcher::{handler, EventDispatcher, Handler};
use super::envelope::NotificationEventType;

/// Which counter to reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountScope {
    Personal,
    Team,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CountsSnapshot {
    pub personal: u64,
    pub team: u64,
    pub total: u64,
}

const PERSONAL_TYPES: [NotificationEventType; 4] = [
    NotificationEventType::InviteReceived,
    NotificationEventType::TaskReceived,
    NotificationEventType::DirectMessage,
    NotificationEventType::SystemNotification,
];

#[derive(Default)]
pub struct NotificationCounts {
    personal: AtomicU64,
    team: AtomicU64,
    registrations: Mutex<Vec<(NotificationEventType, Handler)>>,
}

impl NotificationCounts {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Start counting envelopes delivered by `dispatcher`.
    pub fn attach(self: &Arc<Self>, dispatcher: &EventDispatcher) {
        let personal = {
            let counts = Arc::clone(self);
            handler(move |_| {
                counts.personal.fetch_add(1, Ordering::Relaxed);
                Ok(())
            })
        };
        let team = {
            let counts = Arc::clone(self);
            handler(move |_| {
                counts.team.fetch_add(1, Ordering::Relaxed);
                Ok(())
            })
        };

        let mut registrations = self
            .registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for event_type in PERSONAL_TYPES {
            dispatcher.on(event_type, Arc::clone(&personal));
            registrations.push((event_type, Arc::clone(&personal)));
        }
        dispatcher.on(NotificationEventType::TeamActivity, Arc::clone(&team));
        registrations.push((NotificationEventType::TeamActivity, team));
    }

    /// Stop counting; the current values are kept.
    pub fn detach(&self, dispatcher: &EventDispatcher) {
        let mut registrations = self
            .registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for (event_type, registered) in registrations.drain(..) {
            dispatcher.off(event_type, &registered);
        }
    }

    pub fn snapshot(&self) -> CountsSnapshot {
        let personal = self.personal.load(Ordering::Relaxed);
        let team = self.team.load(Ordering::Relaxed);
        CountsSnapshot {
            personal,
            team,
            total: personal + team,
        }
    }

    /// Zero one counter, or both when `scope` is `None`.
    pub fn reset(&self, scope: Option<CountScope>) {
        match scope {
            Some(CountScope::Personal) => self.personal.store(0, Ordering::Relaxed),
            Some(CountScope::Team) => self.team.store(0, Ordering::Relaxed),
            None => {
                self.personal.store(0, Ordering::Relaxed);
                self.team.store(0, Ordering::Relaxed);
            }
        }
    }
}

impl fmt::Debug for NotificationCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registered = self
            .registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("NotificationCounts")
            .field("personal", &self.personal.load(Ordering::Relaxed))
            .field("team", &self.team.load(Ordering::Relaxed))
            .field("registrations", &registered)
            .finish()
    }
}
