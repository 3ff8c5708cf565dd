//! Typed publish/subscribe for notification envelopes.
//!
//! Handlers are registered per [`NotificationEventType`] and called in
//! registration order. Each call is isolated: a handler that returns an
//! error or panics is logged and the remaining handlers still run.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, error, warn};

use super::envelope::{EventEnvelope, NotificationEventType};

/// Result returned by a subscriber.
pub type HandlerResult = Result<(), HandlerError>;

/// A registered subscriber. Removal compares the `Arc` pointer, so keep a
/// clone of the handle you registered if you intend to call
/// [`EventDispatcher::off`].
pub type Handler = Arc<dyn Fn(&EventEnvelope) -> HandlerResult + Send + Sync>;

/// Wrap a closure as a [`Handler`].
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&EventEnvelope) -> HandlerResult + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Failure reported by a subscriber.
///
/// Any `std::error::Error` converts into it, so handlers can use `?`.
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self {
            message: format!("handler panicked: {}", message),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl<E> From<E> for HandlerError
where
    E: std::error::Error,
{
    fn from(err: E) -> Self {
        HandlerError::new(err.to_string())
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl fmt::Debug for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerError")
            .field("message", &self.message)
            .finish()
    }
}

/// Outcome of one [`EventDispatcher::emit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Mapping from event type to an ordered handler list.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: RwLock<HashMap<NotificationEventType, Vec<Handler>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler for `event_type`.
    ///
    /// The same handler may be registered under several types.
    pub fn on(&self, event_type: NotificationEventType, handler: Handler) {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        handlers.entry(event_type).or_default().push(handler);
    }

    /// Remove the first registration of `handler` under `event_type`.
    ///
    /// Returns false if it was not registered.
    pub fn off(&self, event_type: NotificationEventType, handler: &Handler) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let Some(list) = handlers.get_mut(&event_type) else {
            return false;
        };
        let Some(index) = list.iter().position(|h| Arc::ptr_eq(h, handler)) else {
            return false;
        };
        list.remove(index);
        if list.is_empty() {
            handlers.remove(&event_type);
        }
        true
    }

    /// Invoke every handler registered for `event_type`.
    ///
    /// Iterates over a snapshot taken before the first call, so handlers may
    /// register or remove subscribers without affecting this delivery.
    pub fn emit(&self, event_type: NotificationEventType, envelope: &EventEnvelope) -> DispatchReport {
        let snapshot: Vec<Handler> = {
            let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
            handlers.get(&event_type).cloned().unwrap_or_default()
        };

        if snapshot.is_empty() {
            debug!("No handlers for {} (id {})", event_type, envelope.id);
            return DispatchReport::default();
        }

        let mut report = DispatchReport::default();
        for (index, handler) in snapshot.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| handler(envelope))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(err)) => {
                    report.failed += 1;
                    warn!(
                        "Handler #{} for {} failed (id {}): {}",
                        index, event_type, envelope.id, err
                    );
                }
                Err(payload) => {
                    report.failed += 1;
                    error!(
                        "Handler #{} for {} (id {}): {}",
                        index,
                        event_type,
                        envelope.id,
                        HandlerError::from_panic(payload)
                    );
                }
            }
        }
        report
    }

    /// Emit under the envelope's own type.
    pub fn dispatch(&self, envelope: &EventEnvelope) -> DispatchReport {
        self.emit(envelope.event_type, envelope)
    }

    pub fn handler_count(&self, event_type: NotificationEventType) -> usize {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        handlers.get(&event_type).map_or(0, Vec::len)
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        let counts: HashMap<_, _> = handlers.iter().map(|(k, v)| (*k, v.len())).collect();
        f.debug_struct("EventDispatcher")
            .field("handlers", &counts)
            .finish()
    }
}
