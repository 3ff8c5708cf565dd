//! Notification stream connection: state machine, backoff, and watchdog.

mod backoff;
mod connection;
mod state;

pub use backoff::{Backoff, BackoffConfig};
pub use connection::{StreamConnection, StreamSettings};
pub use state::{ConnectAttempt, ConnectionState};
