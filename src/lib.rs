//! teamnotify - real-time notification client for the team workspace API
//!
//! Keeps one authenticated server-sent-event stream open, renews the
//! session token when it expires, and fans every notification out to
//! per-type handlers.
//!
//! ```ignore
//! use teamnotify::{handler, NotificationEventType, NotificationHub, NotifyConfig};
//!
//! let hub = NotificationHub::builder(NotifyConfig::from_env()).build().await?;
//! hub.on(NotificationEventType::TaskReceived, handler(|envelope| {
//!     println!("new task: {}", envelope.id);
//!     Ok(())
//! }));
//! hub.connect();
//! ```

pub mod adapters;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod hub;
pub mod sse;
pub mod stream;
pub mod traits;

pub use auth::{AuthorizedClient, Credential, CredentialChange, CredentialStore, RenewalCoordinator};
pub use config::{NotifyConfig, TransportKind};
pub use error::{NotifyError, NotifyResult};
pub use events::{handler, EventDispatcher, EventEnvelope, NotificationCounts, NotificationEventType};
pub use hub::{NotificationHub, NotificationHubBuilder};
pub use stream::{ConnectAttempt, ConnectionState, StreamConnection};
