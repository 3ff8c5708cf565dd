//! Common test utilities for integration tests.
//!
//! # Example
//!
//! ```ignore
//! let credential = test_credential(3600);
//! let wiring = Wiring::new(InMemoryCredentialStorage::with_credential(credential)).await;
//! ```

#![allow(dead_code)]

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;

use teamnotify::adapters::mock::{InMemoryCredentialStorage, MockHttpClient, MockTransport};
use teamnotify::auth::{Credential, CredentialStore, RenewalCoordinator};
use teamnotify::events::EventDispatcher;
use teamnotify::stream::{StreamConnection, StreamSettings};

pub const STREAM_URL: &str = "http://api.test/v0/notifications/stream";
pub const RENEW_URL: &str = "http://api.test/v0/auth/refresh";

/// Envelope JSON of `event_type` addressed to `u-1`.
pub fn envelope_json(id: &str, event_type: &str) -> String {
    format!(
        r#"{{"id":"{}","type":"{}","userId":"u-1","data":{{"title":"t"}},"timestamp":"2024-05-01T12:00:00Z"}}"#,
        id, event_type
    )
}

/// An unsigned JWT expiring `exp_in` seconds from now, with `extra` appended
/// to the claims object (e.g. `,"sub":"u-1"`).
pub fn make_token(exp_in: i64, extra: &str) -> String {
    let exp = Utc::now().timestamp() + exp_in;
    format!(
        "{}.{}.sig",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"none"}"#),
        URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{}{}}}"#, exp, extra))
    )
}

/// A credential for `u-1` expiring `exp_in` seconds from now.
pub fn test_credential(exp_in: i64) -> Credential {
    Credential::new(make_token(exp_in, r#","sub":"u-1""#), "test-refresh-token")
}

/// Yield enough times for spawned tasks to run to their next await point.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// A stream connection wired to mocks.
pub struct Wiring {
    pub http: MockHttpClient,
    pub transport: MockTransport,
    pub store: Arc<CredentialStore>,
    pub renewal: Arc<RenewalCoordinator>,
    pub dispatcher: Arc<EventDispatcher>,
    pub connection: StreamConnection,
}

impl Wiring {
    pub async fn new(storage: InMemoryCredentialStorage) -> Self {
        Self::with_settings(storage, StreamSettings::new(STREAM_URL)).await
    }

    pub async fn with_settings(storage: InMemoryCredentialStorage, settings: StreamSettings) -> Self {
        let http = MockHttpClient::new();
        let transport = MockTransport::new();
        let store = Arc::new(CredentialStore::restore(Arc::new(storage)).await);
        let renewal = Arc::new(RenewalCoordinator::new(
            Arc::new(http.clone()),
            Arc::clone(&store),
            RENEW_URL,
        ));
        let dispatcher = Arc::new(EventDispatcher::new());
        let connection = StreamConnection::new(
            Arc::new(transport.clone()),
            Arc::clone(&store),
            Arc::clone(&renewal),
            Arc::clone(&dispatcher),
            settings,
        );
        Self {
            http,
            transport,
            store,
            renewal,
            dispatcher,
            connection,
        }
    }
}
