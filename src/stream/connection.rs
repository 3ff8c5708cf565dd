//! The long-lived notification stream.
//!
//! [`StreamConnection`] runs one session task at a time. The task opens the
//! transport, feeds decoded envelopes to the [`EventDispatcher`], watches
//! for heartbeat silence, and on failure sleeps through the backoff schedule
//! before trying again. Every state change is checked against a generation
//! counter, so a task that was superseded by `disconnect` can never publish
//! a state or deliver an envelope.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::backoff::{Backoff, BackoffConfig};
use super::state::{ConnectAttempt, ConnectionState};
use crate::auth::{CredentialStore, RenewalCoordinator};
use crate::error::NetworkError;
use crate::events::EventDispatcher;
use crate::sse::{decode_frame, RawFrame, StreamEvent};
use crate::traits::{StreamTransport, TransportError};

/// Tuning for a [`StreamConnection`].
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub stream_url: String,
    /// Tokens expiring within this many seconds count as expired.
    pub expiry_buffer_secs: i64,
    /// Silence longer than this (no frame of any kind) fails the session.
    pub heartbeat_timeout: Duration,
    /// Pause between teardown and reconnect in [`StreamConnection::reconnect`].
    pub settle_delay: Duration,
    pub backoff: BackoffConfig,
}

impl StreamSettings {
    pub fn new(stream_url: impl Into<String>) -> Self {
        Self {
            stream_url: stream_url.into(),
            expiry_buffer_secs: 5,
            heartbeat_timeout: Duration::from_secs(45),
            settle_delay: Duration::from_millis(100),
            backoff: BackoffConfig::default(),
        }
    }
}

#[derive(Default)]
struct Control {
    generation: u64,
    task: Option<JoinHandle<()>>,
    /// Access token the current session task is using.
    access_token: Option<String>,
    /// A refused token already triggered a renewal since the last open.
    auth_renewal_spent: bool,
}

struct Inner {
    transport: Arc<dyn StreamTransport>,
    store: Arc<CredentialStore>,
    renewal: Arc<RenewalCoordinator>,
    dispatcher: Arc<EventDispatcher>,
    settings: StreamSettings,
    state: watch::Sender<ConnectionState>,
    control: Mutex<Control>,
}

/// How one session ended.
enum SessionEnd {
    /// A newer connect or a disconnect took over.
    Superseded,
    /// The server refused the access token.
    AuthRejected { status: u16 },
    /// Transport failure, server close, or heartbeat silence.
    Failed { opened: bool, error: NetworkError },
}

/// Handle to the notification stream. Clones share one connection.
#[derive(Clone)]
pub struct StreamConnection {
    inner: Arc<Inner>,
}

impl StreamConnection {
    pub fn new(
        transport: Arc<dyn StreamTransport>,
        store: Arc<CredentialStore>,
        renewal: Arc<RenewalCoordinator>,
        dispatcher: Arc<EventDispatcher>,
        settings: StreamSettings,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Closed);
        Self {
            inner: Arc::new(Inner {
                transport,
                store,
                renewal,
                dispatcher,
                settings,
                state,
                control: Mutex::new(Control::default()),
            }),
        }
    }

    /// Start a session task unless one is already running.
    ///
    /// Refuses without touching the network when the credential is missing
    /// or expired.
    pub fn connect(&self) -> ConnectAttempt {
        let mut control = self.inner.lock_control();
        if control.task.is_some() {
            debug!("Stream connect ignored; session already active");
            return ConnectAttempt::AlreadyActive;
        }
        let Some(credential) = self.inner.store.get() else {
            debug!("Stream connect refused; not signed in");
            return ConnectAttempt::MissingCredential;
        };
        if self
            .inner
            .store
            .is_expired(self.inner.settings.expiry_buffer_secs)
        {
            info!("Stream connect refused; access token expired, waiting for a fresh credential");
            return ConnectAttempt::CredentialExpired;
        }

        control.generation += 1;
        control.access_token = Some(credential.access_token);
        let generation = control.generation;
        self.inner.publish(ConnectionState::Connecting);
        control.task = Some(tokio::spawn(run(Arc::clone(&self.inner), generation)));
        ConnectAttempt::Started
    }

    /// Tear down the session, cancelling any pending reconnect.
    ///
    /// Returns false when there was nothing to tear down.
    pub fn disconnect(&self) -> bool {
        let mut control = self.inner.lock_control();
        control.generation += 1;
        let task = control.task.take();
        control.access_token = None;
        control.auth_renewal_spent = false;
        self.inner.publish(ConnectionState::Closed);
        drop(control);

        match task {
            Some(task) => {
                task.abort();
                info!("Notification stream disconnected");
                true
            }
            None => false,
        }
    }

    /// Disconnect, wait for the settle delay, then connect with a fresh
    /// backoff schedule.
    pub async fn reconnect(&self) -> ConnectAttempt {
        self.disconnect();
        tokio::time::sleep(self.inner.settings.settle_delay).await;
        self.connect()
    }

    pub fn status(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Receiver that observes every state transition.
    pub fn status_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// True while a session task (open, opening, or backing off) exists.
    pub fn is_active(&self) -> bool {
        self.inner.lock_control().task.is_some()
    }

    /// Access token of the active session, if any.
    pub fn session_token(&self) -> Option<String> {
        self.inner.lock_control().access_token.clone()
    }

    pub fn transport_name(&self) -> &'static str {
        self.inner.transport.name()
    }
}

impl Inner {
    fn lock_control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish without notifying when the state is unchanged.
    fn publish(&self, next: ConnectionState) {
        self.state.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            debug!("Stream state {} -> {}", state, next);
            *state = next;
            true
        });
    }

    /// Publish only if `generation` still owns the connection.
    fn publish_if_current(&self, generation: u64, next: ConnectionState) -> bool {
        let control = self.lock_control();
        if control.generation != generation {
            return false;
        }
        self.publish(next);
        true
    }

    /// Record the token for the next attempt and mark it connecting.
    fn begin_attempt(&self, generation: u64, access_token: &str) -> bool {
        let mut control = self.lock_control();
        if control.generation != generation {
            return false;
        }
        control.access_token = Some(access_token.to_string());
        self.publish(ConnectionState::Connecting);
        true
    }

    /// Publish `open` for `generation` and re-arm token-refusal recovery.
    fn mark_open(&self, generation: u64) -> bool {
        let mut control = self.lock_control();
        if control.generation != generation {
            return false;
        }
        control.auth_renewal_spent = false;
        self.publish(ConnectionState::Open);
        true
    }

    /// True the first time a refused token may be answered with a renewal.
    fn claim_auth_renewal(&self) -> bool {
        let mut control = self.lock_control();
        !std::mem::replace(&mut control.auth_renewal_spent, true)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock_control().generation == generation
    }

    /// Release the connection from a task that is about to exit.
    fn finish(&self, generation: u64) {
        let mut control = self.lock_control();
        if control.generation == generation {
            control.task = None;
            control.access_token = None;
            self.publish(ConnectionState::Closed);
        }
    }

    fn usable_token(&self) -> Option<String> {
        if self.store.is_expired(self.settings.expiry_buffer_secs) {
            return None;
        }
        self.store.get().map(|credential| credential.access_token)
    }

    async fn run_session(&self, generation: u64, access_token: &str) -> SessionEnd {
        let timeout = self.settings.heartbeat_timeout;
        let opened = tokio::time::timeout(
            timeout,
            self.transport.open(&self.settings.stream_url, access_token),
        )
        .await;

        let mut frames = match opened {
            Err(_) => {
                return SessionEnd::Failed {
                    opened: false,
                    error: NetworkError::Timeout {
                        operation: "stream open".to_string(),
                        duration_secs: timeout.as_secs(),
                    },
                }
            }
            Ok(Err(e)) => return self.failure(false, e),
            Ok(Ok(frames)) => frames,
        };

        // An open that lands after disconnect must not resurrect the stream
        if !self.mark_open(generation) {
            debug!("Discarding stream opened after disconnect");
            return SessionEnd::Superseded;
        }
        info!("Notification stream open via {}", self.transport.name());

        loop {
            match tokio::time::timeout(timeout, frames.next()).await {
                Err(_) => {
                    warn!(
                        "No frames for {}s; treating stream as dead",
                        timeout.as_secs()
                    );
                    return SessionEnd::Failed {
                        opened: true,
                        error: NetworkError::HeartbeatTimeout {
                            silent_secs: timeout.as_secs(),
                        },
                    };
                }
                Ok(None) => {
                    return SessionEnd::Failed {
                        opened: true,
                        error: NetworkError::StreamClosed,
                    }
                }
                Ok(Some(Err(e))) => return self.failure(true, e),
                Ok(Some(Ok(frame))) => {
                    if !self.is_current(generation) {
                        return SessionEnd::Superseded;
                    }
                    self.deliver(&frame);
                }
            }
        }
    }

    fn failure(&self, opened: bool, err: TransportError) -> SessionEnd {
        if let Some(status) = err.auth_status() {
            return SessionEnd::AuthRejected { status };
        }
        SessionEnd::Failed {
            opened,
            error: NetworkError::ConnectionFailed {
                url: self.settings.stream_url.clone(),
                message: err.to_string(),
            },
        }
    }

    fn deliver(&self, frame: &RawFrame) {
        match decode_frame(frame) {
            Ok(Some(StreamEvent::Connected)) => debug!("Stream acknowledged by server"),
            Ok(Some(StreamEvent::Heartbeat)) => trace!("Heartbeat"),
            Ok(Some(StreamEvent::Notification(envelope))) => {
                let report = self.dispatcher.dispatch(&envelope);
                debug!(
                    "Delivered {} ({}) to {} handler(s), {} failed",
                    envelope.id, envelope.event_type, report.delivered, report.failed
                );
            }
            Ok(None) => trace!("Ignoring empty {} frame", frame.event_name()),
            Err(e) => warn!("Dropping malformed {} frame: {}", frame.event_name(), e),
        }
    }
}

async fn run(inner: Arc<Inner>, generation: u64) {
    let mut backoff = Backoff::new(inner.settings.backoff.clone());

    loop {
        let Some(token) = inner.usable_token() else {
            info!("Access token missing or expired; stream waits for a fresh credential");
            inner.finish(generation);
            return;
        };
        if !inner.begin_attempt(generation, &token) {
            return;
        }

        let (opened, error) = match inner.run_session(generation, &token).await {
            SessionEnd::Superseded => return,
            SessionEnd::AuthRejected { status } => {
                if inner.is_current(generation) && inner.claim_auth_renewal() {
                    info!("Stream refused the access token; requesting renewal");
                    inner.finish(generation);
                    // Renewal runs on its own task; the replaced credential
                    // reaches the lifecycle hook, which reconnects.
                    drop(inner.renewal.renew());
                    return;
                }
                // Already renewed once since the last open.
                (
                    false,
                    NetworkError::HttpStatus {
                        status,
                        message: "stream refused the renewed access token".to_string(),
                    },
                )
            }
            SessionEnd::Failed { opened, error } => (opened, error),
        };

        if opened {
            backoff.reset();
        }
        if !inner.publish_if_current(generation, ConnectionState::Closed) {
            return;
        }
        let Some(delay) = backoff.next_delay() else {
            warn!(
                "Stream failed ({}); giving up after {} attempts",
                error,
                backoff.max_attempts()
            );
            inner.finish(generation);
            return;
        };
        warn!(
            "Stream failed ({}); reconnecting in {}ms (attempt {}/{})",
            error,
            delay.as_millis(),
            backoff.attempt(),
            backoff.max_attempts()
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{
        InMemoryCredentialStorage, MockHttpClient, MockResponse, MockSession, MockTransport,
    };
    use crate::auth::Credential;
    use crate::events::{handler, NotificationEventType};
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use chrono::Utc;
    use serde_json::json;

    const STREAM_URL: &str = "http://api.test/v0/notifications/stream";
    const RENEW_URL: &str = "http://api.test/v0/auth/refresh";
    const ENVELOPE: &str = r#"{"id":"n-1","type":"task.received","userId":"u-1","data":{},"timestamp":"2024-05-01T12:00:00Z"}"#;

    fn token_expiring_in(secs: i64) -> String {
        let exp = Utc::now().timestamp() + secs;
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode("{}"),
            URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{},"sub":"u-1"}}"#, exp))
        )
    }

    struct Fixture {
        transport: MockTransport,
        http: MockHttpClient,
        store: Arc<CredentialStore>,
        dispatcher: Arc<EventDispatcher>,
        connection: StreamConnection,
    }

    fn fixture(settings: StreamSettings) -> Fixture {
        let transport = MockTransport::new();
        let http = MockHttpClient::new();
        let store = Arc::new(CredentialStore::new(Arc::new(InMemoryCredentialStorage::new())));
        let renewal = Arc::new(RenewalCoordinator::new(
            Arc::new(http.clone()),
            Arc::clone(&store),
            RENEW_URL,
        ));
        let dispatcher = Arc::new(EventDispatcher::new());
        let connection = StreamConnection::new(
            Arc::new(transport.clone()),
            Arc::clone(&store),
            renewal,
            Arc::clone(&dispatcher),
            settings,
        );
        Fixture {
            transport,
            http,
            store,
            dispatcher,
            connection,
        }
    }

    async fn signed_in(settings: StreamSettings) -> Fixture {
        let f = fixture(settings);
        f.store
            .set(Credential::new(token_expiring_in(3600), "refresh-1"))
            .await;
        f
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_without_credential_is_refused() {
        let f = fixture(StreamSettings::new(STREAM_URL));
        assert_eq!(f.connection.connect(), ConnectAttempt::MissingCredential);
        assert_eq!(f.connection.status(), ConnectionState::Closed);
        assert_eq!(f.transport.open_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_credential_never_opens_transport() {
        let f = fixture(StreamSettings::new(STREAM_URL));
        f.store
            .set(Credential::new(token_expiring_in(-10), "refresh-1"))
            .await;

        assert_eq!(f.connection.connect(), ConnectAttempt::CredentialExpired);
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(f.connection.status(), ConnectionState::Closed);
        assert_eq!(f.transport.open_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_delivers_notifications_but_not_heartbeats() {
        let f = signed_in(StreamSettings::new(STREAM_URL)).await;
        f.transport.push_session(MockSession::Hold(vec![
            RawFrame::new("connected", "{}"),
            RawFrame::heartbeat(),
            RawFrame::new("notification", ENVELOPE),
            RawFrame::heartbeat(),
        ]));
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        f.dispatcher.on(
            NotificationEventType::TaskReceived,
            handler(move |envelope| {
                sink.lock().unwrap().push(envelope.id.clone());
                Ok(())
            }),
        );

        assert_eq!(f.connection.connect(), ConnectAttempt::Started);
        settle().await;

        assert_eq!(f.connection.status(), ConnectionState::Open);
        assert_eq!(*received.lock().unwrap(), vec!["n-1".to_string()]);
        assert_eq!(f.transport.opens()[0].url, STREAM_URL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_frame_does_not_close_stream() {
        let f = signed_in(StreamSettings::new(STREAM_URL)).await;
        let (tx, session) = MockSession::channel();
        f.transport.push_session(session);
        let count = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&count);
        f.dispatcher.on(
            NotificationEventType::TaskReceived,
            handler(move |_| {
                *sink.lock().unwrap() += 1;
                Ok(())
            }),
        );

        f.connection.connect();
        tx.send(Ok(RawFrame::new("notification", "{not json"))).unwrap();
        tx.send(Ok(RawFrame::new("notification", ENVELOPE))).unwrap();
        settle().await;

        assert_eq!(*count.lock().unwrap(), 1);
        assert_eq!(f.connection.status(), ConnectionState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_connect_is_already_active() {
        let f = signed_in(StreamSettings::new(STREAM_URL)).await;
        f.transport.push_session(MockSession::Hold(vec![]));

        assert_eq!(f.connection.connect(), ConnectAttempt::Started);
        assert_eq!(f.connection.connect(), ConnectAttempt::AlreadyActive);
        settle().await;
        assert_eq!(f.transport.open_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_is_idempotent() {
        let f = signed_in(StreamSettings::new(STREAM_URL)).await;
        f.transport.push_session(MockSession::Hold(vec![]));
        f.connection.connect();
        settle().await;

        let mut states = f.connection.status_receiver();
        states.borrow_and_update();

        assert!(f.connection.disconnect());
        assert!(states.has_changed().unwrap());
        states.borrow_and_update();

        assert!(!f.connection.disconnect());
        assert!(!states.has_changed().unwrap());
        assert_eq!(f.connection.status(), ConnectionState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cancels_pending_reconnect() {
        let f = signed_in(StreamSettings::new(STREAM_URL)).await;
        f.transport.push_session(MockSession::Frames(vec![]));
        f.connection.connect();
        settle().await;
        assert_eq!(f.transport.open_count(), 1);

        f.connection.disconnect();
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(f.transport.open_count(), 1);
        assert_eq!(f.connection.status(), ConnectionState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_open_after_disconnect_is_discarded() {
        let f = signed_in(StreamSettings::new(STREAM_URL)).await;
        f.transport.set_open_delay(Duration::from_secs(5));
        f.transport.push_session(MockSession::Hold(vec![]));

        f.connection.connect();
        settle().await;
        assert_eq!(f.connection.status(), ConnectionState::Connecting);

        f.connection.disconnect();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(f.connection.status(), ConnectionState::Closed);
        assert!(!f.connection.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_silence_triggers_reconnect() {
        let mut settings = StreamSettings::new(STREAM_URL);
        settings.heartbeat_timeout = Duration::from_secs(45);
        let f = signed_in(settings).await;
        f.transport.push_session(MockSession::Hold(vec![RawFrame::heartbeat()]));
        f.transport.push_session(MockSession::Hold(vec![]));

        f.connection.connect();
        settle().await;
        assert_eq!(f.transport.open_count(), 1);

        tokio::time::sleep(Duration::from_secs(44)).await;
        assert_eq!(f.transport.open_count(), 1);

        // 45s of silence, then the 1s base backoff
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(f.transport.open_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_gives_up_and_manual_reconnect_resets() {
        let mut settings = StreamSettings::new(STREAM_URL);
        settings.backoff = BackoffConfig {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(4),
            max_attempts: 3,
        };
        let f = signed_in(settings).await;

        f.connection.connect();
        tokio::time::sleep(Duration::from_secs(60)).await;

        // First try plus three retries
        assert_eq!(f.transport.open_count(), 4);
        assert!(!f.connection.is_active());
        assert_eq!(f.connection.status(), ConnectionState::Closed);

        assert_eq!(f.connection.reconnect().await, ConnectAttempt::Started);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(f.transport.open_count(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_rejection_renews_instead_of_backing_off() {
        let f = signed_in(StreamSettings::new(STREAM_URL)).await;
        f.http.set_response(
            RENEW_URL,
            MockResponse::json(
                200,
                json!({"accessToken": token_expiring_in(3600), "refreshToken": "refresh-2"}),
            ),
        );
        f.transport
            .push_session(MockSession::Reject(TransportError::Unauthorized { status: 401 }));

        f.connection.connect();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(f.http.request_count(RENEW_URL), 1);
        assert_eq!(f.transport.open_count(), 1);
        assert_eq!(f.connection.status(), ConnectionState::Closed);
        assert_eq!(f.store.get().unwrap().refresh_token, "refresh-2");
    }

    fn renewal_succeeds(f: &Fixture) {
        f.http.set_response(
            RENEW_URL,
            MockResponse::json(
                200,
                json!({"accessToken": token_expiring_in(3600), "refreshToken": "refresh-2"}),
            ),
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_refusal_backs_off_instead_of_renewing() {
        let f = signed_in(StreamSettings::new(STREAM_URL)).await;
        renewal_succeeds(&f);
        for _ in 0..20 {
            f.transport
                .push_session(MockSession::Reject(TransportError::Unauthorized { status: 401 }));
        }

        f.connection.connect();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(f.http.request_count(RENEW_URL), 1);

        // What the lifecycle hook does when the renewed credential lands.
        assert_eq!(f.connection.connect(), ConnectAttempt::Started);
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(f.http.request_count(RENEW_URL), 1);
        assert_eq!(f.transport.open_count(), 7);
        assert_eq!(f.connection.status(), ConnectionState::Closed);
        assert!(!f.connection.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_open_rearms_refusal_renewal() {
        let f = signed_in(StreamSettings::new(STREAM_URL)).await;
        renewal_succeeds(&f);
        f.transport
            .push_session(MockSession::Reject(TransportError::Unauthorized { status: 401 }));
        f.transport
            .push_session(MockSession::Frames(vec![RawFrame::heartbeat()]));
        f.transport
            .push_session(MockSession::Reject(TransportError::Unauthorized { status: 403 }));

        f.connection.connect();
        tokio::time::sleep(Duration::from_secs(1)).await;
        f.connection.connect();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(f.http.request_count(RENEW_URL), 2);
        assert_eq!(f.transport.open_count(), 3);
        assert!(!f.connection.is_active());
    }
}
