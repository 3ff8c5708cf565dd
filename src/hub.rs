//! Composition root and the UI-facing entry points.
//!
//! [`NotificationHub`] owns the credential store, the renewal coordinator,
//! the dispatcher and the one [`StreamConnection`]. It watches credential
//! changes: a replacement while the stream is active tears it down and
//! reconnects with the new token, and a clear disconnects it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::adapters::{
    ChunkedStreamTransport, EventSourceTransport, FileCredentialStorage, ReqwestHttpClient,
};
use crate::auth::{
    AuthorizedClient, Credential, CredentialChange, CredentialStore, RenewalCoordinator,
    RenewalScheduler,
};
use crate::config::{NotifyConfig, TransportKind};
use crate::error::{AuthError, NetworkError, NotifyResult};
use crate::events::{EventDispatcher, Handler, NotificationEventType};
use crate::stream::{ConnectAttempt, ConnectionState, StreamConnection};
use crate::traits::{CredentialStorage, Headers, HttpClient, StreamTransport};

pub struct NotificationHub {
    config: NotifyConfig,
    http: Arc<dyn HttpClient>,
    store: Arc<CredentialStore>,
    renewal: Arc<RenewalCoordinator>,
    dispatcher: Arc<EventDispatcher>,
    api: AuthorizedClient,
    connection: StreamConnection,
    /// Whether the caller wants the stream up; credential changes only
    /// reconnect while this is set.
    wanted: Arc<AtomicBool>,
    watcher: JoinHandle<()>,
    _scheduler: Option<RenewalScheduler>,
}

impl NotificationHub {
    pub fn builder(config: NotifyConfig) -> NotificationHubBuilder {
        NotificationHubBuilder::new(config)
    }

    /// Start the stream and keep it up across credential changes.
    ///
    /// An expired credential starts a renewal; the stream connects when the
    /// renewed credential arrives.
    pub fn connect(&self) -> ConnectAttempt {
        self.wanted.store(true, Ordering::SeqCst);
        let attempt = self.connection.connect();
        if attempt == ConnectAttempt::CredentialExpired {
            self.renew_in_background();
        }
        attempt
    }

    pub fn disconnect(&self) -> bool {
        self.wanted.store(false, Ordering::SeqCst);
        self.connection.disconnect()
    }

    /// Tear down and reconnect, renewing first if the token has expired.
    pub async fn reconnect(&self) -> ConnectAttempt {
        self.wanted.store(true, Ordering::SeqCst);
        self.connection.disconnect();

        if self.store.is_signed_in() && self.store.is_expired(self.config.expiry_buffer_secs) {
            if let Err(e) = self.renewal.renew().await {
                info!("Reconnect abandoned; renewal failed: {}", e);
                return ConnectAttempt::CredentialExpired;
            }
        }

        tokio::time::sleep(self.config.settle_delay).await;
        self.connection.connect()
    }

    pub fn status(&self) -> ConnectionState {
        self.connection.status()
    }

    pub fn status_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.connection.status_receiver()
    }

    pub fn on(&self, event_type: NotificationEventType, handler: Handler) {
        self.dispatcher.on(event_type, handler);
    }

    pub fn off(&self, event_type: NotificationEventType, handler: &Handler) -> bool {
        self.dispatcher.off(event_type, handler)
    }

    /// The dispatcher, for subscribers that register under several types.
    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    pub async fn sign_in(&self, credential: Credential) {
        self.store.set(credential).await;
    }

    pub async fn sign_out(&self) {
        self.wanted.store(false, Ordering::SeqCst);
        self.connection.disconnect();
        self.store.clear().await;
    }

    pub fn is_signed_in(&self) -> bool {
        self.store.is_signed_in()
    }

    /// The signed-in user's id from the access token.
    pub fn current_user_id(&self) -> Option<String> {
        let claims = self.store.get()?.claims().ok()?;
        claims.user_id().map(str::to_string)
    }

    /// Credential changes, including
    /// [`ClearReason::SessionInvalid`](crate::auth::ClearReason::SessionInvalid)
    /// when renewal fails and the user must sign in again.
    pub fn session_events(&self) -> broadcast::Receiver<CredentialChange> {
        self.store.subscribe()
    }

    /// Client for other API calls, with renew-and-replay on 401/403.
    pub fn api(&self) -> &AuthorizedClient {
        &self.api
    }

    pub fn config(&self) -> &NotifyConfig {
        &self.config
    }

    /// Ask the server to push a test notification to the signed-in user.
    ///
    /// Sent once with the current token; no renewal or retry.
    pub async fn send_test_notification(&self) -> NotifyResult<Value> {
        let credential = self.store.get().ok_or(AuthError::NotAuthenticated)?;
        let claims = credential.claims()?;
        let user_id = claims.user_id().ok_or(AuthError::MissingSubject)?;

        let url = self.config.test_trigger_url(user_id);
        let mut headers = Headers::new();
        headers.insert(
            "Authorization".to_string(),
            format!("Bearer {}", credential.access_token),
        );
        headers.insert("Content-Type".to_string(), "application/json".to_string());

        debug!("Requesting test notification for {}", user_id);
        let response = self.http.post(&url, "{}", &headers).await?;
        if !response.is_success() {
            return Err(NetworkError::HttpStatus {
                status: response.status,
                message: response.text().unwrap_or_default(),
            }
            .into());
        }
        Ok(response.json().unwrap_or(Value::Null))
    }

    fn renew_in_background(&self) {
        if self.store.get().is_some_and(|c| c.has_refresh_token()) {
            debug!("Access token expired; renewing before connecting");
            drop(self.renewal.renew());
        }
    }
}

impl Drop for NotificationHub {
    fn drop(&mut self) {
        self.watcher.abort();
        self.connection.disconnect();
    }
}

/// Reconnects or disconnects the stream as the credential changes.
async fn watch_credentials(
    mut changes: broadcast::Receiver<CredentialChange>,
    store: Arc<CredentialStore>,
    connection: StreamConnection,
    wanted: Arc<AtomicBool>,
) {
    loop {
        match changes.recv().await {
            Ok(CredentialChange::Replaced(credential)) => {
                if !wanted.load(Ordering::SeqCst) {
                    continue;
                }
                if connection.session_token().as_deref() == Some(credential.access_token.as_str())
                {
                    debug!("Stream already uses the replaced credential");
                } else if connection.is_active() {
                    info!("Credential replaced; reconnecting stream");
                    connection.reconnect().await;
                } else {
                    connection.connect();
                }
            }
            Ok(CredentialChange::Cleared(reason)) => {
                info!("Credential cleared ({:?}); closing stream", reason);
                connection.disconnect();
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!("Missed {} credential changes; resynchronizing", missed);
                if !store.is_signed_in() {
                    connection.disconnect();
                } else if wanted.load(Ordering::SeqCst) {
                    connection.reconnect().await;
                }
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

/// Builds a [`NotificationHub`], defaulting each seam to its production
/// adapter.
///
/// ```ignore
/// let hub = NotificationHub::builder(NotifyConfig::from_env()).build().await?;
/// hub.on(NotificationEventType::TaskReceived, handler(|envelope| {
///     println!("{}", envelope.id);
///     Ok(())
/// }));
/// hub.connect();
/// ```
pub struct NotificationHubBuilder {
    config: NotifyConfig,
    http: Option<Arc<dyn HttpClient>>,
    storage: Option<Arc<dyn CredentialStorage>>,
    transport: Option<Arc<dyn StreamTransport>>,
    proactive_renewal: bool,
}

impl NotificationHubBuilder {
    pub fn new(config: NotifyConfig) -> Self {
        Self {
            config,
            http: None,
            storage: None,
            transport: None,
            proactive_renewal: true,
        }
    }

    pub fn with_http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn CredentialStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn StreamTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Disable renewing ahead of expiry.
    pub fn without_proactive_renewal(mut self) -> Self {
        self.proactive_renewal = false;
        self
    }

    /// Restore the stored credential and start the background tasks.
    ///
    /// Must be called within a tokio runtime.
    pub async fn build(self) -> NotifyResult<NotificationHub> {
        let config = self.config;
        let http: Arc<dyn HttpClient> = match self.http {
            Some(http) => http,
            None => Arc::new(ReqwestHttpClient::new()),
        };
        let storage: Arc<dyn CredentialStorage> = match self.storage {
            Some(storage) => storage,
            None => match &config.credentials_path {
                Some(path) => Arc::new(FileCredentialStorage::at(path)),
                None => Arc::new(FileCredentialStorage::new()?),
            },
        };
        let transport: Arc<dyn StreamTransport> = match self.transport {
            Some(transport) => transport,
            None => match config.transport {
                TransportKind::EventSource => Arc::new(EventSourceTransport::new()),
                TransportKind::ChunkedStream => {
                    Arc::new(ChunkedStreamTransport::new(Arc::clone(&http)))
                }
            },
        };

        let store = Arc::new(CredentialStore::restore(storage).await);
        let renewal = Arc::new(RenewalCoordinator::new(
            Arc::clone(&http),
            Arc::clone(&store),
            config.renewal_url(),
        ));
        let dispatcher = Arc::new(EventDispatcher::new());
        let connection = StreamConnection::new(
            transport,
            Arc::clone(&store),
            Arc::clone(&renewal),
            Arc::clone(&dispatcher),
            config.stream_settings(),
        );
        let api = AuthorizedClient::new(
            Arc::clone(&http),
            Arc::clone(&store),
            Arc::clone(&renewal),
            config.api_base_url.clone(),
        );

        let wanted = Arc::new(AtomicBool::new(false));
        let watcher = tokio::spawn(watch_credentials(
            store.subscribe(),
            Arc::clone(&store),
            connection.clone(),
            Arc::clone(&wanted),
        ));
        let scheduler = self.proactive_renewal.then(|| {
            RenewalScheduler::spawn(
                Arc::clone(&store),
                Arc::clone(&renewal),
                config.proactive_refresh_lead,
            )
        });

        info!(
            "Notification hub ready ({} transport, {})",
            connection.transport_name(),
            config.api_base_url
        );

        Ok(NotificationHub {
            config,
            http,
            store,
            renewal,
            dispatcher,
            api,
            connection,
            wanted,
            watcher,
            _scheduler: scheduler,
        })
    }
}
