//! Single-flight credential renewal.
//!
//! Every caller that needs a fresh access token calls
//! [`RenewalCoordinator::renew`]. While a renewal is outstanding, all callers
//! receive clones of the same shared future, so the renewal endpoint is hit
//! once no matter how many requests were rejected at the same moment.
//!
//! The renewal itself runs on its own task. Dropping every handle does not
//! cancel it, and the pending slot is released by a guard owned by that task,
//! so an error or panic cannot leave the slot occupied.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::store::{Credential, CredentialStore};
use crate::error::AuthError;
use crate::traits::{Headers, HttpClient};

/// Why a renewal did not produce a credential.
#[derive(Debug, Clone, PartialEq)]
pub enum RenewalError {
    /// No refresh token is held.
    NoRefreshToken,
    /// The renewal endpoint answered with a non-success status.
    Rejected { status: u16 },
    /// The renewal request never got a response.
    Transport(String),
    /// The response body was not a token pair.
    InvalidResponse(String),
    /// The renewal task ended without a result.
    Interrupted(String),
}

impl fmt::Display for RenewalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenewalError::NoRefreshToken => write!(f, "no refresh token available"),
            RenewalError::Rejected { status } => {
                write!(f, "renewal endpoint returned HTTP {}", status)
            }
            RenewalError::Transport(msg) => write!(f, "renewal request failed: {}", msg),
            RenewalError::InvalidResponse(msg) => {
                write!(f, "renewal response unreadable: {}", msg)
            }
            RenewalError::Interrupted(msg) => write!(f, "renewal interrupted: {}", msg),
        }
    }
}

impl std::error::Error for RenewalError {}

impl From<RenewalError> for AuthError {
    fn from(err: RenewalError) -> Self {
        match err {
            RenewalError::NoRefreshToken => AuthError::RefreshTokenMissing,
            other => AuthError::RenewalFailed {
                message: other.to_string(),
            },
        }
    }
}

pub type RenewalOutcome = Result<Credential, RenewalError>;

/// Handle to the outstanding renewal. Clones resolve to the same outcome.
pub type RenewalFuture = Shared<BoxFuture<'static, RenewalOutcome>>;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenewalResponse {
    access_token: String,
    /// Servers that do not rotate refresh tokens omit it.
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    pending: Option<RenewalFuture>,
}

fn lock_slot(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Empties the slot when the renewal task finishes, however it finishes.
struct SlotRelease {
    slot: Arc<Mutex<Slot>>,
    generation: u64,
}

impl Drop for SlotRelease {
    fn drop(&mut self) {
        let mut slot = lock_slot(&self.slot);
        if slot.generation == self.generation {
            slot.pending = None;
        }
    }
}

pub struct RenewalCoordinator {
    http: Arc<dyn HttpClient>,
    store: Arc<CredentialStore>,
    renewal_url: String,
    slot: Arc<Mutex<Slot>>,
}

impl RenewalCoordinator {
    pub fn new(
        http: Arc<dyn HttpClient>,
        store: Arc<CredentialStore>,
        renewal_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            store,
            renewal_url: renewal_url.into(),
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    pub fn renewal_url(&self) -> &str {
        &self.renewal_url
    }

    /// True while a renewal is outstanding.
    pub fn is_in_flight(&self) -> bool {
        lock_slot(&self.slot).pending.is_some()
    }

    /// Join the outstanding renewal, or start one.
    ///
    /// Must be called within a Tokio runtime. On success the new credential
    /// is already stored when the future resolves; on failure the session has
    /// already been invalidated.
    pub fn renew(&self) -> RenewalFuture {
        let mut slot = lock_slot(&self.slot);
        if let Some(pending) = slot.pending.as_ref() {
            debug!("Joining in-flight credential renewal");
            return pending.clone();
        }

        slot.generation += 1;
        let release = SlotRelease {
            slot: Arc::clone(&self.slot),
            generation: slot.generation,
        };
        let task = tokio::spawn(renew_once(
            Arc::clone(&self.http),
            Arc::clone(&self.store),
            self.renewal_url.clone(),
            release,
        ));

        let pending = async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(e) => Err(RenewalError::Interrupted(e.to_string())),
            }
        }
        .boxed()
        .shared();
        slot.pending = Some(pending.clone());
        pending
    }
}

async fn renew_once(
    http: Arc<dyn HttpClient>,
    store: Arc<CredentialStore>,
    renewal_url: String,
    _release: SlotRelease,
) -> RenewalOutcome {
    match request_renewal(http.as_ref(), &store, &renewal_url).await {
        Ok(credential) => {
            store.set(credential.clone()).await;
            Ok(credential)
        }
        Err(e) => {
            warn!("Credential renewal failed: {}", e);
            store.invalidate().await;
            Err(e)
        }
    }
}

async fn request_renewal(
    http: &dyn HttpClient,
    store: &CredentialStore,
    renewal_url: &str,
) -> RenewalOutcome {
    let current = match store.get() {
        Some(credential) if credential.has_refresh_token() => credential,
        _ => return Err(RenewalError::NoRefreshToken),
    };

    // Built fresh: nothing from the rejected request is carried over.
    let mut headers = Headers::new();
    headers.insert("Content-Type".to_string(), "application/json".to_string());
    let body = serde_json::json!({ "refreshToken": current.refresh_token }).to_string();

    info!("Renewing access token");
    let response = http
        .post(renewal_url, &body, &headers)
        .await
        .map_err(|e| RenewalError::Transport(e.to_string()))?;

    if !response.is_success() {
        return Err(RenewalError::Rejected {
            status: response.status,
        });
    }

    let tokens: RenewalResponse = response
        .json()
        .map_err(|e| RenewalError::InvalidResponse(e.to_string()))?;

    Ok(Credential::new(
        tokens.access_token,
        tokens.refresh_token.unwrap_or(current.refresh_token),
    ))
}
