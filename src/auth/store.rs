//! The process-wide current credential.
//!
//! [`CredentialStore`] holds the one current [`Credential`] in memory, writes
//! every change through to a [`CredentialStorage`], and broadcasts each change
//! to subscribers. It is the only component that touches durable storage.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use super::token::{decode_claims, is_token_expired, redact_token, TokenClaims};
use crate::error::AuthError;
use crate::traits::CredentialStorage;

const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// An access/refresh token pair. Replaced wholesale on renewal.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
}

impl Credential {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    pub fn claims(&self) -> Result<TokenClaims, AuthError> {
        decode_claims(&self.access_token)
    }

    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.is_empty()
    }
}

// Tokens never reach logs through Debug.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &redact_token(&self.access_token))
            .field("refresh_token", &redact_token(&self.refresh_token))
            .finish()
    }
}

/// Why the credential was cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearReason {
    /// The user signed out.
    SignedOut,
    /// Renewal failed or no refresh token existed; the user must sign in again.
    SessionInvalid,
}

/// Broadcast on every change to the current credential.
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialChange {
    Replaced(Credential),
    Cleared(ClearReason),
}

pub struct CredentialStore {
    current: RwLock<Option<Credential>>,
    storage: Arc<dyn CredentialStorage>,
    changes: broadcast::Sender<CredentialChange>,
    /// Serializes write-through so storage ends in the same state as memory.
    persist: Mutex<()>,
}

impl CredentialStore {
    /// An empty store backed by `storage`. Nothing is loaded.
    pub fn new(storage: Arc<dyn CredentialStorage>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            current: RwLock::new(None),
            storage,
            changes,
            persist: Mutex::new(()),
        }
    }

    /// A store holding whatever `storage` had persisted.
    ///
    /// Unreadable storage is logged and treated as signed out.
    pub async fn restore(storage: Arc<dyn CredentialStorage>) -> Self {
        let loaded = match storage.load().await {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!("Could not load stored credentials: {}", e);
                None
            }
        };
        if loaded.is_some() {
            debug!("Restored stored credential");
        }

        let store = Self::new(storage);
        *store.write_current() = loaded;
        store
    }

    pub fn get(&self) -> Option<Credential> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// True if there is no credential, or its access token expires within
    /// `buffer_secs` or cannot be decoded.
    pub fn is_expired(&self, buffer_secs: i64) -> bool {
        match self.current.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
            Some(credential) => is_token_expired(&credential.access_token, buffer_secs),
            None => true,
        }
    }

    /// Replace the current credential, persist it, and notify subscribers.
    pub async fn set(&self, credential: Credential) {
        let _persist = self.persist.lock().await;
        *self.write_current() = Some(credential.clone());

        if let Err(e) = self.storage.save(&credential).await {
            warn!("Failed to persist credential: {}", e);
        }
        info!(
            "Credential replaced (access token {})",
            redact_token(&credential.access_token)
        );
        let _ = self.changes.send(CredentialChange::Replaced(credential));
    }

    /// Sign out: drop the credential and notify subscribers.
    ///
    /// Does nothing if no credential is held.
    pub async fn clear(&self) {
        self.clear_with(ClearReason::SignedOut, false).await;
    }

    /// Drop the credential because the session can no longer be renewed.
    ///
    /// Always notifies, so listeners see the sign-out signal even if the
    /// credential was already gone.
    pub async fn invalidate(&self) {
        self.clear_with(ClearReason::SessionInvalid, true).await;
    }

    /// Subscribe to credential changes.
    pub fn subscribe(&self) -> broadcast::Receiver<CredentialChange> {
        self.changes.subscribe()
    }

    async fn clear_with(&self, reason: ClearReason, always_notify: bool) {
        let _persist = self.persist.lock().await;
        let previous = self.write_current().take();
        if previous.is_none() && !always_notify {
            debug!("Clear requested with no credential held");
            return;
        }

        if let Err(e) = self.storage.clear().await {
            warn!("Failed to clear persisted credential: {}", e);
        }
        match reason {
            ClearReason::SignedOut => info!("Signed out"),
            ClearReason::SessionInvalid => warn!("Session invalidated; sign-in required"),
        }
        let _ = self.changes.send(CredentialChange::Cleared(reason));
    }

    fn write_current(&self) -> std::sync::RwLockWriteGuard<'_, Option<Credential>> {
        self.current.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("signed_in", &self.is_signed_in())
            .finish()
    }
}
