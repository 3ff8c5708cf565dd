//! In-memory credential storage for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::auth::Credential;
use crate::traits::{CredentialStorage, StorageError};

/// In-memory credential storage for testing.
///
/// Clones share state, so a test can keep one handle and give another to the
/// [`CredentialStore`](crate::auth::CredentialStore) under test.
///
/// ```ignore
/// let storage = Arc::new(InMemoryCredentialStorage::new());
/// let store = CredentialStore::new(storage.clone());
/// store.set(Credential::new("access", "refresh")).await;
/// assert_eq!(storage.save_count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryCredentialStorage {
    credential: Arc<Mutex<Option<Credential>>>,
    fail_load: Arc<AtomicBool>,
    fail_save: Arc<AtomicBool>,
    fail_clear: Arc<AtomicBool>,
    saves: Arc<AtomicUsize>,
    clears: Arc<AtomicUsize>,
}

impl InMemoryCredentialStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that already holds `credential`.
    pub fn with_credential(credential: Credential) -> Self {
        let storage = Self::new();
        *storage.slot() = Some(credential);
        storage
    }

    pub fn set_fail_load(&self, fail: bool) {
        self.fail_load.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_save(&self, fail: bool) {
        self.fail_save.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_clear(&self, fail: bool) {
        self.fail_clear.store(fail, Ordering::SeqCst);
    }

    /// What is currently persisted.
    pub fn stored(&self) -> Option<Credential> {
        self.slot().clone()
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Number of successful clears.
    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Credential>> {
        self.credential.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CredentialStorage for InMemoryCredentialStorage {
    async fn load(&self) -> Result<Option<Credential>, StorageError> {
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(StorageError::Other("mock load failure".to_string()));
        }
        Ok(self.stored())
    }

    async fn save(&self, credential: &Credential) -> Result<(), StorageError> {
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(StorageError::Other("mock save failure".to_string()));
        }
        *self.slot() = Some(credential.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        if self.fail_clear.load(Ordering::SeqCst) {
            return Err(StorageError::Other("mock clear failure".to_string()));
        }
        *self.slot() = None;
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_load_clear() {
        let storage = InMemoryCredentialStorage::new();
        assert_eq!(storage.load().await.unwrap(), None);

        let credential = Credential::new("access", "refresh");
        storage.save(&credential).await.unwrap();
        assert_eq!(storage.load().await.unwrap(), Some(credential));
        assert_eq!(storage.save_count(), 1);

        storage.clear().await.unwrap();
        assert_eq!(storage.load().await.unwrap(), None);
        assert_eq!(storage.clear_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_flags() {
        let storage = InMemoryCredentialStorage::with_credential(Credential::new("a", "r"));
        storage.set_fail_load(true);
        storage.set_fail_save(true);
        storage.set_fail_clear(true);

        assert!(storage.load().await.is_err());
        assert!(storage.save(&Credential::new("b", "r")).await.is_err());
        assert!(storage.clear().await.is_err());
        assert_eq!(storage.stored(), Some(Credential::new("a", "r")));
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let storage = InMemoryCredentialStorage::new();
        let handle = storage.clone();
        storage.save(&Credential::new("a", "r")).await.unwrap();
        assert!(handle.stored().is_some());
    }
}
