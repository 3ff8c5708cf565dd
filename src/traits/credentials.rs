//! Durable credential storage abstraction.
//!
//! The in-memory [`CredentialStore`](crate::auth::CredentialStore) is the
//! source of truth while the process runs; a [`CredentialStorage`] only
//! persists it across restarts.

use async_trait::async_trait;
use thiserror::Error;

use crate::auth::Credential;

/// Credential storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("credential storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("credential file is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("no home directory available for credential storage")]
    NoHomeDirectory,

    #[error("credential storage error: {0}")]
    Other(String),
}

/// Trait for credential persistence.
///
/// Stored under two named keys, `accessToken` and `refreshToken`.
#[async_trait]
pub trait CredentialStorage: Send + Sync {
    /// Load the stored credential.
    ///
    /// Returns `Ok(None)` when nothing has been stored yet.
    async fn load(&self) -> Result<Option<Credential>, StorageError>;

    /// Persist the credential, replacing anything stored before.
    async fn save(&self, credential: &Credential) -> Result<(), StorageError>;

    /// Remove the stored credential. Clearing empty storage is not an error.
    async fn clear(&self) -> Result<(), StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::Other("locked".to_string());
        assert_eq!(err.to_string(), "credential storage error: locked");
        assert_eq!(
            StorageError::NoHomeDirectory.to_string(),
            "no home directory available for credential storage"
        );
    }

    #[test]
    fn test_storage_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: StorageError = io.into();
        assert!(matches!(err, StorageError::Io(_)));
        assert!(err.to_string().contains("denied"));
    }
}
