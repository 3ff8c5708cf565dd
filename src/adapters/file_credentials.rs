//! File-based credential storage adapter.
//!
//! Persists the credential as pretty-printed JSON with the two keys
//! `accessToken` and `refreshToken`, by default at
//! `~/.teamnotify/credentials.json`.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::auth::Credential;
use crate::traits::{CredentialStorage, StorageError};

const CREDENTIALS_DIR: &str = ".teamnotify";
const CREDENTIALS_FILE: &str = "credentials.json";

/// File-based credential storage.
///
/// # Example
///
/// ```ignore
/// use teamnotify::adapters::FileCredentialStorage;
/// use teamnotify::auth::CredentialStore;
///
/// let storage = Arc::new(FileCredentialStorage::new()?);
/// let store = CredentialStore::restore(storage).await;
/// ```
#[derive(Debug, Clone)]
pub struct FileCredentialStorage {
    path: PathBuf,
}

impl FileCredentialStorage {
    /// Storage at the default location under the home directory.
    pub fn new() -> Result<Self, StorageError> {
        let home = dirs::home_dir().ok_or(StorageError::NoHomeDirectory)?;
        Ok(Self::at(home.join(CREDENTIALS_DIR).join(CREDENTIALS_FILE)))
    }

    /// Storage at an explicit file path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CredentialStorage for FileCredentialStorage {
    async fn load(&self) -> Result<Option<Credential>, StorageError> {
        let contents = match tokio::fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let credential: Credential = serde_json::from_slice(&contents)?;
        if credential.access_token.is_empty() {
            return Ok(None);
        }
        Ok(Some(credential))
    }

    async fn save(&self, credential: &Credential) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(credential)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
