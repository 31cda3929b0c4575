//! Archive service - picks the storage for the current user

use crate::error::{Result, StorageError};
use crate::storage::ArchiveStorage;
use chat_core::{Archive, UserRef};
use std::sync::Arc;

/// Key of the archive kept for anonymous sessions.
pub const LOCAL_ARCHIVE_KEY: &str = "sessions";

/// Loads, stores and drops the session archive.
///
/// Signed-in users go to the remote store under their storage key when one
/// is configured; everyone else uses local storage.
#[derive(Clone)]
pub struct ArchiveService {
    local: Arc<dyn ArchiveStorage>,
    remote: Option<Arc<dyn ArchiveStorage>>,
}

impl ArchiveService {
    pub fn new(local: Arc<dyn ArchiveStorage>) -> Self {
        Self {
            local,
            remote: None,
        }
    }

    pub fn with_remote(mut self, remote: Arc<dyn ArchiveStorage>) -> Self {
        self.remote = Some(remote);
        self
    }

    fn storage_for<'a>(&'a self, user: Option<&'a UserRef>) -> (&'a dyn ArchiveStorage, &'a str) {
        match (user, &self.remote) {
            (Some(user), Some(remote)) => (remote.as_ref(), user.storage_key.as_str()),
            (Some(user), None) => (self.local.as_ref(), user.storage_key.as_str()),
            (None, _) => (self.local.as_ref(), LOCAL_ARCHIVE_KEY),
        }
    }

    /// Load the archive; a missing archive is empty.
    pub async fn load(&self, user: Option<&UserRef>) -> Result<Archive> {
        let (storage, key) = self.storage_for(user);
        match storage.load_archive(key).await {
            Ok(archive) => {
                tracing::info!("Loaded {} archived sessions", archive.len());
                Ok(archive)
            }
            Err(StorageError::NotFound) => Ok(Archive::new()),
            Err(e) => Err(e),
        }
    }

    /// Store `sessions` and return them as persisted.
    pub async fn store(&self, user: Option<&UserRef>, sessions: &Archive) -> Result<Archive> {
        let (storage, key) = self.storage_for(user);
        storage.store_archive(key, sessions).await?;
        tracing::info!("Stored {} archived sessions", sessions.len());
        Ok(sessions.clone())
    }

    /// Remove every archived session and return the now empty archive.
    pub async fn drop_all(&self, user: Option<&UserRef>) -> Result<Archive> {
        let (storage, key) = self.storage_for(user);
        storage.drop_archive(key).await?;
        tracing::info!("Cleared archived sessions");
        Ok(Archive::new())
    }
}
