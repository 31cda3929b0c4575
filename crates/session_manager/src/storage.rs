//! Archive storage trait and the local file implementation

use crate::error::{Result, StorageError};
use async_trait::async_trait;
use chat_core::Archive;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Archive storage trait
#[async_trait]
pub trait ArchiveStorage: Send + Sync {
    /// Load the archive stored under `key`
    async fn load_archive(&self, key: &str) -> Result<Archive>;

    /// Replace the archive stored under `key`
    async fn store_archive(&self, key: &str, archive: &Archive) -> Result<()>;

    /// Delete the archive stored under `key`; missing archives are not an error
    async fn drop_archive(&self, key: &str) -> Result<()>;
}

/// File-based archive storage, one JSON document per key
#[derive(Clone, Debug)]
pub struct FileArchiveStorage {
    base_path: PathBuf,
}

impl FileArchiveStorage {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    fn archive_path(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.base_path.join(format!("{}.json", file_name))
    }
}

#[async_trait]
impl ArchiveStorage for FileArchiveStorage {
    async fn load_archive(&self, key: &str) -> Result<Archive> {
        let path = self.archive_path(key);

        if !path.exists() {
            return Err(StorageError::NotFound);
        }

        let contents = fs::read_to_string(&path).await?;
        let archive: Archive = serde_json::from_str(&contents)?;

        Ok(archive)
    }

    async fn store_archive(&self, key: &str, archive: &Archive) -> Result<()> {
        fs::create_dir_all(&self.base_path).await?;

        let path = self.archive_path(key);
        let contents = serde_json::to_string_pretty(archive)?;

        fs::write(&path, contents).await?;

        Ok(())
    }

    async fn drop_archive(&self, key: &str) -> Result<()> {
        let path = self.archive_path(key);

        if path.exists() {
            fs::remove_file(&path).await?;
        }

        Ok(())
    }
}
