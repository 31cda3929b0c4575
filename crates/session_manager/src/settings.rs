//! Settings snapshot persistence

use crate::error::Result;
use chat_core::SettingsSnapshot;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Stores the settings snapshot as a single JSON file.
#[derive(Clone, Debug)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the saved snapshot. `None` when nothing has been saved yet.
    pub async fn load(&self) -> Result<Option<SettingsSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path).await?;
        let snapshot: SettingsSnapshot = serde_json::from_str(&contents)?;
        Ok(Some(snapshot.sanitized()))
    }

    pub async fn save(&self, snapshot: &SettingsSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(snapshot)?;
        fs::write(&self.path, contents).await?;
        tracing::debug!("Saved settings to {}", self.path.display());
        Ok(())
    }
}
