use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tracing::debug;

pub const CHATS_KEY: &str = "chats";
pub const CURRENT_CHAT_KEY: &str = "currentChatId";
pub const THEME_KEY: &str = "theme";
pub const AUTH_KEY: &str = "auth";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Stored data could not be parsed: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Remote store error: {0}")]
    Remote(String),
}

/// Directory-backed key/value storage. Each key lives in its own file.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    pub async fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes through a temp file so a crash never leaves a half-written value.
    pub async fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root).await?;

        let path = self.path_for(key);
        let tmp = self.root.join(format!(".{}.tmp", key));
        fs::write(&tmp, value).await?;
        fs::rename(&tmp, &path).await?;

        debug!(key, bytes = value.len(), "stored item");
        Ok(())
    }

    pub async fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_set_get_remove() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let storage = LocalStorage::new(dir.path().join("nested"));

        assert_eq!(storage.get_item(THEME_KEY).await?, None);

        storage.set_item(THEME_KEY, "dark").await?;
        assert_eq!(storage.get_item(THEME_KEY).await?.as_deref(), Some("dark"));

        storage.set_item(THEME_KEY, "light").await?;
        assert_eq!(storage.get_item(THEME_KEY).await?.as_deref(), Some("light"));

        storage.remove_item(THEME_KEY).await?;
        assert_eq!(storage.get_item(THEME_KEY).await?, None);

        // Removing twice is fine
        storage.remove_item(THEME_KEY).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_keys_are_independent() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let storage = LocalStorage::new(dir.path());

        storage.set_item(CHATS_KEY, "[]").await?;
        storage.set_item(CURRENT_CHAT_KEY, "abc").await?;

        assert_eq!(storage.get_item(CHATS_KEY).await?.as_deref(), Some("[]"));
        assert_eq!(storage.get_item(CURRENT_CHAT_KEY).await?.as_deref(), Some("abc"));
        assert_eq!(storage.get_item(AUTH_KEY).await?, None);
        Ok(())
    }
}
