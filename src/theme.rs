use serde::Deserialize;
use tracing::warn;

use crate::storage::{LocalStorage, THEME_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Dark,
    Light,
}

impl ThemeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThemeMode::Dark => "dark",
            ThemeMode::Light => "light",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "dark" => Some(ThemeMode::Dark),
            "light" => Some(ThemeMode::Light),
            _ => None,
        }
    }
}

/// Light/dark preference, persisted under the `theme` key.
pub struct ThemeStore {
    is_dark_mode: bool,
    storage: LocalStorage,
}

impl ThemeStore {
    pub async fn load(storage: LocalStorage, default: ThemeMode) -> Self {
        let stored = match storage.get_item(THEME_KEY).await {
            Ok(value) => value.as_deref().and_then(ThemeMode::parse),
            Err(e) => {
                warn!(error = %e, "failed to read theme, using default");
                None
            }
        };

        Self {
            is_dark_mode: stored.unwrap_or(default) == ThemeMode::Dark,
            storage,
        }
    }

    pub fn is_dark_mode(&self) -> bool {
        self.is_dark_mode
    }

    pub fn mode(&self) -> ThemeMode {
        if self.is_dark_mode {
            ThemeMode::Dark
        } else {
            ThemeMode::Light
        }
    }

    /// Flips the theme. The flip sticks for this run even if saving fails.
    pub async fn toggle(&mut self) -> ThemeMode {
        self.is_dark_mode = !self.is_dark_mode;
        let mode = self.mode();
        if let Err(e) = self.storage.set_item(THEME_KEY, mode.as_str()).await {
            warn!(error = %e, "failed to save theme");
        }
        mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_default_applies_when_unset() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let storage = LocalStorage::new(dir.path());

        assert!(ThemeStore::load(storage.clone(), ThemeMode::Dark).await.is_dark_mode());
        assert!(!ThemeStore::load(storage, ThemeMode::Light).await.is_dark_mode());
        Ok(())
    }

    #[tokio::test]
    async fn test_toggle_persists() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let storage = LocalStorage::new(dir.path());

        let mut theme = ThemeStore::load(storage.clone(), ThemeMode::Dark).await;
        assert_eq!(theme.toggle().await, ThemeMode::Light);
        assert_eq!(storage.get_item(THEME_KEY).await?.as_deref(), Some("light"));

        // Stored value wins over the default
        let reloaded = ThemeStore::load(storage.clone(), ThemeMode::Dark).await;
        assert_eq!(reloaded.mode(), ThemeMode::Light);

        theme.toggle().await;
        assert_eq!(storage.get_item(THEME_KEY).await?.as_deref(), Some("dark"));
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_value_uses_default() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let storage = LocalStorage::new(dir.path());
        storage.set_item(THEME_KEY, "sepia").await?;

        let theme = ThemeStore::load(storage, ThemeMode::Light).await;
        assert_eq!(theme.mode(), ThemeMode::Light);
        Ok(())
    }
}
