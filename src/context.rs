use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::info;

use crate::api::HttpQuestionClient;
use crate::auth::{AuthGateway, IdentityToolkitProvider};
use crate::chat::{ChatBackend, FirestoreBackend, LocalBackend, SessionStore};
use crate::config::AppConfig;
use crate::exchange::MessageExchange;
use crate::storage::LocalStorage;
use crate::theme::ThemeStore;

/// Everything a command or the UI needs. Built once in `main` and passed
/// down by reference.
pub struct AppContext {
    pub config: AppConfig,
    pub storage: LocalStorage,
    pub http: Client,
    pub auth: AuthGateway,
    pub theme: ThemeStore,
    pub exchange: MessageExchange,
}

impl AppContext {
    pub async fn build(config: AppConfig) -> Result<Self> {
        let storage = LocalStorage::new(config.data_dir());
        let http = Client::builder()
            .timeout(config.api.timeout())
            .build()
            .context("Failed to build HTTP client")?;

        let provider = IdentityToolkitProvider::new(
            http.clone(),
            &config.auth.base_url,
            &config.auth.api_key,
        );
        let mut auth = AuthGateway::new(Box::new(provider), storage.clone());
        auth.restore().await;

        let theme = ThemeStore::load(storage.clone(), config.ui.default_theme).await;

        let client = HttpQuestionClient::with_client(http.clone(), &config.api.base_url);
        let exchange = MessageExchange::new(Arc::new(client), config.api.result_count);

        info!(data_dir = %storage.root().display(), api = %config.api.base_url, "context ready");
        Ok(Self {
            config,
            storage,
            http,
            auth,
            theme,
            exchange,
        })
    }

    /// The chat backend for whoever is signed in right now: the hosted
    /// document store for a signed-in user when it is configured, local
    /// storage otherwise.
    pub fn chat_backend(&self) -> Arc<dyn ChatBackend> {
        match self.auth.session() {
            Some(session) if self.config.remote.enabled() => Arc::new(FirestoreBackend::new(
                self.http.clone(),
                &self.config.remote.base_url,
                &self.config.remote.project_id,
                session.user.uid.clone(),
                session.id_token.clone(),
            )),
            _ => Arc::new(LocalBackend::new(self.storage.clone())),
        }
    }

    pub async fn open_store(&self) -> SessionStore {
        let mut store = SessionStore::new(self.chat_backend());
        store.load().await;
        store
    }

    pub fn auth_token(&self) -> Option<String> {
        self.auth.id_token().map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config_in(dir: &std::path::Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.storage.data_dir = dir.display().to_string();
        config
    }

    #[tokio::test]
    async fn test_signed_out_uses_local_backend() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let mut config = config_in(dir.path());
        config.remote.project_id = "demo".to_string();

        let ctx = AppContext::build(config).await?;
        assert!(ctx.auth.current_user().is_none());
        assert_eq!(ctx.chat_backend().name(), "local");

        let store = ctx.open_store().await;
        assert_eq!(store.chats().len(), 1);
        assert!(ctx.storage.get_item(crate::storage::CHATS_KEY).await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_signed_in_uses_remote_when_configured() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let storage = LocalStorage::new(dir.path());
        let session = serde_json::json!({
            "user": {"uid": "u1", "email": "a@b.c", "display_name": null},
            "id_token": "tok",
            "refresh_token": "ref"
        });
        storage
            .set_item(crate::storage::AUTH_KEY, &session.to_string())
            .await?;

        let ctx = AppContext::build(config_in(dir.path())).await?;
        assert_eq!(ctx.auth_token().as_deref(), Some("tok"));
        // No project configured: still local
        assert_eq!(ctx.chat_backend().name(), "local");

        let mut config = config_in(dir.path());
        config.remote.project_id = "demo".to_string();
        let ctx = AppContext::build(config).await?;
        assert_eq!(ctx.chat_backend().name(), "firestore");
        Ok(())
    }
}
