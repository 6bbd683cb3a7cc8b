use async_trait::async_trait;
use tracing::debug;

use crate::chat::models::{Chat, Message};
use crate::storage::{LocalStorage, StoreError, CHATS_KEY, CURRENT_CHAT_KEY};

/// The in-memory session: every chat plus a weak reference to the active one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub chats: Vec<Chat>,
    pub active_chat_id: Option<String>,
}

impl SessionState {
    pub fn chat(&self, id: &str) -> Option<&Chat> {
        self.chats.iter().find(|c| c.id == id)
    }

    pub fn chat_mut(&mut self, id: &str) -> Option<&mut Chat> {
        self.chats.iter_mut().find(|c| c.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.chat(id).is_some()
    }
}

/// What a backend hands back on load. The active id may be stale.
pub type SessionSnapshot = SessionState;

/// Keyed persistence for the session store.
///
/// Every hook receives the state *after* the mutation was applied, so a
/// backend that can only store the whole collection may do so.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn load(&self) -> Result<Option<SessionSnapshot>, StoreError>;

    async fn chat_created(&self, state: &SessionState, chat: &Chat) -> Result<(), StoreError>;

    async fn message_appended(
        &self,
        state: &SessionState,
        chat_id: &str,
        message: &Message,
    ) -> Result<(), StoreError>;

    async fn message_settled(
        &self,
        state: &SessionState,
        chat_id: &str,
        message_id: &str,
    ) -> Result<(), StoreError>;

    async fn active_changed(&self, state: &SessionState) -> Result<(), StoreError>;
}

/// Keeps the whole chat collection as one JSON blob under `chats` and the
/// active id under `currentChatId`.
pub struct LocalBackend {
    storage: LocalStorage,
}

impl LocalBackend {
    pub fn new(storage: LocalStorage) -> Self {
        Self { storage }
    }

    async fn write_chats(&self, state: &SessionState) -> Result<(), StoreError> {
        let blob = serde_json::to_string(&state.chats)?;
        self.storage.set_item(CHATS_KEY, &blob).await
    }

    async fn write_active(&self, state: &SessionState) -> Result<(), StoreError> {
        match &state.active_chat_id {
            Some(id) => self.storage.set_item(CURRENT_CHAT_KEY, id).await,
            None => self.storage.remove_item(CURRENT_CHAT_KEY).await,
        }
    }
}

#[async_trait]
impl ChatBackend for LocalBackend {
    fn name(&self) -> &str {
        "local"
    }

    async fn load(&self) -> Result<Option<SessionSnapshot>, StoreError> {
        let Some(blob) = self.storage.get_item(CHATS_KEY).await? else {
            return Ok(None);
        };
        let chats: Vec<Chat> = serde_json::from_str(&blob)?;

        let active_chat_id = self
            .storage
            .get_item(CURRENT_CHAT_KEY)
            .await?
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());

        debug!(chats = chats.len(), "loaded local chats");
        Ok(Some(SessionState {
            chats,
            active_chat_id,
        }))
    }

    async fn chat_created(&self, state: &SessionState, _chat: &Chat) -> Result<(), StoreError> {
        self.write_chats(state).await?;
        self.write_active(state).await
    }

    async fn message_appended(
        &self,
        state: &SessionState,
        _chat_id: &str,
        _message: &Message,
    ) -> Result<(), StoreError> {
        self.write_chats(state).await
    }

    async fn message_settled(
        &self,
        state: &SessionState,
        _chat_id: &str,
        _message_id: &str,
    ) -> Result<(), StoreError> {
        self.write_chats(state).await
    }

    async fn active_changed(&self, state: &SessionState) -> Result<(), StoreError> {
        self.write_active(state).await
    }
}
