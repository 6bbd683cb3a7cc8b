use std::sync::Arc;

use chrono::Local;
use tracing::{debug, info, warn};

use crate::chat::backend::{ChatBackend, SessionState};
use crate::chat::models::{Chat, DeliveryStatus, Message};
use crate::storage::StoreError;

/// Holds the chat collection and the active chat for one client session.
///
/// There is exactly one writer (the UI task or the CLI command), so no
/// locking happens here. Persistence failures are logged and the in-memory
/// state stays authoritative for the rest of the session.
pub struct SessionStore {
    state: SessionState,
    backend: Arc<dyn ChatBackend>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            state: SessionState::default(),
            backend,
        }
    }

    /// Restores the session from the backend, seeding a welcome chat when
    /// there is nothing to restore. Never fails.
    ///
    /// A backend error leaves storage untouched: the session starts with an
    /// unsaved welcome chat and only later mutations are written.
    pub async fn load(&mut self) {
        let snapshot = match self.backend.load().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(backend = self.backend.name(), error = %e, "failed to load chats, starting fresh");
                let chat = Chat::seeded(Local::now().naive_local());
                self.state = SessionState {
                    active_chat_id: Some(chat.id.clone()),
                    chats: vec![chat],
                };
                return;
            }
        };

        match snapshot {
            Some(snapshot) if !snapshot.chats.is_empty() => {
                self.state = snapshot;
                let active_is_known = self
                    .state
                    .active_chat_id
                    .as_deref()
                    .is_some_and(|id| self.state.contains(id));

                if !active_is_known {
                    self.state.active_chat_id = self.state.chats.first().map(|c| c.id.clone());
                    let result = self.backend.active_changed(&self.state).await;
                    self.log_persist("active_changed", result);
                }
                info!(
                    backend = self.backend.name(),
                    chats = self.state.chats.len(),
                    "restored chats"
                );
            }
            _ => {
                self.state = SessionState::default();
                let id = self.new_chat().await;
                info!(backend = self.backend.name(), chat_id = %id, "seeded first chat");
            }
        }
    }

    /// Creates a chat holding the welcome message and makes it active.
    pub async fn new_chat(&mut self) -> String {
        let chat = Chat::seeded(Local::now().naive_local());
        let id = chat.id.clone();

        self.state.chats.insert(0, chat.clone());
        self.state.active_chat_id = Some(id.clone());

        let result = self.backend.chat_created(&self.state, &chat).await;
        self.log_persist("chat_created", result);
        id
    }

    /// Makes `id` the active chat. Unknown ids are ignored.
    pub async fn select_chat(&mut self, id: &str) -> bool {
        if !self.state.contains(id) {
            debug!(chat_id = id, "ignoring selection of unknown chat");
            return false;
        }
        if self.state.active_chat_id.as_deref() == Some(id) {
            return false;
        }

        self.state.active_chat_id = Some(id.to_string());
        let result = self.backend.active_changed(&self.state).await;
        self.log_persist("active_changed", result);
        true
    }

    /// Appends to the chat with `chat_id`. Returns false for unknown chats.
    pub async fn append_message(&mut self, chat_id: &str, message: Message) -> bool {
        let Some(chat) = self.state.chat_mut(chat_id) else {
            warn!(chat_id, "dropping message for unknown chat");
            return false;
        };
        chat.push(message.clone());

        let result = self
            .backend
            .message_appended(&self.state, chat_id, &message)
            .await;
        self.log_persist("message_appended", result);
        true
    }

    pub async fn settle(&mut self, chat_id: &str, message_id: &str, status: DeliveryStatus) -> bool {
        let settled = self
            .state
            .chat_mut(chat_id)
            .is_some_and(|chat| chat.settle(message_id, status));
        if !settled {
            return false;
        }

        let result = self
            .backend
            .message_settled(&self.state, chat_id, message_id)
            .await;
        self.log_persist("message_settled", result);
        true
    }

    pub fn chats(&self) -> &[Chat] {
        &self.state.chats
    }

    pub fn chat(&self, id: &str) -> Option<&Chat> {
        self.state.chat(id)
    }

    pub fn active_chat_id(&self) -> Option<&str> {
        self.state.active_chat_id.as_deref()
    }

    pub fn active_chat(&self) -> Option<&Chat> {
        self.active_chat_id().and_then(|id| self.state.chat(id))
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    fn log_persist(&self, operation: &str, result: Result<(), StoreError>) {
        if let Err(e) = result {
            warn!(backend = self.backend.name(), operation, error = %e, "failed to persist chats");
        }
    }
}
