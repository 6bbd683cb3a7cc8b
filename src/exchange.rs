//! Sends a question for the active chat and records the outcome.
//!
//! A turn is two-phase. [`begin`] appends the user's message as `Pending`
//! and captures the chat it belongs to; [`complete`] settles that message
//! and appends the answer (or the fallback apology) to the same chat, even
//! if the user has switched chats while the question was in flight.

use std::sync::Arc;

use tracing::{info, warn};

use crate::api::{AskContext, AskError, AskResponse, QuestionClient};
use crate::chat::{DeliveryStatus, Message, SessionStore};

/// A question that has been recorded locally but not answered yet
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTurn {
    pub chat_id: String,
    pub message_id: String,
    pub question: String,
}

impl PendingTurn {
    pub fn context(&self, auth_token: Option<String>, result_count: u32) -> AskContext {
        AskContext {
            auth_token,
            chat_id: Some(self.chat_id.clone()),
            result_count,
        }
    }
}

/// Records the user's question in the active chat.
pub async fn begin(store: &mut SessionStore, question: &str) -> Option<PendingTurn> {
    let question = question.trim();
    if question.is_empty() {
        return None;
    }
    let chat_id = store.active_chat_id()?.to_string();

    let message = Message::user(question.to_string());
    let message_id = message.id.clone();
    if !store.append_message(&chat_id, message).await {
        return None;
    }

    Some(PendingTurn {
        chat_id,
        message_id,
        question: question.to_string(),
    })
}

/// Applies the outcome of a turn to the chat it started in.
pub async fn complete(
    store: &mut SessionStore,
    turn: &PendingTurn,
    result: Result<AskResponse, AskError>,
) {
    match result {
        Ok(response) => {
            store
                .settle(&turn.chat_id, &turn.message_id, DeliveryStatus::Confirmed)
                .await;
            store
                .append_message(&turn.chat_id, Message::assistant(response.answer))
                .await;
            info!(chat_id = %turn.chat_id, "question answered");
        }
        Err(e) => {
            warn!(chat_id = %turn.chat_id, error = %e, "question failed");
            store
                .settle(&turn.chat_id, &turn.message_id, DeliveryStatus::Failed)
                .await;
            store
                .append_message(&turn.chat_id, Message::fallback())
                .await;
        }
    }
}

/// Runs whole turns against a question client.
#[derive(Clone)]
pub struct MessageExchange {
    client: Arc<dyn QuestionClient>,
    result_count: u32,
}

impl MessageExchange {
    pub fn new(client: Arc<dyn QuestionClient>, result_count: u32) -> Self {
        Self {
            client,
            result_count,
        }
    }

    pub fn client(&self) -> Arc<dyn QuestionClient> {
        self.client.clone()
    }

    pub fn result_count(&self) -> u32 {
        self.result_count
    }

    /// Sends the question for a recorded turn without touching the store.
    pub async fn send(
        &self,
        turn: &PendingTurn,
        auth_token: Option<String>,
    ) -> Result<AskResponse, AskError> {
        let context = turn.context(auth_token, self.result_count);
        self.client.ask(&turn.question, &context).await
    }

    /// Begin, send and complete in one go. Returns the turn that was
    /// recorded, or `None` when there was nothing to send.
    pub async fn ask(
        &self,
        store: &mut SessionStore,
        question: &str,
        auth_token: Option<String>,
    ) -> Option<PendingTurn> {
        let turn = begin(store, question).await?;
        let result = self.send(&turn, auth_token).await;
        complete(store, &turn, result).await;
        Some(turn)
    }
}
