use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const WELCOME_MESSAGE: &str = "# Assalamu Alaikum! 👋

Welcome to Aalim AI, your companion for Islamic knowledge and guidance. I'm here to help you with:

* 📚 Quranic interpretations and tafsir
* 🕌 Islamic history and traditions
* 🤲 Daily prayers and supplications
* 📖 Hadith explanations and authenticity
* 🎓 Islamic jurisprudence (Fiqh)
* 💫 Spiritual guidance and personal development

Feel free to ask any questions about Islam, and I'll do my best to provide accurate and helpful answers based on authentic sources.

*Note: While I aim to provide accurate information, please verify important matters with qualified scholars.*";

pub const FALLBACK_MESSAGE: &str = "I apologize, but I encountered an error while connecting to my knowledge base. Please try again later.";

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant", alias = "bot")]
    Assistant,
}

impl Role {
    /// Maps a role string from the hosted document store.
    /// Anything that is not `assistant` is treated as the user.
    pub fn from_document(role: &str) -> Self {
        if role == "assistant" {
            Role::Assistant
        } else {
            Role::User
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Delivery state of a message. Only user messages start out pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    #[default]
    Confirmed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(alias = "sender")]
    pub role: Role,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub status: DeliveryStatus,
}

impl Message {
    fn new(role: Role, content: String, status: DeliveryStatus) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            timestamp: Utc::now(),
            status,
        }
    }

    /// A user message waiting for its answer
    pub fn user(content: String) -> Self {
        Self::new(Role::User, content, DeliveryStatus::Pending)
    }

    pub fn assistant(content: String) -> Self {
        Self::new(Role::Assistant, content, DeliveryStatus::Confirmed)
    }

    pub fn welcome() -> Self {
        Self::assistant(WELCOME_MESSAGE.to_string())
    }

    pub fn fallback() -> Self {
        Self::assistant(FALLBACK_MESSAGE.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Chat {
    /// A new chat seeded with the welcome message, titled from `local_now`.
    pub fn seeded(local_now: NaiveDateTime) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: chat_title(local_now),
            messages: vec![Message::welcome()],
            created_at: now,
            updated_at: now,
        }
    }

    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            "New Chat"
        } else {
            &self.title
        }
    }

    pub fn push(&mut self, message: Message) {
        self.updated_at = Utc::now();
        self.messages.push(message);
    }

    /// Moves a pending message to its final status. Returns false when the
    /// message is unknown or already settled.
    pub fn settle(&mut self, message_id: &str, status: DeliveryStatus) -> bool {
        if status == DeliveryStatus::Pending {
            return false;
        }
        match self.messages.iter_mut().find(|m| m.id == message_id) {
            Some(message) if message.status == DeliveryStatus::Pending => {
                message.status = status;
                self.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }
}

/// Formats a chat title such as `3:07 pm on 5 March`.
pub fn chat_title(at: NaiveDateTime) -> String {
    at.format("%-I:%M %P on %-d %B").to_string()
}
