use serde::{Deserialize, Serialize};

/// Body of `POST /ask`. The service requires `token` and `chat_id`, so
/// absent values go out as empty strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AskRequest {
    pub question: String,
    pub token: String,
    pub chat_id: String,
    pub k: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AskResponse {
    pub question: String,
    pub answer: String,
}

/// Per-call context for a question
#[derive(Debug, Clone, Default)]
pub struct AskContext {
    pub auth_token: Option<String>,
    pub chat_id: Option<String>,
    pub result_count: u32,
}

impl AskRequest {
    pub fn new(question: &str, context: &AskContext) -> Self {
        Self {
            question: question.to_string(),
            token: context.auth_token.clone().unwrap_or_default(),
            chat_id: context.chat_id.clone().unwrap_or_default(),
            k: context.result_count,
        }
    }
}
