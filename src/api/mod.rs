mod client;
mod models;

pub use client::HttpQuestionClient;
pub use models::{AskContext, AskRequest, AskResponse};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AskError {
    #[error("Network Error: {0}")]
    Network(String),
    #[error("HTTP Error {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Malformed response: {0}")]
    Decode(String),
}

/// Anything that can answer a question. The HTTP client is the real one;
/// tests substitute their own.
#[async_trait]
pub trait QuestionClient: Send + Sync {
    async fn ask(&self, question: &str, context: &AskContext) -> Result<AskResponse, AskError>;
}
