use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error};

use super::models::{AskContext, AskRequest, AskResponse};
use super::{AskError, QuestionClient};

/// Client for the inference service's `POST /ask`.
pub struct HttpQuestionClient {
    client: Client,
    base_url: String,
}

impl HttpQuestionClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AskError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AskError::Network(e.to_string()))?;

        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl QuestionClient for HttpQuestionClient {
    async fn ask(&self, question: &str, context: &AskContext) -> Result<AskResponse, AskError> {
        let request = AskRequest::new(question, context);
        debug!(chat_id = %request.chat_id, k = request.k, "sending question");

        let response = self
            .client
            .post(format!("{}/ask", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| AskError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%status, body = %body, "inference service rejected question");
            return Err(AskError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| AskError::Network(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| AskError::Decode(e.to_string()))
    }
}
