use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::chat::backend::{ChatBackend, SessionSnapshot, SessionState};
use crate::chat::models::{Chat, DeliveryStatus, Message, Role};
use crate::storage::StoreError;

const MESSAGE_PAGE_SIZE: usize = 50;

/// Per-user chat tree in the hosted document store:
/// `users/{uid}/chats/{chatId}/messages/{messageId}`.
pub struct FirestoreBackend {
    client: Client,
    documents_url: String,
    uid: String,
    id_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<Document>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
    create_time: Option<DateTime<Utc>>,
    update_time: Option<DateTime<Utc>>,
}

impl Document {
    fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or_default()
    }

    fn string_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key)?.get("stringValue")?.as_str()
    }

    fn time_field(&self, key: &str) -> Option<DateTime<Utc>> {
        let value = self.fields.get(key)?;
        value
            .get("timestampValue")
            .or_else(|| value.get("stringValue"))?
            .as_str()?
            .parse()
            .ok()
    }

    fn into_message(self) -> Message {
        let content = self
            .string_field("text")
            .or_else(|| self.string_field("content"))
            .unwrap_or_default()
            .to_string();
        let role = Role::from_document(self.string_field("role").unwrap_or_default());
        let timestamp = self
            .time_field("timestamp")
            .or(self.create_time)
            .unwrap_or_else(Utc::now);

        Message {
            id: self.id().to_string(),
            role,
            content,
            timestamp,
            status: DeliveryStatus::Confirmed,
        }
    }
}

impl FirestoreBackend {
    pub fn new(
        client: Client,
        base_url: &str,
        project_id: &str,
        uid: impl Into<String>,
        id_token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            documents_url: format!(
                "{}/v1/projects/{}/databases/(default)/documents",
                base_url.trim_end_matches('/'),
                project_id
            ),
            uid: uid.into(),
            id_token: id_token.into(),
        }
    }

    fn chats_url(&self) -> String {
        format!("{}/users/{}/chats", self.documents_url, self.uid)
    }

    fn messages_url(&self, chat_id: &str) -> String {
        format!("{}/{}/messages", self.chats_url(), chat_id)
    }

    async fn list(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<ListDocumentsResponse, StoreError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.id_token)
            .query(query)
            .send()
            .await
            .map_err(|e| StoreError::Remote(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(StoreError::Remote(format!("list {} failed: {}: {}", url, status, text)));
        }

        response
            .json()
            .await
            .map_err(|e| StoreError::Remote(e.to_string()))
    }

    /// Follows `nextPageToken` until the collection is exhausted.
    async fn list_all(&self, url: &str) -> Result<Vec<Document>, StoreError> {
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let query: Vec<(&str, String)> = page_token
                .take()
                .map(|token| vec![("pageToken", token)])
                .unwrap_or_default();
            let page = self.list(url, &query).await?;
            documents.extend(page.documents);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => return Ok(documents),
            }
        }
    }

    async fn create(&self, url: &str, document_id: &str, fields: Value) -> Result<(), StoreError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.id_token)
            .query(&[("documentId", document_id)])
            .json(&json!({ "fields": fields }))
            .send()
            .await
            .map_err(|e| StoreError::Remote(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(StoreError::Remote(format!("create {} failed: {}: {}", url, status, text)));
        }
        Ok(())
    }

    async fn load_messages(&self, chat_id: &str) -> Result<Vec<Message>, StoreError> {
        let page = self
            .list(
                &self.messages_url(chat_id),
                &[
                    ("orderBy", "timestamp".to_string()),
                    ("pageSize", MESSAGE_PAGE_SIZE.to_string()),
                ],
            )
            .await?;

        let mut messages: Vec<Message> = page
            .documents
            .into_iter()
            .map(Document::into_message)
            .collect();
        // Server ordering is by timestamp already; keep it stable if it was not honoured
        messages.sort_by_key(|m| m.timestamp);
        Ok(messages)
    }
}

#[async_trait]
impl ChatBackend for FirestoreBackend {
    fn name(&self) -> &str {
        "firestore"
    }

    async fn load(&self) -> Result<Option<SessionSnapshot>, StoreError> {
        let documents = self.list_all(&self.chats_url()).await?;
        if documents.is_empty() {
            return Ok(None);
        }

        let mut chats = Vec::with_capacity(documents.len());
        for document in documents {
            let messages = self.load_messages(document.id()).await?;
            let created_at = document
                .time_field("timestamp")
                .or(document.create_time)
                .unwrap_or_else(Utc::now);
            let updated_at = messages
                .last()
                .map(|m| m.timestamp)
                .or(document.update_time)
                .unwrap_or(created_at);

            chats.push(Chat {
                id: document.id().to_string(),
                title: document.string_field("title").unwrap_or_default().to_string(),
                messages,
                created_at,
                updated_at,
            });
        }
        chats.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        info!(uid = %self.uid, chats = chats.len(), "loaded remote chats");
        let active_chat_id = chats.first().map(|c| c.id.clone());
        Ok(Some(SessionState {
            chats,
            active_chat_id,
        }))
    }

    async fn chat_created(&self, _state: &SessionState, chat: &Chat) -> Result<(), StoreError> {
        self.create(
            &self.chats_url(),
            &chat.id,
            json!({
                "title": { "stringValue": chat.title },
                "timestamp": { "stringValue": chat.created_at.to_rfc3339() },
            }),
        )
        .await?;

        for message in &chat.messages {
            self.create(
                &self.messages_url(&chat.id),
                &message.id,
                json!({
                    "text": { "stringValue": message.content },
                    "role": { "stringValue": message.role.as_str() },
                    "timestamp": { "timestampValue": message.timestamp.to_rfc3339() },
                }),
            )
            .await?;
        }

        debug!(chat_id = %chat.id, messages = chat.messages.len(), "created remote chat");
        Ok(())
    }

    async fn message_appended(
        &self,
        _state: &SessionState,
        chat_id: &str,
        message: &Message,
    ) -> Result<(), StoreError> {
        // The inference service records authenticated exchanges in this tree itself
        debug!(chat_id, message_id = %message.id, "remote append left to the inference service");
        Ok(())
    }

    async fn message_settled(
        &self,
        _state: &SessionState,
        _chat_id: &str,
        _message_id: &str,
    ) -> Result<(), StoreError> {
        Ok(())
    }

    async fn active_changed(&self, _state: &SessionState) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockServer;
    use chrono::Local;

    fn backend(server: &MockServer) -> FirestoreBackend {
        FirestoreBackend::new(Client::new(), &server.base_url, "demo", "user-1", "token-1")
    }

    #[tokio::test]
    async fn test_load_maps_documents() -> anyhow::Result<()> {
        let server = MockServer::start(|req| {
            if req.path.contains("/chats/c1/messages") {
                let body = json!({
                    "documents": [
                        {
                            "name": "projects/demo/databases/(default)/documents/users/user-1/chats/c1/messages/m1",
                            "fields": {
                                "text": {"stringValue": "What is wudu?"},
                                "role": {"stringValue": "user"},
                                "timestamp": {"timestampValue": "2024-03-05T10:00:00Z"}
                            }
                        },
                        {
                            "name": "projects/demo/databases/(default)/documents/users/user-1/chats/c1/messages/m2",
                            "fields": {
                                "content": {"stringValue": "Ritual washing."},
                                "role": {"stringValue": "assistant"},
                                "timestamp": {"timestampValue": "2024-03-05T10:00:05Z"}
                            }
                        }
                    ]
                });
                (200, body.to_string())
            } else if req.path.contains("/users/user-1/chats") {
                let body = json!({
                    "documents": [{
                        "name": "projects/demo/databases/(default)/documents/users/user-1/chats/c1",
                        "fields": {
                            "title": {"stringValue": "10:00 am on 5 March"},
                            "timestamp": {"stringValue": "2024-03-05T10:00:00Z"}
                        },
                        "createTime": "2024-03-05T10:00:00Z",
                        "updateTime": "2024-03-05T10:00:00Z"
                    }]
                });
                (200, body.to_string())
            } else {
                (404, "{}".to_string())
            }
        })
        .await;

        let snapshot = backend(&server).load().await?.expect("snapshot");
        assert_eq!(snapshot.chats.len(), 1);
        assert_eq!(snapshot.active_chat_id.as_deref(), Some("c1"));

        let chat = &snapshot.chats[0];
        assert_eq!(chat.title, "10:00 am on 5 March");
        assert_eq!(chat.messages.len(), 2);
        assert_eq!(chat.messages[0].id, "m1");
        assert_eq!(chat.messages[0].role, Role::User);
        assert_eq!(chat.messages[1].role, Role::Assistant);
        assert_eq!(chat.messages[1].content, "Ritual washing.");

        let requests = server.requests();
        assert!(requests.iter().all(|r| r.header("authorization") == Some("Bearer token-1")));
        assert!(requests.iter().any(|r| r.path.contains("orderBy=timestamp")));
        Ok(())
    }

    #[tokio::test]
    async fn test_load_follows_chat_pages() -> anyhow::Result<()> {
        let chat_doc = |id: &str, at: &str| {
            json!({
                "name": format!("projects/demo/databases/(default)/documents/users/user-1/chats/{}", id),
                "fields": {"timestamp": {"stringValue": at}}
            })
        };
        let first = json!({
            "documents": [chat_doc("c1", "2024-03-05T10:00:00Z")],
            "nextPageToken": "next"
        });
        let second = json!({ "documents": [chat_doc("c2", "2024-03-06T10:00:00Z")] });

        let server = MockServer::start(move |req| {
            if req.path.contains("/messages") {
                (200, "{}".to_string())
            } else if req.path.contains("pageToken=next") {
                (200, second.to_string())
            } else {
                (200, first.to_string())
            }
        })
        .await;

        let snapshot = backend(&server).load().await?.expect("snapshot");
        let ids: Vec<&str> = snapshot.chats.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c2", "c1"]);
        assert_eq!(snapshot.active_chat_id.as_deref(), Some("c2"));
        Ok(())
    }

    #[tokio::test]
    async fn test_load_with_no_chats()-> anyhow::Result<()> {
        let server = MockServer::start(|_| (200, "{}".to_string())).await;
        assert!(backend(&server).load().await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_load_error_status() {
        let server = MockServer::start(|_| (401, r#"{"error":"denied"}"#.to_string())).await;
        assert!(matches!(backend(&server).load().await, Err(StoreError::Remote(_))));
    }

    #[tokio::test]
    async fn test_chat_created_writes_chat_and_messages() -> anyhow::Result<()> {
        let server = MockServer::start(|_| (200, "{}".to_string())).await;
        let chat = Chat::seeded(Local::now().naive_local());
        let state = SessionState {
            chats: vec![chat.clone()],
            active_chat_id: Some(chat.id.clone()),
        };

        backend(&server).chat_created(&state, &chat).await?;

        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, "POST");
        assert!(requests[0].path.contains(&format!("documentId={}", chat.id)));
        assert_eq!(requests[0].json()["fields"]["title"]["stringValue"], chat.title.as_str());

        assert!(requests[1].path.contains(&format!("/chats/{}/messages", chat.id)));
        let fields = &requests[1].json()["fields"];
        assert_eq!(fields["role"]["stringValue"], "assistant");
        assert_eq!(fields["text"]["stringValue"], chat.messages[0].content.as_str());
        Ok(())
    }
}
