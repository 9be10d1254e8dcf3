//! Conversation-creation collaborator.
//!
//! Conversation records live server-side; the streaming layer only needs a
//! single operation from them: create one and learn its id. The trait is the
//! seam tests substitute; the production implementation is a thin `reqwest`
//! client.
//!
//! The service itself is not idempotent-safe: the coordinator's single-flight
//! discipline is what prevents duplicate creation calls.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use wavechat_core::ConversationId;

use crate::error::{Result, StreamError};

/// Request payload for conversation creation.
#[derive(Debug, Clone, Serialize)]
struct CreateConversationRequest<'a> {
    title: &'a str,
}

/// A freshly created conversation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedConversation {
    /// Server-assigned conversation id.
    pub conversation_id: ConversationId,
    /// Title the conversation was created with.
    pub title: String,
}

/// Collaborator that creates conversations.
#[async_trait]
pub trait ConversationService: Send + Sync {
    /// Create a conversation with the given title.
    ///
    /// # Errors
    ///
    /// Returns an error if the creation round-trip fails; the pending send
    /// is surfaced to the caller rather than silently swallowed.
    async fn create_conversation(&self, title: &str) -> Result<CreatedConversation>;
}

/// HTTP implementation of the conversation service.
pub struct HttpConversationService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpConversationService {
    /// Create a service client for the given API base URL.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created (should never happen with
    /// default TLS).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to create HTTP client");

        Self {
            base_url: base_url.into(),
            client,
        }
    }

    fn create_url(&self) -> String {
        format!("{}/conversations", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ConversationService for HttpConversationService {
    async fn create_conversation(&self, title: &str) -> Result<CreatedConversation> {
        let response = self
            .client
            .post(self.create_url())
            .json(&CreateConversationRequest { title })
            .send()
            .await
            .map_err(|e| StreamError::ConversationCreation(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StreamError::ConversationCreation(format!(
                "unexpected status {status}"
            )));
        }

        response
            .json::<CreatedConversation>()
            .await
            .map_err(|e| StreamError::ConversationCreation(format!("invalid response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn create_conversation_parses_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/conversations"))
            .and(body_json(serde_json::json!({"title": "New chat"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "conversationId": "c-42",
                "title": "New chat"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let service = HttpConversationService::new(server.uri());
        let created = service.create_conversation("New chat").await.unwrap();

        assert_eq!(created.conversation_id, ConversationId::new("c-42"));
        assert_eq!(created.title, "New chat");
    }

    #[tokio::test]
    async fn create_conversation_surfaces_server_errors() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/conversations"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let service = HttpConversationService::new(server.uri());
        let result = service.create_conversation("New chat").await;

        assert!(matches!(result, Err(StreamError::ConversationCreation(_))));
    }

    #[tokio::test]
    async fn create_conversation_rejects_malformed_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/conversations"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let service = HttpConversationService::new(server.uri());
        let result = service.create_conversation("New chat").await;

        assert!(matches!(result, Err(StreamError::ConversationCreation(_))));
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let service = HttpConversationService::new("http://api.example.com/");
        assert_eq!(service.create_url(), "http://api.example.com/conversations");
    }
}
