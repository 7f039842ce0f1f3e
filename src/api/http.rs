//! HTTP client for the conversation REST API

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, error};

use super::traits::ConversationApi;
use crate::config::{ClientConfig, DEFAULT_API_BASE_URL, DEFAULT_REQUEST_TIMEOUT};
use crate::error::{ClientError, Result};
use crate::types::{Conversation, ConversationDetail, CreateConversation};

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpApiConfig {
    /// Base URL, including any `/api` prefix
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for HttpApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl From<&ClientConfig> for HttpApiConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            base_url: config.api_base_url.clone(),
            timeout: config.request_timeout,
        }
    }
}

/// reqwest-backed [`ConversationApi`]
///
/// # Example
///
/// ```rust,no_run
/// use chat_client::api::{ConversationApi, HttpApiConfig, HttpConversationApi};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let api = HttpConversationApi::new(HttpApiConfig {
///     base_url: "http://localhost:8080/api".into(),
///     ..Default::default()
/// })?;
///
/// let conversations = api.list_conversations().await?;
/// # Ok(())
/// # }
/// ```
pub struct HttpConversationApi {
    config: HttpApiConfig,
    client: Client,
}

impl HttpConversationApi {
    pub fn new(config: HttpApiConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn conversations_url(&self) -> String {
        format!("{}/conversations", self.config.base_url.trim_end_matches('/'))
    }

    fn conversation_url(&self, id: &str) -> String {
        format!("{}/{}", self.conversations_url(), urlencoding::encode(id))
    }

    /// Turn a non-success response into an error, or decode the body.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let response = check_status(response).await?;
        let body = response.json().await?;
        Ok(body)
    }
}

#[async_trait]
impl ConversationApi for HttpConversationApi {
    async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let url = self.conversations_url();
        debug!(url = %url, "Listing conversations");

        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    async fn create_conversation(&self, request: &CreateConversation) -> Result<Conversation> {
        let url = self.conversations_url();
        debug!(url = %url, title = %request.title, model = %request.model_name, "Creating conversation");

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await?;

        debug!(status = %response.status(), "Create response");
        self.handle_response(response).await
    }

    async fn get_conversation(&self, id: &str) -> Result<ConversationDetail> {
        let url = self.conversation_url(id);
        debug!(url = %url, "Fetching conversation");

        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    async fn delete_conversation(&self, id: &str) -> Result<()> {
        let url = self.conversation_url(id);
        debug!(url = %url, "Deleting conversation");

        let response = self.client.delete(&url).send().await?;
        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(status, &body);
    error!(status = status.as_u16(), message = %message, "API request failed");

    if status == StatusCode::NOT_FOUND {
        return Err(ClientError::NotFound(message));
    }
    Err(ClientError::Server {
        status: status.as_u16(),
        message,
    })
}

/// Pick the most useful error text: a JSON `message`/`error` field, the raw
/// body, or the status reason.
fn error_message(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "error", "detail"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                return text.to_string();
            }
        }
    }
    if !body.is_empty() {
        return body.to_string();
    }
    status
        .canonical_reason()
        .unwrap_or("Unknown error")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let api = HttpConversationApi::new(HttpApiConfig {
            base_url: "http://localhost:8080/api/".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(api.conversations_url(), "http://localhost:8080/api/conversations");
        assert_eq!(
            api.conversation_url("a b/c"),
            "http://localhost:8080/api/conversations/a%20b%2Fc"
        );
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"message": "title too long"}"#),
            "title too long"
        );
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"error": "Bad Request", "status": 400}"#),
            "Bad Request"
        );
        assert_eq!(
            error_message(StatusCode::INTERNAL_SERVER_ERROR, "database down\n"),
            "database down"
        );
        assert_eq!(
            error_message(StatusCode::SERVICE_UNAVAILABLE, ""),
            "Service Unavailable"
        );
    }
}
