use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmConfig;

/// Produces a free-form reply for a user prompt.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatMessage {
    fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct LlmClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn build_request(&self, prompt: &str) -> ChatRequest {
        ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage::new("system", &self.config.system_prompt),
                ChatMessage::new("user", prompt),
            ],
            max_tokens: self.config.max_tokens,
        }
    }
}

#[async_trait]
impl Completion for LlmClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = self.build_request(prompt);
        let url = format!("{}/chat/completions", self.config.effective_base_url());

        debug!(
            "Sending completion request to {} ({}, model {})",
            url, self.config.provider, self.config.model
        );

        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request);
        if !self.config.api_key.is_empty() {
            builder = builder.header("Authorization", format!("Bearer {}", self.config.api_key));
        }

        let response = builder
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", self.config.provider))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("{} API error ({}): {}", self.config.provider, status, error_body);
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", self.config.provider))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .with_context(|| format!("No response from {}", self.config.provider))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmProvider;
    use mockito::Matcher;
    use serde_json::json;

    fn client_for(server: &mockito::ServerGuard, api_key: &str) -> LlmClient {
        LlmClient::new(LlmConfig {
            provider: LlmProvider::Openai,
            model: "test-model".to_string(),
            base_url: server.url(),
            api_key: api_key.to_string(),
            max_tokens: 64,
            system_prompt: "You are Florence.".to_string(),
        })
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({
                "model": "test-model",
                "max_tokens": 64,
                "messages": [
                    {"role": "system", "content": "You are Florence."},
                    {"role": "user", "content": "What is 2+2?"}
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({"choices": [{"message": {"role": "assistant", "content": "  4  "}}]})
                    .to_string(),
            )
            .create_async()
            .await;

        let client = client_for(&server, "sk-test");
        let reply = client.complete("What is 2+2?").await.unwrap();

        assert_eq!(reply, "4");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_no_authorization_header_without_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body(json!({"choices": [{"message": {"role": "assistant", "content": "hi"}}]}).to_string())
            .create_async()
            .await;

        let client = client_for(&server, "");
        assert_eq!(client.complete("hello").await.unwrap(), "hi");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body("quota exceeded")
            .create_async()
            .await;

        let client = client_for(&server, "sk-test");
        let err = client.complete("hello").await.unwrap_err();
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_empty_choices_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(json!({"choices": []}).to_string())
            .create_async()
            .await;

        let client = client_for(&server, "sk-test");
        assert!(client.complete("hello").await.is_err());
    }

    #[tokio::test]
    async fn test_malformed_body_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let client = client_for(&server, "sk-test");
        assert!(client.complete("hello").await.is_err());
    }
}
