//! OpenAI-compatible chat completions client
//!
//! Covers the hosted OpenAI API, Azure, and local OpenAI-compatible servers
//! (LM Studio and similar) through a configurable base URL.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use kgc_core::{
    ClientConfig, ClientError, ClientResult, ConfigError, GenerateRequest, GroundedRequest,
    LmClient, RawItem,
};

use crate::json::parse_items;
use crate::prompts;

/// OpenAI-compatible API client
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    timeout_secs: u64,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

impl OpenAiClient {
    /// Create a new client
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: model.into(),
            max_tokens: 2048,
            timeout_secs: 120,
        }
    }

    /// Create from config
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ConfigError::MissingRequired("OPENAI_API_KEY".to_string()))?;

        let mut client = Self::new(api_key, config.model.clone());
        if let Some(url) = &config.base_url {
            client.base_url = url.trim_end_matches('/').to_string();
        }
        client.max_tokens = config.max_tokens;
        client.timeout_secs = config.timeout_secs;
        Ok(client)
    }

    /// Set a custom base URL (Azure, LM Studio, compatible APIs)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn chat(&self, messages: Vec<Message>, temperature: f32) -> ClientResult<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: self.max_tokens,
            temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .timeout(Duration::from_secs(self.timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| map_request_error(e, self.timeout_secs))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ClientError::Auth(format!("{status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Http(format!("{status}: {body}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Parse(format!("malformed completion response: {e}")))?;

        parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| ClientError::Parse("completion had no choices".to_string()))
    }
}

#[async_trait]
impl LmClient for OpenAiClient {
    async fn extract_grounded(&self, request: GroundedRequest<'_>) -> ClientResult<Vec<RawItem>> {
        let system = prompts::grounded_system_message(request.examples, request.schema);
        let messages = vec![
            Message {
                role: "system".to_string(),
                content: system,
            },
            Message {
                role: "user".to_string(),
                content: request.prompt.to_string(),
            },
        ];

        let content = self.chat(messages, request.temperature).await?;
        tracing::debug!(chars = content.len(), "grounded extraction response received");
        parse_items(&content)
    }

    async fn generate_json(&self, request: GenerateRequest<'_>) -> ClientResult<Vec<RawItem>> {
        let system = prompts::generate_system_message(request.schema);
        let messages = vec![
            Message {
                role: "system".to_string(),
                content: system,
            },
            Message {
                role: "user".to_string(),
                content: request.prompt.to_string(),
            },
        ];

        let content = self.chat(messages, request.temperature).await?;
        tracing::debug!(chars = content.len(), "generation response received");
        parse_items(&content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

pub(crate) fn map_request_error(e: reqwest::Error, timeout_secs: u64) -> ClientError {
    if e.is_timeout() {
        ClientError::Timeout(timeout_secs)
    } else {
        ClientError::Http(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = OpenAiClient::new("test-key", "gpt-4o-mini");
        assert_eq!(client.model_name(), "gpt-4o-mini");
    }

    #[test]
    fn test_from_config_requires_api_key() {
        let config = ClientConfig::default();
        assert!(matches!(
            OpenAiClient::from_config(&config),
            Err(ConfigError::MissingRequired(_))
        ));
    }

    #[test]
    fn test_base_url_is_trimmed() {
        let config = ClientConfig {
            api_key: Some("key".to_string()),
            base_url: Some("http://localhost:1234/v1/".to_string()),
            ..ClientConfig::default()
        };
        let client = OpenAiClient::from_config(&config).unwrap();
        assert_eq!(client.base_url, "http://localhost:1234/v1");
    }
}
