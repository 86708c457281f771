//! Ollama client for locally hosted models

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use kgc_core::{
    ClientConfig, ClientError, ClientResult, GenerateRequest, GroundedRequest, LmClient, RawItem,
};

use crate::json::parse_items;
use crate::openai::map_request_error;
use crate::prompts;

/// Ollama API client
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout_secs: u64,
}

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    /// Constrains the model to emit valid JSON
    format: &'static str,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaClient {
    /// Create a new client
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            timeout_secs: 120,
        }
    }

    /// Create from config
    pub fn from_config(config: &ClientConfig) -> Self {
        let mut client = Self::new(config.ollama_url.clone(), config.model.clone());
        client.timeout_secs = config.timeout_secs;
        client
    }

    async fn generate(&self, prompt: String, temperature: f32) -> ClientResult<String> {
        let request = OllamaRequest {
            model: self.model.clone(),
            prompt,
            stream: false,
            format: "json",
            options: OllamaOptions { temperature },
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .timeout(Duration::from_secs(self.timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| map_request_error(e, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Http(format!("{status}: {body}")));
        }

        let parsed: OllamaResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Parse(format!("malformed Ollama response: {e}")))?;

        Ok(parsed.response)
    }
}

#[async_trait]
impl LmClient for OllamaClient {
    async fn extract_grounded(&self, request: GroundedRequest<'_>) -> ClientResult<Vec<RawItem>> {
        let preamble = prompts::grounded_system_message(request.examples, request.schema);
        let prompt = format!("{preamble}\n\n{}", request.prompt);

        let content = self.generate(prompt, request.temperature).await?;
        tracing::debug!(chars = content.len(), "grounded extraction response received");
        parse_items(&content)
    }

    async fn generate_json(&self, request: GenerateRequest<'_>) -> ClientResult<Vec<RawItem>> {
        let preamble = prompts::generate_system_message(request.schema);
        let prompt = format!("{preamble}\n\n{}", request.prompt);

        let content = self.generate(prompt, request.temperature).await?;
        tracing::debug!(chars = content.len(), "generation response received");
        parse_items(&content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
