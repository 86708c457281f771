//! KGC Client - LM backend implementations
//!
//! Implements the two-operation client contract from `kgc-core` for an
//! OpenAI-compatible API and for Ollama. All backend failures surface as
//! [`kgc_core::ClientError`]; callers never see provider-specific errors.

pub mod json;
pub mod ollama;
pub mod openai;
pub mod prompts;

pub use json::parse_items;
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

use kgc_core::{ClientConfig, LmClient, Provider, Result};

/// Create an LM client from config
pub fn create_client(config: &ClientConfig) -> Result<Box<dyn LmClient>> {
    match config.provider {
        Provider::OpenAi => Ok(Box::new(OpenAiClient::from_config(config)?)),
        Provider::Ollama => Ok(Box::new(OllamaClient::from_config(config))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_creates_ollama_without_credentials() {
        let config = ClientConfig {
            provider: Provider::Ollama,
            model: "llama3.1".to_string(),
            ..ClientConfig::default()
        };
        let client = create_client(&config).unwrap();
        assert_eq!(client.model_name(), "llama3.1");
    }

    #[test]
    fn test_factory_rejects_openai_without_key() {
        let config = ClientConfig::default();
        assert!(create_client(&config).is_err());
    }
}
