//! KGC Configuration Management
//!
//! Handles configuration from environment variables and TOML config files
//! with sensible defaults for local development.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::example::ExtractionMode;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// LM backend configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// Extraction and refinement parameters
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Optional root directory for on-disk domain bundles
    #[serde(default)]
    pub domains_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(provider) = std::env::var("KGC_PROVIDER") {
            config.client.provider = provider.parse()?;
        }
        if let Ok(model) = std::env::var("KGC_MODEL") {
            config.client.model = model;
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.client.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            config.client.base_url = Some(url);
        }
        if let Ok(url) = std::env::var("OLLAMA_URL") {
            config.client.ollama_url = url;
        }
        if let Ok(secs) = std::env::var("KGC_TIMEOUT_SECS") {
            config.client.timeout_secs = parse_value("KGC_TIMEOUT_SECS", &secs)?;
        }

        if let Ok(domain) = std::env::var("KGC_DOMAIN") {
            config.extraction.domain = domain;
        }
        if let Ok(mode) = std::env::var("KGC_MODE") {
            config.extraction.mode = mode.parse()?;
        }
        if let Ok(temp) = std::env::var("KGC_TEMPERATURE") {
            config.extraction.temperature = parse_value("KGC_TEMPERATURE", &temp)?;
        }
        if let Ok(max) = std::env::var("KGC_MAX_DISCONNECTED") {
            config.extraction.max_disconnected = parse_value("KGC_MAX_DISCONNECTED", &max)?;
        }
        if let Ok(max) = std::env::var("KGC_MAX_ITERATIONS") {
            config.extraction.max_iterations = parse_value("KGC_MAX_ITERATIONS", &max)?;
        }

        if let Ok(dir) = std::env::var("KGC_DOMAINS_DIR") {
            config.domains_dir = Some(PathBuf::from(dir));
        }

        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// LM backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend to use
    pub provider: Provider,

    /// Model identifier
    pub model: String,

    /// API key for hosted providers
    pub api_key: Option<String>,

    /// Base URL override (Azure, LM Studio, other OpenAI-compatible servers)
    pub base_url: Option<String>,

    /// Ollama server URL
    pub ollama_url: String,

    /// Maximum tokens per completion
    pub max_tokens: u32,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            provider: Provider::OpenAi,
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            base_url: None,
            ollama_url: "http://localhost:11434".to_string(),
            max_tokens: 2048,
            timeout_secs: 120,
        }
    }
}

/// Supported LM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Ollama,
}

impl std::str::FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            _ => Err(ConfigError::InvalidValue {
                key: "KGC_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Extraction and refinement parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Domain bundle to extract with
    pub domain: String,

    /// Open or constrained extraction
    pub mode: ExtractionMode,

    /// Sampling temperature
    pub temperature: f32,

    /// Refinement stops once the graph has at most this many components
    pub max_disconnected: usize,

    /// Refinement iteration budget; 0 disables refinement
    pub max_iterations: u32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            domain: "default".to_string(),
            mode: ExtractionMode::Open,
            temperature: 0.0,
            max_disconnected: 3,
            max_iterations: 2,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
