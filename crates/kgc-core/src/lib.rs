//! KGC Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout the KGC system:
//! - Triple model and payload validation
//! - Few-shot example and domain schema models
//! - LM client contract (grounded extraction + JSON generation)
//! - Common error types
//! - Configuration management

pub mod client;
pub mod config;
pub mod example;
pub mod triple;

pub use client::{GenerateRequest, GroundedRequest, LmClient, RawItem};
pub use config::{AppConfig, ClientConfig, ConfigError, ExtractionConfig, Provider};
pub use example::{DomainSchema, ExtractionMode, ExampleTriple, FewShotExample, GroundedExtraction};
pub use triple::{
    dedup_triples, normalize, ExtractionPhase, Inference, Triple, TripleKey, TripleValidator,
    ValidationReport,
};

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors surfaced by LM client implementations.
///
/// The refinement loop treats every variant identically (the iteration is
/// recorded as failed and accumulated triples are preserved), with the
/// exception of `Cancelled`, which maps to the `cancelled` stop reason.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("failed to parse model output: {0}")]
    Parse(String),

    #[error("request cancelled")]
    Cancelled,
}

/// Result alias for client operations.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Errors raised while loading domain resources.
///
/// Resource errors are always fatal: there is no silent fallback when a
/// prompt file is missing or a bridging prompt lacks a substitution site.
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("resource not found: {path}")]
    NotFound { path: PathBuf },

    #[error("invalid JSON in {path}: {message}")]
    InvalidJson { path: PathBuf, message: String },

    #[error("prompt is empty: {path}")]
    EmptyPrompt { path: PathBuf },

    #[error("bridging prompt {path} is missing required substitution site {site}")]
    MissingSubstitution { path: PathBuf, site: &'static str },

    #[error("unknown domain '{name}'. Available: {available}")]
    UnknownDomain { name: String, available: String },
}

/// Core error type for KGC operations.
#[derive(Error, Debug)]
pub enum KgcError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, KgcError>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_display() {
        let err = ClientError::Timeout(60);
        assert_eq!(err.to_string(), "request timed out after 60s");
    }

    #[test]
    fn test_resource_error_display() {
        let err = ResourceError::MissingSubstitution {
            path: PathBuf::from("bridging.txt"),
            site: "{num_components}",
        };
        assert!(err.to_string().contains("{num_components}"));
    }

    #[test]
    fn test_client_error_converts_to_core_error() {
        fn fails() -> Result<()> {
            Err(ClientError::Http("502 Bad Gateway".to_string()))?;
            Ok(())
        }
        assert!(matches!(fails(), Err(KgcError::Client(_))));
    }
}
