//! LM client contract
//!
//! Backends are modeled as variants of a single capability set: a grounded
//! extraction call used for the initial pass, and an ungrounded JSON
//! generation call used for bridging. The refiner is polymorphic over this
//! trait and never branches on backend identity.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::example::{DomainSchema, FewShotExample};
use crate::ClientResult;

// ============================================================================
// Raw payload items
// ============================================================================

/// A loosely typed item returned by an LM backend.
///
/// Keys beyond the known set are ignored; values of the wrong shape for a
/// field degrade to `None` rather than failing the batch. Validation into a
/// proper [`crate::Triple`] happens downstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    #[serde(default)]
    pub head: Option<String>,
    #[serde(default)]
    pub relation: Option<String>,
    #[serde(default)]
    pub tail: Option<String>,
    #[serde(default)]
    pub inference: Option<String>,
    #[serde(default)]
    pub justification: Option<String>,
    #[serde(default)]
    pub char_start: Option<usize>,
    #[serde(default)]
    pub char_end: Option<usize>,
    #[serde(default)]
    pub extraction_text: Option<String>,
}

impl RawItem {
    /// Build an item from an arbitrary JSON value, field by field.
    ///
    /// Missing or mistyped fields become `None`; a non-object value yields an
    /// empty item, which validation will drop and count.
    pub fn from_value(value: &Value) -> Self {
        let get_str = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let get_offset = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_u64)
                .map(|n| n as usize)
        };

        Self {
            head: get_str("head"),
            relation: get_str("relation"),
            tail: get_str("tail"),
            inference: get_str("inference"),
            justification: get_str("justification"),
            char_start: get_offset("char_start"),
            char_end: get_offset("char_end"),
            extraction_text: get_str("extraction_text"),
        }
    }
}

// ============================================================================
// Requests
// ============================================================================

/// Request for the grounded extraction operation.
#[derive(Debug, Clone, Copy)]
pub struct GroundedRequest<'a> {
    /// Fully rendered extraction prompt (text already injected)
    pub prompt: &'a str,

    /// Few-shot examples demonstrating the expected output shape
    pub examples: &'a [FewShotExample],

    /// Optional type schema constraining entities and relations
    pub schema: Option<&'a DomainSchema>,

    /// Sampling temperature
    pub temperature: f32,
}

/// Request for the ungrounded JSON generation operation.
#[derive(Debug, Clone, Copy)]
pub struct GenerateRequest<'a> {
    /// Fully rendered prompt
    pub prompt: &'a str,

    /// Optional type schema constraining entities and relations
    pub schema: Option<&'a DomainSchema>,

    /// Sampling temperature
    pub temperature: f32,
}

// ============================================================================
// Client trait
// ============================================================================

/// Contract implemented by every LM backend.
///
/// Both operations are suspension points and may block up to the client's
/// configured timeout. Retry policy belongs to the client, never to callers.
#[async_trait]
pub trait LmClient: Send + Sync {
    /// Extract structured items from text with optional source grounding.
    ///
    /// Items MAY carry `char_start`/`char_end`; presence is opportunistic.
    async fn extract_grounded(&self, request: GroundedRequest<'_>) -> ClientResult<Vec<RawItem>>;

    /// Generate structured items without source grounding.
    ///
    /// Used for bridging, where inferring a connection matters more than
    /// pointing at a span.
    async fn generate_json(&self, request: GenerateRequest<'_>) -> ClientResult<Vec<RawItem>>;

    /// Identifier of the underlying model, for metadata and logging.
    fn model_name(&self) -> &str;
}

// ============================================================================
// Tests
// ============================================================================
