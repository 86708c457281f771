//! Few-shot example and domain schema models
//!
//! These mirror the on-disk shape of domain resource bundles: an examples
//! file is a JSON array of [`FewShotExample`], a schema file is a single
//! [`DomainSchema`] object.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Inference};

/// Modes for graph extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    /// Open-vocabulary extraction
    #[default]
    Open,
    /// Extraction constrained by the domain type schema
    Constrained,
}

impl std::str::FromStr for ExtractionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "constrained" => Ok(Self::Constrained),
            _ => Err(ConfigError::InvalidValue {
                key: "mode".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Constrained => write!(f, "constrained"),
        }
    }
}

/// Triple attributes carried by a few-shot example extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleTriple {
    pub head: String,
    pub relation: String,
    pub tail: String,
    #[serde(default)]
    pub inference: Inference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
}

/// A single grounded extraction inside a few-shot example.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundedExtraction {
    /// The span the triple was extracted from
    pub extraction_text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_start: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_end: Option<usize>,

    /// The triple demonstrated by this span
    pub attributes: ExampleTriple,
}

/// A few-shot example: a source text and the extractions it should yield.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FewShotExample {
    pub text: String,
    pub extractions: Vec<GroundedExtraction>,
}

/// Schema defining allowed entity and relation types for a domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainSchema {
    #[serde(default)]
    pub entity_types: BTreeSet<String>,

    #[serde(default)]
    pub relation_types: BTreeSet<String>,
}

impl DomainSchema {
    pub fn is_empty(&self) -> bool {
        self.entity_types.is_empty() && self.relation_types.is_empty()
    }
}
