//! Triple model and payload validation
//!
//! LM outputs are loosely typed JSON. This module turns raw payload items
//! into validated [`Triple`] values, dropping malformed items with a warning
//! instead of failing the whole extraction: degraded-but-useful output beats
//! a hard failure when a model emits the occasional partial item.

use serde::{Deserialize, Serialize};

use crate::client::RawItem;

// ============================================================================
// Inference
// ============================================================================

/// How a triple was obtained from the source text.
///
/// - `Explicit`: directly supported by the text
/// - `Contextual`: inferred, typically to connect graph components
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Inference {
    #[default]
    Explicit,
    Contextual,
}

impl Inference {
    /// Parse a raw inference label, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "explicit" => Some(Self::Explicit),
            "contextual" => Some(Self::Contextual),
            _ => None,
        }
    }
}

impl std::fmt::Display for Inference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Explicit => write!(f, "explicit"),
            Self::Contextual => write!(f, "contextual"),
        }
    }
}

// ============================================================================
// Triple
// ============================================================================

/// A directed (head, relation, tail) assertion with provenance.
///
/// `iteration_source = 0` marks the initial extraction; `k >= 1` marks the
/// k-th refinement iteration. Grounding fields are opportunistic: they are
/// present only when the model returned a consistent character span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triple {
    /// Source entity of the relationship
    pub head: String,

    /// Relationship type connecting head to tail
    pub relation: String,

    /// Target entity of the relationship
    pub tail: String,

    /// Whether the triple is stated or inferred
    pub inference: Inference,

    /// Brief rationale; always present on refinement-emitted triples
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,

    /// Byte offset of the supporting span start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_start: Option<usize>,

    /// Byte offset of the supporting span end
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_end: Option<usize>,

    /// Verbatim supporting span from the source text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_text: Option<String>,

    /// Phase that produced this triple (0 = initial, k >= 1 = refinement)
    pub iteration_source: u32,
}

impl Triple {
    /// Create a minimal explicit triple from the initial extraction.
    pub fn new(
        head: impl Into<String>,
        relation: impl Into<String>,
        tail: impl Into<String>,
    ) -> Self {
        Self {
            head: head.into(),
            relation: relation.into(),
            tail: tail.into(),
            inference: Inference::Explicit,
            justification: None,
            char_start: None,
            char_end: None,
            extraction_text: None,
            iteration_source: 0,
        }
    }

    /// Identity used for duplicate detection.
    pub fn key(&self) -> TripleKey {
        TripleKey::new(&self.head, &self.relation, &self.tail)
    }

    /// Whether both ends of the character span are present.
    pub fn is_grounded(&self) -> bool {
        self.char_start.is_some() && self.char_end.is_some()
    }
}

/// Case-fold and trim an entity or relation label.
///
/// Identity comparisons and graph node keys both go through this, so
/// re-extractions of the same fact with different casing or padding
/// collapse onto one entry.
pub fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Normalized `(head, relation, tail)` identity of a triple.
///
/// `inference`, grounding, and `iteration_source` are deliberately excluded:
/// re-extractions of a known fact are redundant regardless of provenance,
/// and keeping the earliest occurrence preserves the earliest grounding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TripleKey {
    head: String,
    relation: String,
    tail: String,
}

impl TripleKey {
    pub fn new(head: &str, relation: &str, tail: &str) -> Self {
        Self {
            head: normalize(head),
            relation: normalize(relation),
            tail: normalize(tail),
        }
    }
}

/// Drop duplicate triples by identity, first occurrence wins.
///
/// Insertion order of the survivors is preserved.
pub fn dedup_triples(triples: Vec<Triple>) -> Vec<Triple> {
    let mut seen = std::collections::HashSet::new();
    triples
        .into_iter()
        .filter(|t| seen.insert(t.key()))
        .collect()
}

// ============================================================================
// Validation
// ============================================================================

/// Which phase produced the payload under validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionPhase {
    /// Initial extraction; `inference` defaults to explicit when absent.
    Initial,
    /// Refinement iteration `k`; `inference` is forced to contextual and a
    /// non-empty justification is required.
    Refinement(u32),
}

impl ExtractionPhase {
    fn iteration_source(&self) -> u32 {
        match self {
            Self::Initial => 0,
            Self::Refinement(k) => *k,
        }
    }
}

/// Outcome of validating a batch of raw payload items.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Triples that passed validation, in payload order
    pub triples: Vec<Triple>,
    /// Number of items dropped as malformed
    pub dropped: usize,
}

/// Validates raw LM payload items into [`Triple`] values.
pub struct TripleValidator<'a> {
    phase: ExtractionPhase,
    /// Source text, used to check grounding consistency when available
    text: Option<&'a str>,
}

impl<'a> TripleValidator<'a> {
    pub fn new(phase: ExtractionPhase, text: Option<&'a str>) -> Self {
        Self { phase, text }
    }

    /// Validate a batch; malformed items are dropped with a warning and
    /// counted in the report.
    pub fn validate_all(&self, items: Vec<RawItem>) -> ValidationReport {
        let mut report = ValidationReport::default();
        for item in items {
            match self.validate(item) {
                Some(triple) => report.triples.push(triple),
                None => report.dropped += 1,
            }
        }
        report
    }

    /// Validate a single item. Returns `None` when the item is dropped.
    pub fn validate(&self, item: RawItem) -> Option<Triple> {
        let head = item.head.as_deref().unwrap_or("").trim().to_string();
        let relation = item.relation.as_deref().unwrap_or("").trim().to_string();
        let tail = item.tail.as_deref().unwrap_or("").trim().to_string();

        if head.is_empty() || relation.is_empty() || tail.is_empty() {
            tracing::warn!(
                ?item,
                "dropping triple with empty head, relation, or tail"
            );
            return None;
        }

        let inference = match self.phase {
            ExtractionPhase::Refinement(_) => Inference::Contextual,
            ExtractionPhase::Initial => match item.inference.as_deref() {
                None => Inference::Explicit,
                Some(raw) => match Inference::parse(raw) {
                    Some(inference) => inference,
                    None => {
                        tracing::warn!(label = raw, "dropping triple with unknown inference label");
                        return None;
                    }
                },
            },
        };

        let justification = item
            .justification
            .as_deref()
            .map(str::trim)
            .filter(|j| !j.is_empty())
            .map(str::to_string);

        if matches!(self.phase, ExtractionPhase::Refinement(_)) && justification.is_none() {
            tracing::warn!(%head, %relation, %tail, "dropping bridging triple without justification");
            return None;
        }

        let (char_start, char_end, extraction_text) =
            self.accept_grounding(item.char_start, item.char_end, item.extraction_text);

        Some(Triple {
            head,
            relation,
            tail,
            inference,
            justification,
            char_start,
            char_end,
            extraction_text,
            iteration_source: self.phase.iteration_source(),
        })
    }

    /// Accept grounding fields only when internally consistent.
    ///
    /// Inconsistent spans are cleared rather than failing the item: grounding
    /// is opportunistic metadata, never a correctness requirement. The span
    /// comparison against `extraction_text` collapses runs of whitespace on
    /// both sides.
    fn accept_grounding(
        &self,
        char_start: Option<usize>,
        char_end: Option<usize>,
        extraction_text: Option<String>,
    ) -> (Option<usize>, Option<usize>, Option<String>) {
        let extraction_text = extraction_text.filter(|t| !t.is_empty());

        let (start, end) = match (char_start, char_end) {
            (Some(s), Some(e)) => (s, e),
            // A lone endpoint is meaningless
            _ => return (None, None, extraction_text),
        };

        if start > end {
            tracing::debug!(start, end, "clearing inverted grounding span");
            return (None, None, extraction_text);
        }

        if let Some(text) = self.text {
            if end > text.len() {
                tracing::debug!(end, len = text.len(), "clearing out-of-range grounding span");
                return (None, None, extraction_text);
            }
            if let (Some(span), Some(claimed)) = (text.get(start..end), extraction_text.as_deref())
            {
                if collapse_whitespace(span) != collapse_whitespace(claimed) {
                    tracing::debug!(start, end, "clearing grounding span that disagrees with extraction_text");
                    return (None, None, extraction_text);
                }
            } else if text.get(start..end).is_none() {
                // Not a char boundary; the span cannot be trusted
                return (None, None, extraction_text);
            }
        }

        (Some(start), Some(end), extraction_text)
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// Tests
// ============================================================================
