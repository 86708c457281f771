//! Extraction audit metadata
//!
//! Every processed record carries an [`ExtractionMetadata`] describing the
//! model, prompts, input shape, triple statistics, graph structure, and the
//! full refinement trace. The record is what makes a run auditable after
//! the fact, so each field is computed from the final triple set rather
//! than carried forward from intermediate state.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kgc_core::{ExtractionConfig, ExtractionMode, Inference, Triple};
use kgc_domain::Domain;
use kgc_graph::{GraphStats, TripleGraph};

use crate::refine::{IterationRecord, RefinementTrace, StopReason};

/// Number of relations reported in [`RelationAnalysis::top`].
const TOP_RELATIONS: usize = 10;

// ============================================================================
// Metadata model
// ============================================================================

/// How the triple set was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Initial extraction plus connectivity refinement
    IterativeConnectivityAware,
    /// Initial extraction only (`max_iterations = 0`)
    SimpleOneStep,
}

/// Prompt identifiers resolved for this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptIds {
    pub extraction: String,
    pub bridging: String,
}

/// Input text measurements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputStats {
    pub text_length_chars: usize,
    pub text_length_words: usize,
}

/// Triple counts and their shares of the total.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionCounts {
    pub total_triples: usize,
    pub initial_triples: usize,
    pub bridging_triples: usize,
    pub explicit: usize,
    pub contextual: usize,
    pub source_grounded: usize,
    pub initial_pct: f64,
    pub bridging_pct: f64,
    pub explicit_pct: f64,
    pub contextual_pct: f64,
    pub source_grounded_pct: f64,
}

/// Entity membership against the original text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityAnalysis {
    pub total_unique: usize,
    /// Entities found in the text by case-folded substring containment
    pub appearing_in_text: usize,
    pub inferred_only: usize,
    pub appearing_in_text_pct: f64,
    pub inferred_only_pct: f64,
}

/// One relation and its frequency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationCount {
    pub relation: String,
    pub count: usize,
}

/// Relation vocabulary statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationAnalysis {
    pub unique_relations: usize,
    /// Most frequent relations, descending; ties break lexicographically
    pub top: Vec<RelationCount>,
}

/// Snapshot of the graph right after the initial extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialSnapshot {
    pub triples: usize,
    pub disconnected_components: usize,
}

/// Where the refinement loop ended up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalState {
    pub total_triples: usize,
    pub disconnected_components: usize,
    pub is_connected: bool,
    pub iterations_used: u32,
    pub stop_reason: StopReason,
    /// `initial_components - final_components`; negative values are kept
    /// rather than clamped, so a regression stays visible
    pub connectivity_improvement: i64,
}

/// Audit block for the refinement phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterativeExtraction {
    pub max_disconnected: usize,
    pub max_iterations: u32,
    pub initial_extraction: InitialSnapshot,
    pub refinement_iterations: Vec<IterationRecord>,
    pub final_state: FinalState,
    /// 1 initial call + 1 per iteration that received a response
    pub total_llm_calls: u32,
}

/// The audit record produced alongside every extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    pub record_id: String,
    pub extraction_method: ExtractionMethod,
    pub model_identifier: String,
    pub temperature: f32,
    pub timestamp: DateTime<Utc>,
    pub domain_id: String,
    pub mode: ExtractionMode,
    pub prompt_identifiers: PromptIds,
    pub empty_input: bool,
    /// Items dropped by validation across both phases
    pub invalid_items_dropped: usize,
    pub input: InputStats,
    pub extraction_results: ExtractionCounts,
    pub graph_structure: GraphStats,
    pub entity_analysis: EntityAnalysis,
    pub relation_analysis: RelationAnalysis,
    /// Present only when the method is iterative
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterative_extraction: Option<IterativeExtraction>,
    /// LM calls at this crate's granularity: 1 initial + 1 per iteration used
    pub total_llm_calls: u32,
    pub partial_result: bool,
}

// ============================================================================
// Assembly
// ============================================================================

/// Everything the assembler needs to describe one run.
pub(crate) struct MetadataInputs<'a> {
    pub record_id: &'a str,
    pub text: &'a str,
    pub domain: &'a Domain,
    pub config: &'a ExtractionConfig,
    pub model_identifier: &'a str,
    pub initial_count: usize,
    pub triples: &'a [Triple],
    pub trace: Option<&'a RefinementTrace>,
    pub invalid_items_dropped: usize,
    pub empty_input: bool,
}

pub(crate) fn assemble_metadata(inputs: MetadataInputs<'_>) -> ExtractionMetadata {
    let method = if inputs.config.max_iterations == 0 {
        ExtractionMethod::SimpleOneStep
    } else {
        ExtractionMethod::IterativeConnectivityAware
    };

    let graph = TripleGraph::build(inputs.triples);
    let iterations_used = inputs.trace.map(|t| t.iterations_used).unwrap_or(0);
    let total_llm_calls = if inputs.empty_input {
        0
    } else {
        1 + iterations_used
    };

    let iterative_extraction = match (method, inputs.trace) {
        (ExtractionMethod::IterativeConnectivityAware, Some(trace)) => Some(IterativeExtraction {
            max_disconnected: inputs.config.max_disconnected,
            max_iterations: inputs.config.max_iterations,
            initial_extraction: InitialSnapshot {
                triples: inputs.initial_count,
                disconnected_components: trace.initial_components,
            },
            refinement_iterations: trace.iterations.clone(),
            final_state: FinalState {
                total_triples: inputs.triples.len(),
                disconnected_components: trace.final_components,
                is_connected: trace.final_components == 1,
                iterations_used: trace.iterations_used,
                stop_reason: trace.stop_reason,
                connectivity_improvement: trace.initial_components as i64
                    - trace.final_components as i64,
            },
            total_llm_calls,
        }),
        _ => None,
    };

    ExtractionMetadata {
        record_id: inputs.record_id.to_string(),
        extraction_method: method,
        model_identifier: inputs.model_identifier.to_string(),
        temperature: inputs.config.temperature,
        timestamp: Utc::now(),
        domain_id: inputs.domain.name().to_string(),
        mode: inputs.config.mode,
        prompt_identifiers: prompt_ids(inputs.domain, inputs.config.mode),
        empty_input: inputs.empty_input,
        invalid_items_dropped: inputs.invalid_items_dropped,
        input: InputStats {
            text_length_chars: inputs.text.chars().count(),
            text_length_words: inputs.text.split_whitespace().count(),
        },
        extraction_results: count_triples(inputs.triples, inputs.initial_count),
        graph_structure: graph.stats(),
        entity_analysis: analyze_entities(&graph, inputs.text),
        relation_analysis: analyze_relations(inputs.triples),
        iterative_extraction,
        total_llm_calls,
        partial_result: inputs.trace.map(|t| t.partial_result).unwrap_or(false),
    }
}

fn prompt_ids(domain: &Domain, mode: ExtractionMode) -> PromptIds {
    let ids = domain.prompt_identifiers(mode);
    PromptIds {
        extraction: ids.extraction,
        bridging: ids.bridging,
    }
}

fn pct(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * part as f64 / total as f64
    }
}

fn count_triples(triples: &[Triple], initial_count: usize) -> ExtractionCounts {
    let total = triples.len();
    let bridging = triples
        .iter()
        .filter(|t| t.iteration_source >= 1)
        .count();
    let explicit = triples
        .iter()
        .filter(|t| t.inference == Inference::Explicit)
        .count();
    let grounded = triples.iter().filter(|t| t.is_grounded()).count();

    ExtractionCounts {
        total_triples: total,
        initial_triples: initial_count,
        bridging_triples: bridging,
        explicit,
        contextual: total - explicit,
        source_grounded: grounded,
        initial_pct: pct(initial_count, total),
        bridging_pct: pct(bridging, total),
        explicit_pct: pct(explicit, total),
        contextual_pct: pct(total - explicit, total),
        source_grounded_pct: pct(grounded, total),
    }
}

fn analyze_entities(graph: &TripleGraph, text: &str) -> EntityAnalysis {
    let folded_text = text.to_lowercase();
    let labels = graph.node_labels();
    let total = labels.len();
    let appearing = labels
        .iter()
        .filter(|label| folded_text.contains(&label.to_lowercase()))
        .count();

    EntityAnalysis {
        total_unique: total,
        appearing_in_text: appearing,
        inferred_only: total - appearing,
        appearing_in_text_pct: pct(appearing, total),
        inferred_only_pct: pct(total - appearing, total),
    }
}

fn analyze_relations(triples: &[Triple]) -> RelationAnalysis {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for triple in triples {
        *counts.entry(kgc_core::normalize(&triple.relation)).or_default() += 1;
    }

    let unique_relations = counts.len();
    let mut top: Vec<RelationCount> = counts
        .into_iter()
        .map(|(relation, count)| RelationCount { relation, count })
        .collect();
    top.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.relation.cmp(&b.relation)));
    top.truncate(TOP_RELATIONS);

    RelationAnalysis {
        unique_relations,
        top,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn triple(h: &str, r: &str, t: &str) -> Triple {
        Triple::new(h, r, t)
    }

    #[test]
    fn test_counts_and_percentages() {
        let mut bridging = triple("Bob", "met", "Carol");
        bridging.inference = Inference::Contextual;
        bridging.iteration_source = 1;
        let mut grounded = triple("Alice", "knows", "Bob");
        grounded.char_start = Some(0);
        grounded.char_end = Some(16);

        let triples = vec![grounded, triple("Carol", "knows", "Dave"), bridging];
        let counts = count_triples(&triples, 2);

        assert_eq!(counts.total_triples, 3);
        assert_eq!(counts.initial_triples, 2);
        assert_eq!(counts.bridging_triples, 1);
        assert_eq!(counts.explicit, 2);
        assert_eq!(counts.contextual, 1);
        assert_eq!(counts.source_grounded, 1);
        assert!((counts.contextual_pct - 33.333).abs() < 0.01);
    }

    #[test]
    fn test_percentages_of_empty_set_are_zero() {
        let counts = count_triples(&[], 0);
        assert_eq!(counts.explicit_pct, 0.0);
        assert_eq!(counts.total_triples, 0);
    }

    #[test]
    fn test_entity_analysis_uses_case_folded_containment() {
        let triples = vec![triple("ALICE", "knows", "Bob"), triple("Bob", "met", "Zeus")];
        let graph = TripleGraph::build(&triples);
        let analysis = analyze_entities(&graph, "alice knows bob.");

        assert_eq!(analysis.total_unique, 3);
        assert_eq!(analysis.appearing_in_text, 2);
        assert_eq!(analysis.inferred_only, 1);
    }

    #[test]
    fn test_relation_analysis_top_k_ordering() {
        let mut triples = Vec::new();
        for i in 0..3 {
            triples.push(triple(&format!("A{i}"), "knows", &format!("B{i}")));
        }
        triples.push(triple("X", "met", "Y"));
        triples.push(triple("Y", "Met", "Z"));
        triples.push(triple("P", "advises", "Q"));

        let analysis = analyze_relations(&triples);
        assert_eq!(analysis.unique_relations, 3);
        assert_eq!(analysis.top[0].relation, "knows");
        assert_eq!(analysis.top[0].count, 3);
        // case-folded: "met" and "Met" collapse
        assert_eq!(analysis.top[1].relation, "met");
        assert_eq!(analysis.top[1].count, 2);
    }
}
