//! Connectivity refinement
//!
//! Iteratively asks the model for bridging triples until the graph induced
//! by the accumulated triple set is connected to within tolerance. The loop
//! is deliberately conservative: it never discards validated triples, it
//! stops as soon as an iteration fails to add anything or fails to reduce
//! the component count, and a backend failure ends the loop with everything
//! accumulated so far intact.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use kgc_core::{
    dedup_triples, ClientError, ExtractionPhase, GenerateRequest, LmClient, Triple, TripleValidator,
};
use kgc_domain::Domain;
use kgc_graph::TripleGraph;

// ============================================================================
// Stop reasons and trace records
// ============================================================================

/// Why the refinement loop ended. Exactly one is emitted per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    ConnectivityGoalAchieved,
    MaxIterationsReached,
    NoNewTriplesFound,
    NoConnectivityImprovement,
    LlmFailure,
    Cancelled,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ConnectivityGoalAchieved => "connectivity_goal_achieved",
            Self::MaxIterationsReached => "max_iterations_reached",
            Self::NoNewTriplesFound => "no_new_triples_found",
            Self::NoConnectivityImprovement => "no_connectivity_improvement",
            Self::LlmFailure => "llm_failure",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Outcome of one refinement iteration's LM call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IterationStatus {
    Success,
    Failed,
}

/// Audit record for one refinement iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationRecord {
    /// 1-based iteration index
    pub iteration: u32,
    pub status: IterationStatus,
    /// Triples accepted this iteration after validation and dedup
    pub new_triples: usize,
    /// Size of the accumulated set after this iteration
    pub total_triples: usize,
    /// Component count after this iteration
    pub disconnected_components: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub early_stop_reason: Option<StopReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Full audit trail of a refinement run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinementTrace {
    /// Per-iteration records, in order
    pub iterations: Vec<IterationRecord>,
    /// Iterations that received a model response
    pub iterations_used: u32,
    pub stop_reason: StopReason,
    /// True when the loop ended on a failure or cancellation
    pub partial_result: bool,
    /// Component count before the first iteration
    pub initial_components: usize,
    /// Component count over the final triple set
    pub final_components: usize,
    /// Items dropped by validation across all iterations
    pub items_dropped: usize,
}

// ============================================================================
// Cancellation
// ============================================================================

/// Cooperative cancellation flag, observed between iterations.
///
/// Cancelling mid-call is the client's business; a client that surfaces
/// [`ClientError::Cancelled`] maps to the `cancelled` stop reason rather
/// than `llm_failure`.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ============================================================================
// Refiner
// ============================================================================

/// Knobs for a refinement run.
#[derive(Debug, Clone, Default)]
pub struct RefineOptions {
    /// The loop stops once the graph has at most this many components
    pub max_disconnected: usize,
    /// Iteration budget; 0 disables refinement entirely
    pub max_iterations: u32,
    /// Sampling temperature for bridging calls
    pub temperature: f32,
    /// Optional cancellation flag
    pub cancel: Option<CancelFlag>,
}

/// Iterative connectivity refiner over an LM backend.
pub struct ConnectivityRefiner<'a> {
    client: &'a dyn LmClient,
}

impl<'a> ConnectivityRefiner<'a> {
    pub fn new(client: &'a dyn LmClient) -> Self {
        Self { client }
    }

    /// Refine a triple set until it is connected to within tolerance.
    ///
    /// Returns the accumulated triples (initial first, then each iteration's
    /// additions in model order) and the audit trace. This never fails: a
    /// backend error ends the loop with `stop_reason = llm_failure` and
    /// whatever was accumulated.
    pub async fn refine(
        &self,
        text: &str,
        domain: &Domain,
        initial_triples: Vec<Triple>,
        options: &RefineOptions,
    ) -> (Vec<Triple>, RefinementTrace) {
        let mut all_triples = dedup_triples(initial_triples);
        let mut seen: HashSet<_> = all_triples.iter().map(Triple::key).collect();

        let initial_components = TripleGraph::build(&all_triples).component_count();
        let mut prev_components = initial_components;
        let mut iterations: Vec<IterationRecord> = Vec::new();
        let mut iterations_used = 0u32;
        let mut items_dropped = 0usize;
        let mut partial_result = false;

        let stop_reason = loop {
            // The goal wins over every other exit, including an exhausted
            // budget: a graph that is already connected enough never reports
            // max_iterations_reached.
            if prev_components <= options.max_disconnected {
                break StopReason::ConnectivityGoalAchieved;
            }
            if iterations_used >= options.max_iterations {
                break StopReason::MaxIterationsReached;
            }
            if options.cancel.as_ref().is_some_and(CancelFlag::is_cancelled) {
                partial_result = true;
                break StopReason::Cancelled;
            }

            let k = iterations_used + 1;
            let graph = TripleGraph::build(&all_triples);
            let components = graph.components();
            let prompt = render_bridging_prompt(
                domain.bridging_prompt(),
                components.len(),
                &graph.format_components(&components),
                text,
            );

            tracing::debug!(
                iteration = k,
                components = components.len(),
                "requesting bridging triples"
            );

            let raw = match self
                .client
                .generate_json(GenerateRequest {
                    prompt: &prompt,
                    schema: domain.schema(),
                    temperature: options.temperature,
                })
                .await
            {
                Ok(raw) => raw,
                Err(ClientError::Cancelled) => {
                    partial_result = true;
                    break StopReason::Cancelled;
                }
                Err(e) => {
                    tracing::warn!(iteration = k, error = %e, "bridging call failed, keeping accumulated triples");
                    iterations.push(IterationRecord {
                        iteration: k,
                        status: IterationStatus::Failed,
                        new_triples: 0,
                        total_triples: all_triples.len(),
                        disconnected_components: prev_components,
                        early_stop_reason: None,
                        error: Some(e.to_string()),
                    });
                    partial_result = true;
                    break StopReason::LlmFailure;
                }
            };

            let report =
                TripleValidator::new(ExtractionPhase::Refinement(k), Some(text)).validate_all(raw);
            items_dropped += report.dropped;

            // Discard anything already known; the remainder is this
            // iteration's contribution, deduplicated within itself too.
            let new_triples: Vec<Triple> = report
                .triples
                .into_iter()
                .filter(|t| seen.insert(t.key()))
                .collect();

            if new_triples.is_empty() {
                iterations_used = k;
                iterations.push(IterationRecord {
                    iteration: k,
                    status: IterationStatus::Success,
                    new_triples: 0,
                    total_triples: all_triples.len(),
                    disconnected_components: prev_components,
                    early_stop_reason: Some(StopReason::NoNewTriplesFound),
                    error: None,
                });
                break StopReason::NoNewTriplesFound;
            }

            let accepted = new_triples.len();
            all_triples.extend(new_triples);
            let current_components = TripleGraph::build(&all_triples).component_count();

            if current_components >= prev_components {
                // The triples stay: they validated and may still be useful.
                // Only the loop gives up.
                iterations_used = k;
                iterations.push(IterationRecord {
                    iteration: k,
                    status: IterationStatus::Success,
                    new_triples: accepted,
                    total_triples: all_triples.len(),
                    disconnected_components: current_components,
                    early_stop_reason: Some(StopReason::NoConnectivityImprovement),
                    error: None,
                });
                break StopReason::NoConnectivityImprovement;
            }

            iterations.push(IterationRecord {
                iteration: k,
                status: IterationStatus::Success,
                new_triples: accepted,
                total_triples: all_triples.len(),
                disconnected_components: current_components,
                early_stop_reason: None,
                error: None,
            });

            tracing::info!(
                iteration = k,
                new_triples = accepted,
                components = current_components,
                "refinement iteration complete"
            );

            prev_components = current_components;
            iterations_used = k;
        };

        let final_components = TripleGraph::build(&all_triples).component_count();
        tracing::info!(
            %stop_reason,
            iterations_used,
            initial_components,
            final_components,
            "refinement finished"
        );

        let trace = RefinementTrace {
            iterations,
            iterations_used,
            stop_reason,
            partial_result,
            initial_components,
            final_components,
            items_dropped,
        };

        (all_triples, trace)
    }
}

/// Substitute the three bridging prompt sites literally.
pub fn render_bridging_prompt(
    template: &str,
    num_components: usize,
    component_info: &str,
    text: &str,
) -> String {
    template
        .replace("{num_components}", &num_components.to_string())
        .replace("{component_info}", component_info)
        .replace("{text}", text)
}

// ============================================================================
// Tests
// ============================================================================
