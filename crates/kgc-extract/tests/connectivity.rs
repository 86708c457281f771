//! End-to-end scenarios for the extraction engine against a scripted mock
//! backend: goal met immediately, successful bridging, duplicate-only and
//! no-progress early stops, budget exhaustion, backend failure, and
//! cancellation.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use kgc_core::{
    ClientError, ClientResult, ExtractionConfig, GenerateRequest, GroundedRequest, Inference,
    LmClient, RawItem, Triple,
};
use kgc_domain::Domain;
use kgc_extract::{
    CancelFlag, ConnectivityRefiner, ExtractionMethod, Pipeline, Record, RefineOptions, StopReason,
};

// ============================================================================
// Scripted mock backend
// ============================================================================

#[derive(Default)]
struct MockLm {
    grounded: Mutex<VecDeque<ClientResult<Vec<RawItem>>>>,
    bridging: Mutex<VecDeque<ClientResult<Vec<RawItem>>>>,
    grounded_calls: AtomicUsize,
    bridging_calls: AtomicUsize,
}

impl MockLm {
    fn new() -> Self {
        Self::default()
    }

    fn push_grounded(&self, response: ClientResult<Vec<RawItem>>) {
        self.grounded.lock().unwrap().push_back(response);
    }

    fn push_bridging(&self, response: ClientResult<Vec<RawItem>>) {
        self.bridging.lock().unwrap().push_back(response);
    }
}

#[async_trait]
impl LmClient for MockLm {
    async fn extract_grounded(&self, _request: GroundedRequest<'_>) -> ClientResult<Vec<RawItem>> {
        self.grounded_calls.fetch_add(1, Ordering::SeqCst);
        self.grounded
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::Http("unexpected grounded call".to_string())))
    }

    async fn generate_json(&self, _request: GenerateRequest<'_>) -> ClientResult<Vec<RawItem>> {
        self.bridging_calls.fetch_add(1, Ordering::SeqCst);
        self.bridging
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::Http("unexpected bridging call".to_string())))
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn item(head: &str, relation: &str, tail: &str) -> RawItem {
    RawItem {
        head: Some(head.to_string()),
        relation: Some(relation.to_string()),
        tail: Some(tail.to_string()),
        ..RawItem::default()
    }
}

fn bridge(head: &str, relation: &str, tail: &str) -> RawItem {
    RawItem {
        justification: Some("inferred from shared context".to_string()),
        ..item(head, relation, tail)
    }
}

fn config(max_disconnected: usize, max_iterations: u32) -> ExtractionConfig {
    ExtractionConfig {
        max_disconnected,
        max_iterations,
        ..ExtractionConfig::default()
    }
}

fn pipeline(client: Arc<MockLm>, config: ExtractionConfig) -> Pipeline {
    Pipeline::new(client, Arc::new(Domain::builtin_default()), config)
}

fn assert_unique_identities(triples: &[Triple]) {
    let keys: HashSet<_> = triples.iter().map(Triple::key).collect();
    assert_eq!(keys.len(), triples.len(), "duplicate identities in result");
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn goal_met_by_initial_extraction() {
    let mock = Arc::new(MockLm::new());
    let mut grounded = item("Alice", "knows", "Bob");
    grounded.char_start = Some(0);
    grounded.char_end = Some(16);
    grounded.extraction_text = Some("Alice knows Bob.".to_string());
    mock.push_grounded(Ok(vec![grounded]));

    let result = pipeline(mock.clone(), config(1, 3))
        .process_record(&Record::new("r1", "Alice knows Bob."), None)
        .await
        .unwrap();

    assert_eq!(result.triples.len(), 1);
    assert_eq!(result.triples[0].char_start, Some(0));
    assert_eq!(result.metadata.total_llm_calls, 1);
    assert_eq!(mock.bridging_calls.load(Ordering::SeqCst), 0);

    let iterative = result.metadata.iterative_extraction.unwrap();
    assert_eq!(iterative.final_state.iterations_used, 0);
    assert_eq!(
        iterative.final_state.stop_reason,
        StopReason::ConnectivityGoalAchieved
    );
    assert!(iterative.refinement_iterations.is_empty());
}

#[tokio::test]
async fn single_refinement_connects_the_graph() {
    let mock = Arc::new(MockLm::new());
    mock.push_grounded(Ok(vec![
        item("Alice", "knows", "Bob"),
        item("Carol", "knows", "Dave"),
    ]));
    mock.push_bridging(Ok(vec![bridge("Bob", "met", "Carol")]));

    let result = pipeline(mock.clone(), config(1, 3))
        .process_record(
            &Record::new("r2", "Alice knows Bob. Carol knows Dave."),
            None,
        )
        .await
        .unwrap();

    assert_eq!(result.triples.len(), 3);
    assert_eq!(result.metadata.total_llm_calls, 2);

    let bridging_triple = &result.triples[2];
    assert_eq!(bridging_triple.inference, Inference::Contextual);
    assert_eq!(bridging_triple.iteration_source, 1);
    assert!(bridging_triple.justification.is_some());

    let iterative = result.metadata.iterative_extraction.unwrap();
    assert_eq!(iterative.initial_extraction.disconnected_components, 2);
    assert_eq!(iterative.final_state.disconnected_components, 1);
    assert_eq!(iterative.final_state.connectivity_improvement, 1);
    assert_eq!(iterative.final_state.iterations_used, 1);
    assert_eq!(
        iterative.final_state.stop_reason,
        StopReason::ConnectivityGoalAchieved
    );
}

#[tokio::test]
async fn duplicate_only_response_stops_early() {
    let mock = Arc::new(MockLm::new());
    mock.push_grounded(Ok(vec![
        item("Alice", "knows", "Bob"),
        item("Carol", "knows", "Dave"),
    ]));
    // a duplicate of an initial triple, differing only in case
    mock.push_bridging(Ok(vec![bridge("ALICE", "KNOWS", "Bob")]));

    let result = pipeline(mock.clone(), config(1, 3))
        .process_record(
            &Record::new("r3", "Alice knows Bob. Carol knows Dave."),
            None,
        )
        .await
        .unwrap();

    assert_eq!(result.triples.len(), 2);
    let iterative = result.metadata.iterative_extraction.unwrap();
    assert_eq!(iterative.final_state.iterations_used, 1);
    assert_eq!(
        iterative.final_state.stop_reason,
        StopReason::NoNewTriplesFound
    );
    assert_eq!(iterative.refinement_iterations.len(), 1);
    assert_eq!(iterative.refinement_iterations[0].new_triples, 0);
}

#[tokio::test]
async fn intra_component_triple_stops_without_progress() {
    let mock = Arc::new(MockLm::new());
    mock.push_grounded(Ok(vec![
        item("Alice", "knows", "Bob"),
        item("Carol", "knows", "Dave"),
    ]));
    // new, but it connects nothing
    mock.push_bridging(Ok(vec![bridge("Alice", "friend_of", "Bob")]));

    let result = pipeline(mock.clone(), config(1, 3))
        .process_record(
            &Record::new("r4", "Alice knows Bob. Carol knows Dave."),
            None,
        )
        .await
        .unwrap();

    // the unhelpful triple is kept
    assert_eq!(result.triples.len(), 3);
    let iterative = result.metadata.iterative_extraction.unwrap();
    assert_eq!(iterative.final_state.disconnected_components, 2);
    assert_eq!(
        iterative.final_state.stop_reason,
        StopReason::NoConnectivityImprovement
    );
    assert_eq!(iterative.final_state.connectivity_improvement, 0);
    assert_eq!(iterative.refinement_iterations[0].new_triples, 1);
}

#[tokio::test]
async fn budget_exhaustion_reports_max_iterations() {
    let mock = Arc::new(MockLm::new());
    // four disjoint components
    mock.push_grounded(Ok(vec![
        item("A", "r", "B"),
        item("C", "r", "D"),
        item("E", "r", "F"),
        item("G", "r", "H"),
    ]));
    // each iteration bridges exactly one gap: 4 -> 3 -> 2
    mock.push_bridging(Ok(vec![bridge("B", "met", "C")]));
    mock.push_bridging(Ok(vec![bridge("D", "met", "E")]));

    let result = pipeline(mock.clone(), config(1, 2))
        .process_record(&Record::new("r5", "A B C D E F G H."), None)
        .await
        .unwrap();

    let iterative = result.metadata.iterative_extraction.unwrap();
    assert_eq!(iterative.final_state.iterations_used, 2);
    assert_eq!(iterative.final_state.disconnected_components, 2);
    assert_eq!(
        iterative.final_state.stop_reason,
        StopReason::MaxIterationsReached
    );

    // connectivity strictly improves on every successful iteration
    let mut previous = iterative.initial_extraction.disconnected_components;
    for record in &iterative.refinement_iterations {
        assert!(record.early_stop_reason.is_none());
        assert!(record.disconnected_components < previous);
        previous = record.disconnected_components;
    }
}

#[tokio::test]
async fn backend_failure_preserves_partial_result() {
    let mock = Arc::new(MockLm::new());
    mock.push_grounded(Ok(vec![
        item("Alice", "knows", "Bob"),
        item("Carol", "knows", "Dave"),
    ]));
    mock.push_bridging(Err(ClientError::Timeout(60)));

    let result = pipeline(mock.clone(), config(1, 3))
        .process_record(
            &Record::new("r6", "Alice knows Bob. Carol knows Dave."),
            None,
        )
        .await
        .unwrap();

    assert_eq!(result.triples.len(), 2);
    assert!(result.metadata.partial_result);
    assert_eq!(result.metadata.total_llm_calls, 1);

    let iterative = result.metadata.iterative_extraction.unwrap();
    assert_eq!(iterative.final_state.stop_reason, StopReason::LlmFailure);
    assert_eq!(iterative.final_state.iterations_used, 0);
    assert_eq!(iterative.refinement_iterations.len(), 1);
    let failed = &iterative.refinement_iterations[0];
    assert!(failed.error.as_deref().unwrap().contains("timed out"));
}

#[tokio::test]
async fn goal_reached_before_failure_never_calls_again() {
    let mock = Arc::new(MockLm::new());
    mock.push_grounded(Ok(vec![
        item("Alice", "knows", "Bob"),
        item("Carol", "knows", "Dave"),
    ]));
    mock.push_bridging(Ok(vec![bridge("Bob", "met", "Carol")]));
    // nothing else queued: a second bridging call would fail the run

    let result = pipeline(mock.clone(), config(1, 3))
        .process_record(
            &Record::new("r6b", "Alice knows Bob. Carol knows Dave."),
            None,
        )
        .await
        .unwrap();

    assert!(!result.metadata.partial_result);
    assert_eq!(mock.bridging_calls.load(Ordering::SeqCst), 1);
    let iterative = result.metadata.iterative_extraction.unwrap();
    assert_eq!(
        iterative.final_state.stop_reason,
        StopReason::ConnectivityGoalAchieved
    );
}

#[tokio::test]
async fn cancellation_observed_before_first_iteration() {
    let mock = Arc::new(MockLm::new());
    mock.push_grounded(Ok(vec![
        item("Alice", "knows", "Bob"),
        item("Carol", "knows", "Dave"),
    ]));

    let cancel = CancelFlag::new();
    cancel.cancel();

    let result = pipeline(mock.clone(), config(1, 3))
        .process_record(
            &Record::new("r7", "Alice knows Bob. Carol knows Dave."),
            Some(cancel),
        )
        .await
        .unwrap();

    assert_eq!(result.triples.len(), 2);
    assert!(result.metadata.partial_result);
    assert_eq!(mock.bridging_calls.load(Ordering::SeqCst), 0);
    let iterative = result.metadata.iterative_extraction.unwrap();
    assert_eq!(iterative.final_state.stop_reason, StopReason::Cancelled);
}

#[tokio::test]
async fn client_cancellation_maps_to_cancelled() {
    let mock = Arc::new(MockLm::new());
    mock.push_grounded(Ok(vec![
        item("Alice", "knows", "Bob"),
        item("Carol", "knows", "Dave"),
    ]));
    mock.push_bridging(Err(ClientError::Cancelled));

    let result = pipeline(mock.clone(), config(1, 3))
        .process_record(
            &Record::new("r8", "Alice knows Bob. Carol knows Dave."),
            None,
        )
        .await
        .unwrap();

    let iterative = result.metadata.iterative_extraction.unwrap();
    assert_eq!(iterative.final_state.stop_reason, StopReason::Cancelled);
    assert!(result.metadata.partial_result);
}

// ============================================================================
// Edge cases and properties
// ============================================================================

#[tokio::test]
async fn empty_input_short_circuits() {
    let mock = Arc::new(MockLm::new());

    let result = pipeline(mock.clone(), config(1, 3))
        .process_record(&Record::new("r9", "   \n"), None)
        .await
        .unwrap();

    assert!(result.triples.is_empty());
    assert!(result.metadata.empty_input);
    assert_eq!(result.metadata.total_llm_calls, 0);
    assert_eq!(mock.grounded_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn initial_failure_propagates() {
    let mock = Arc::new(MockLm::new());
    mock.push_grounded(Err(ClientError::Auth("401 Unauthorized".to_string())));

    let outcome = pipeline(mock, config(1, 3))
        .process_record(&Record::new("r10", "Alice knows Bob."), None)
        .await;

    assert!(matches!(outcome, Err(kgc_core::KgcError::Client(_))));
}

#[tokio::test]
async fn refinement_disabled_returns_initial_verbatim() {
    let mock = Arc::new(MockLm::new());
    mock.push_grounded(Ok(vec![
        item("Alice", "knows", "Bob"),
        item("Carol", "knows", "Dave"),
    ]));

    let result = pipeline(mock.clone(), config(1, 0))
        .process_record(
            &Record::new("r11", "Alice knows Bob. Carol knows Dave."),
            None,
        )
        .await
        .unwrap();

    assert_eq!(result.triples.len(), 2);
    assert_eq!(result.metadata.extraction_method, ExtractionMethod::SimpleOneStep);
    assert!(result.metadata.iterative_extraction.is_none());
    assert_eq!(result.metadata.total_llm_calls, 1);
    assert_eq!(mock.bridging_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn refining_a_connected_graph_is_idempotent() {
    let mock = MockLm::new();
    let domain = Domain::builtin_default();
    let refiner = ConnectivityRefiner::new(&mock);

    let initial = vec![
        Triple::new("Alice", "knows", "Bob"),
        Triple::new("Bob", "knows", "Carol"),
    ];
    let options = RefineOptions {
        max_disconnected: 1,
        max_iterations: 5,
        ..RefineOptions::default()
    };

    let (triples, trace) = refiner
        .refine("Alice knows Bob and Carol.", &domain, initial.clone(), &options)
        .await;

    assert_eq!(triples, initial);
    assert_eq!(trace.stop_reason, StopReason::ConnectivityGoalAchieved);
    assert_eq!(trace.iterations_used, 0);
    assert_eq!(mock.bridging_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn result_properties_hold_across_iterations() {
    let mock = Arc::new(MockLm::new());
    mock.push_grounded(Ok(vec![
        item("A", "r", "B"),
        item("C", "r", "D"),
        item("E", "r", "F"),
    ]));
    mock.push_bridging(Ok(vec![bridge("B", "met", "C"), bridge("B", "met", "B2")]));
    mock.push_bridging(Ok(vec![bridge("D", "met", "E")]));

    let result = pipeline(mock.clone(), config(1, 5))
        .process_record(&Record::new("r12", "A B C D E F."), None)
        .await
        .unwrap();

    // identity uniqueness
    assert_unique_identities(&result.triples);

    // order preservation: iteration_source never decreases along the list
    let sources: Vec<u32> = result.triples.iter().map(|t| t.iteration_source).collect();
    let mut sorted = sources.clone();
    sorted.sort();
    assert_eq!(sources, sorted);

    // provenance monotonicity
    for triple in &result.triples {
        if triple.iteration_source >= 1 {
            assert_eq!(triple.inference, Inference::Contextual);
        }
    }

    // trace consistency
    let iterative = result.metadata.iterative_extraction.unwrap();
    assert_eq!(
        iterative.refinement_iterations.len() as u32,
        iterative.final_state.iterations_used
    );
    assert_eq!(
        result.metadata.total_llm_calls,
        1 + iterative.final_state.iterations_used
    );
    assert_eq!(iterative.total_llm_calls, result.metadata.total_llm_calls);

    // canonical JSON round trip preserves identities
    let json = serde_json::to_string(&result.triples).unwrap();
    let back: Vec<Triple> = serde_json::from_str(&json).unwrap();
    assert_eq!(result.triples, back);
}
